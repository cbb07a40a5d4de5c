//! Secret sync validation
//!
//! The base `values.yaml` lists the secret keys a chart reads at runtime.
//! Before anything is deployed, the namespace secret must carry all of them.

use kchart_core::{DeployContext, SecretDeclarations};
use std::collections::BTreeSet;
use std::path::Path;

use crate::cluster::Cluster;
use crate::error::Result;
use crate::runner::CommandRunner;

/// Compares declared secret keys with what a namespace provides
pub struct SecretValidator<'a, R: CommandRunner + ?Sized> {
    context: &'a DeployContext,
    runner: &'a R,
}

impl<'a, R: CommandRunner + ?Sized> SecretValidator<'a, R> {
    pub fn new(context: &'a DeployContext, runner: &'a R) -> Self {
        Self { context, runner }
    }

    fn cluster(&self) -> Cluster<'a, R> {
        Cluster::new(self.runner)
    }

    /// Keys listed under `secrets:` in the base values file
    pub fn declared_secrets(&self, default_values_file: &Path) -> Result<BTreeSet<String>> {
        Ok(SecretDeclarations::from_values_file(default_values_file)?.keys)
    }

    /// Name of the namespace secret this chart reads
    pub fn secret_name(&self, namespace: &str) -> Result<String> {
        self.cluster()
            .secret_name(namespace, self.context.secret_pattern())
    }

    /// Keys present in the namespace secret
    pub fn deployed_secrets(&self, namespace: &str) -> Result<BTreeSet<String>> {
        let name = self.secret_name(namespace)?;
        self.cluster().secret_keys(namespace, &name)
    }

    /// Fail when the namespace secret lacks any declared key
    pub fn check(&self, namespace: &str) -> Result<()> {
        let declared = SecretDeclarations::from_values_file(self.context.default_values_file()?)?;
        if declared.keys.is_empty() {
            tracing::debug!(namespace, "chart declares no secrets");
            return Ok(());
        }

        let deployed = self.deployed_secrets(namespace)?;
        declared.check(namespace, &deployed)?;

        tracing::info!(namespace, count = declared.keys.len(), "secrets in sync");
        Ok(())
    }

    /// Set one key of the namespace secret
    pub fn patch(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        let name = self.secret_name(namespace)?;
        self.cluster().patch_secret(namespace, &name, key, value)?;
        tracing::info!(namespace, secret = %name, key, "patched secret");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KubeError;
    use crate::mock::MockRunner;
    use kchart_core::{Config, CoreError};
    use std::fs;

    const SECRET_YAML: &str = r#"
apiVersion: v1
kind: Secret
metadata:
  name: payments-env
type: Opaque
data:
  DATABASE_URL: cG9zdGdyZXM6Ly9kYjo1NDMyL3BheW1lbnRz
  STRIPE_KEY: c2tfdGVzdA==
"#;

    fn context(values: &str) -> (tempfile::TempDir, DeployContext) {
        let dir = tempfile::tempdir().unwrap();
        let chart = dir.path().join("chart/payments");
        fs::create_dir_all(&chart).unwrap();
        fs::write(chart.join("values.yaml"), values).unwrap();
        let context = DeployContext::load(dir.path(), Config::default()).unwrap();
        (dir, context)
    }

    fn runner() -> MockRunner {
        MockRunner::new()
            .respond("kubectl get secrets", "secret/default-token\nsecret/payments-env")
            .respond("kubectl get secret payments-env", SECRET_YAML)
    }

    #[test]
    fn test_check_in_sync() {
        let (_dir, context) = context(
            "image:\n  repository: registry/payments/production\nsecrets:\n  - DATABASE_URL\n  - name: STRIPE_KEY\n",
        );
        let runner = runner();

        SecretValidator::new(&context, &runner).check("staging").unwrap();
    }

    #[test]
    fn test_check_reports_missing_sorted() {
        let (_dir, context) = context(
            "image:\n  repository: registry/payments/production\nsecrets:\n  - SENTRY_DSN\n  - DATABASE_URL\n  - API_TOKEN\n",
        );
        let runner = runner();

        let err = SecretValidator::new(&context, &runner)
            .check("staging")
            .unwrap_err();
        match err {
            KubeError::Core(CoreError::MissingSecrets { namespace, keys }) => {
                assert_eq!(namespace, "staging");
                assert_eq!(keys, vec!["API_TOKEN", "SENTRY_DSN"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_no_declarations_skips_cluster() {
        let (_dir, context) = context("image:\n  repository: registry/payments/production\n");
        let runner = MockRunner::new();

        SecretValidator::new(&context, &runner).check("staging").unwrap();
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_missing_namespace_secret() {
        let (_dir, context) = context(
            "image:\n  repository: registry/payments/production\nsecrets:\n  - DATABASE_URL\n",
        );
        let runner = MockRunner::new().respond("kubectl get secrets", "secret/default-token");

        let err = SecretValidator::new(&context, &runner)
            .check("staging")
            .unwrap_err();
        assert!(matches!(err, KubeError::ObjectNotFound { .. }));
    }

    #[test]
    fn test_patch_targets_matched_secret() {
        let (_dir, context) = context("image:\n  repository: registry/payments/production\n");
        let runner = runner();

        SecretValidator::new(&context, &runner)
            .patch("staging", "API_TOKEN", "abc")
            .unwrap();

        assert_eq!(
            runner.calls_matching("kubectl patch"),
            vec![r#"kubectl patch secret payments-env -n staging --patch '{"data":{"API_TOKEN":"YWJj"}}'"#]
        );
    }

    #[test]
    fn test_declared_secrets() {
        let (_dir, context) = context(
            "image:\n  repository: registry/payments/production\nsecrets:\n  - B\n  - A\n",
        );
        let runner = MockRunner::new();
        let validator = SecretValidator::new(&context, &runner);

        let declared = validator
            .declared_secrets(context.default_values_file().unwrap())
            .unwrap();
        assert_eq!(declared.into_iter().collect::<Vec<_>>(), vec!["A", "B"]);
    }
}
