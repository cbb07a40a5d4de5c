//! Cluster inspection through kubectl
//!
//! kchart never speaks the Kubernetes API itself. It asks kubectl for object
//! names, single fields (jsonpath) or whole objects (YAML) and decodes the
//! output into typed values.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use k8s_openapi::api::core::v1::Secret;
use regex::Regex;
use std::collections::BTreeSet;

use crate::error::{KubeError, Result};
use crate::runner::{CommandRunner, ExternalCommand};

/// kubectl binary name
pub const KUBECTL: &str = "kubectl";

/// jsonpath of the first container image of a pod
pub const IMAGE_JSONPATH: &str = "{.spec.containers[0].image}";

/// kubectl front-end bound to a command runner
pub struct Cluster<'r, R: CommandRunner + ?Sized> {
    runner: &'r R,
}

impl<'r, R: CommandRunner + ?Sized> Cluster<'r, R> {
    pub fn new(runner: &'r R) -> Self {
        Self { runner }
    }

    fn kubectl<I, S>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.runner.run(&ExternalCommand::new(KUBECTL).args(args))
    }

    /// Whether the namespace exists in the current cluster
    pub fn namespace_exists(&self, namespace: &str) -> Result<bool> {
        match self.kubectl(["get", "namespace", namespace, "-o=name"]) {
            Ok(out) => Ok(!out.trim().is_empty()),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Names of every object of `kind` in the namespace, in kubectl order
    ///
    /// The `<kind>/` prefix printed by `-o=name` is removed.
    pub fn list_objects(&self, namespace: &str, kind: &str) -> Result<Vec<String>> {
        let out = self.kubectl(["get", kind, "-o=name", "-n", namespace])?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| match line.split_once('/') {
                Some((_, name)) => name.to_string(),
                None => line.to_string(),
            })
            .collect())
    }

    /// First object of `kind` whose name matches `pattern`
    ///
    /// Matching is a case-sensitive regex search. The first match in kubectl's
    /// listing order wins.
    pub fn find_object(&self, namespace: &str, pattern: &str, kind: &str) -> Result<Option<String>> {
        let pattern = Regex::new(pattern)?;
        let found = self
            .list_objects(namespace, kind)?
            .into_iter()
            .find(|name| pattern.is_match(name));

        tracing::debug!(namespace, kind, found = ?found, "object lookup");
        Ok(found)
    }

    /// First pod whose name matches `pattern`
    pub fn find_pod(&self, namespace: &str, pattern: &str) -> Result<Option<String>> {
        self.find_object(namespace, pattern, "pods")
    }

    /// Extract a single field of an object
    pub fn jsonpath(&self, object: &str, namespace: &str, path: &str) -> Result<String> {
        self.kubectl([
            "get".to_string(),
            object.to_string(),
            "-n".to_string(),
            namespace.to_string(),
            "-o".to_string(),
            format!("jsonpath={}", path),
        ])
    }

    /// Image of a representative pod
    ///
    /// Prefers a pod matching `pattern`, otherwise takes the first pod listed.
    pub fn deployed_image(&self, namespace: &str, pattern: &str) -> Result<String> {
        let pod = match self.find_pod(namespace, pattern)? {
            Some(pod) => pod,
            None => self
                .list_objects(namespace, "pods")?
                .into_iter()
                .next()
                .ok_or_else(|| KubeError::ObjectNotFound {
                    kind: "pod".to_string(),
                    pattern: pattern.to_string(),
                    namespace: namespace.to_string(),
                })?,
        };

        let image = self.jsonpath(&format!("pod/{}", pod), namespace, IMAGE_JSONPATH)?;
        let image = image.trim();
        if image.is_empty() {
            return Err(KubeError::Serialization(format!(
                "pod '{}' reports no container image",
                pod
            )));
        }

        tracing::info!(namespace, pod = %pod, image, "deployed image");
        Ok(image.to_string())
    }

    /// Name of the namespace secret matching `pattern`
    pub fn secret_name(&self, namespace: &str, pattern: &str) -> Result<String> {
        self.find_object(namespace, pattern, "secrets")?
            .ok_or_else(|| KubeError::ObjectNotFound {
                kind: "secret".to_string(),
                pattern: pattern.to_string(),
                namespace: namespace.to_string(),
            })
    }

    /// Fetch and decode a whole secret
    pub fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret> {
        let yaml = self.kubectl(["get", "secret", name, "-n", namespace, "-o", "yaml"])?;
        Ok(serde_yaml::from_str(&yaml)?)
    }

    /// Data keys present in a secret
    pub fn secret_keys(&self, namespace: &str, name: &str) -> Result<BTreeSet<String>> {
        let secret = self.get_secret(namespace, name)?;
        let mut keys: BTreeSet<String> = secret.data.unwrap_or_default().into_keys().collect();
        keys.extend(secret.string_data.unwrap_or_default().into_keys());
        Ok(keys)
    }

    /// Set one key of a secret, base64-encoding the value
    pub fn patch_secret(&self, namespace: &str, name: &str, key: &str, value: &str) -> Result<()> {
        let patch = serde_json::json!({ "data": { key: STANDARD.encode(value) } });
        self.kubectl([
            "patch".to_string(),
            "secret".to_string(),
            name.to_string(),
            "-n".to_string(),
            namespace.to_string(),
            "--patch".to_string(),
            patch.to_string(),
        ])?;
        Ok(())
    }

    /// Restart every deployment in the namespace
    pub fn rollout_restart(&self, namespace: &str) -> Result<()> {
        self.kubectl(["rollout", "restart", "deploy", "-n", namespace])?;
        Ok(())
    }
}

/// Command forwarding `local_port` to `remote_port` on a pod
pub fn port_forward_command(
    namespace: &str,
    pod: &str,
    local_port: u16,
    remote_port: u16,
) -> ExternalCommand {
    ExternalCommand::new(KUBECTL).args([
        "port-forward".to_string(),
        pod.to_string(),
        format!("{}:{}", local_port, remote_port),
        "-n".to_string(),
        namespace.to_string(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRunner;

    const SECRET_YAML: &str = r#"
apiVersion: v1
kind: Secret
metadata:
  name: payments
  namespace: staging
type: Opaque
data:
  DATABASE_URL: cG9zdGdyZXM6Ly9kYjo1NDMyL3BheW1lbnRz
  API_KEY: c2VjcmV0
"#;

    #[test]
    fn test_list_objects_strips_kind() {
        let runner = MockRunner::new().respond(
            "kubectl get pods -o=name -n staging",
            "pod/payments-web-1\npod/payments-worker-2\n",
        );
        let cluster = Cluster::new(&runner);

        let pods = cluster.list_objects("staging", "pods").unwrap();
        assert_eq!(pods, vec!["payments-web-1", "payments-worker-2"]);
    }

    #[test]
    fn test_find_pod_first_match() {
        let runner = MockRunner::new().respond(
            "kubectl get pods",
            "pod/redis-0\npod/payments-worker-1\npod/payments-web-2",
        );
        let cluster = Cluster::new(&runner);

        assert_eq!(
            cluster.find_pod("staging", "payments").unwrap().as_deref(),
            Some("payments-worker-1")
        );
        assert_eq!(
            cluster.find_pod("staging", "^payments-web").unwrap().as_deref(),
            Some("payments-web-2")
        );
        assert_eq!(cluster.find_pod("staging", "Payments").unwrap(), None);
    }

    #[test]
    fn test_find_object_invalid_pattern() {
        let runner = MockRunner::new();
        let cluster = Cluster::new(&runner);
        assert!(matches!(
            cluster.find_pod("staging", "(["),
            Err(KubeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_namespace_exists() {
        let runner = MockRunner::new()
            .respond("kubectl get namespace staging", "namespace/staging")
            .fail(
                "kubectl get namespace qa",
                1,
                "Error from server (NotFound): namespaces \"qa\" not found",
            )
            .fail("kubectl get namespace broken", 1, "Unable to connect to the server");
        let cluster = Cluster::new(&runner);

        assert!(cluster.namespace_exists("staging").unwrap());
        assert!(!cluster.namespace_exists("qa").unwrap());
        assert!(cluster.namespace_exists("broken").is_err());
    }

    #[test]
    fn test_deployed_image() {
        let runner = MockRunner::new()
            .respond("kubectl get pods", "pod/redis-0\npod/payments-web-1")
            .respond(
                "kubectl get pod/payments-web-1 -n staging -o 'jsonpath={.spec.containers[0].image}'",
                "registry/payments:staging-2.4.0",
            );
        let cluster = Cluster::new(&runner);

        assert_eq!(
            cluster.deployed_image("staging", "payments").unwrap(),
            "registry/payments:staging-2.4.0"
        );
    }

    #[test]
    fn test_deployed_image_falls_back_to_first_pod() {
        let runner = MockRunner::new()
            .respond("kubectl get pods", "pod/web-0")
            .respond("kubectl get pod/web-0", "registry/payments:staging-1.0.0");
        let cluster = Cluster::new(&runner);

        assert_eq!(
            cluster.deployed_image("staging", "payments").unwrap(),
            "registry/payments:staging-1.0.0"
        );
    }

    #[test]
    fn test_deployed_image_without_pods() {
        let runner = MockRunner::new().respond("kubectl get pods", "");
        let cluster = Cluster::new(&runner);

        assert!(matches!(
            cluster.deployed_image("staging", "payments"),
            Err(KubeError::ObjectNotFound { .. })
        ));
    }

    #[test]
    fn test_secret_keys_decoded_structurally() {
        let runner = MockRunner::new().respond("kubectl get secret payments", SECRET_YAML);
        let cluster = Cluster::new(&runner);

        let keys = cluster.secret_keys("staging", "payments").unwrap();
        assert_eq!(
            keys.into_iter().collect::<Vec<_>>(),
            vec!["API_KEY", "DATABASE_URL"]
        );

        let secret = cluster.get_secret("staging", "payments").unwrap();
        let data = secret.data.unwrap();
        assert_eq!(data["API_KEY"].0, b"secret".to_vec());
    }

    #[test]
    fn test_patch_secret_body() {
        let runner = MockRunner::new();
        let cluster = Cluster::new(&runner);

        cluster
            .patch_secret("staging", "payments", "API_KEY", "secret")
            .unwrap();

        assert_eq!(
            runner.calls(),
            vec![r#"kubectl patch secret payments -n staging --patch '{"data":{"API_KEY":"c2VjcmV0"}}'"#]
        );
    }

    #[test]
    fn test_rollout_restart() {
        let runner = MockRunner::new();
        Cluster::new(&runner).rollout_restart("staging").unwrap();
        assert_eq!(runner.calls(), vec!["kubectl rollout restart deploy -n staging"]);
    }

    #[test]
    fn test_port_forward_command() {
        let command = port_forward_command("staging", "pgbouncer-0", 5433, 5432);
        assert_eq!(
            command.command_line(),
            "kubectl port-forward pgbouncer-0 5433:5432 -n staging"
        );
    }
}
