//! Deployment orchestration
//!
//! Every mutating operation starts from what is running: the image of a
//! representative pod tells which environment the namespace is and which
//! version it runs. Nothing is changed when that image belongs to another
//! chart.

use kchart_core::{ChartApiVersion, DeployContext, EnvironmentDescriptor, extract_env_version};
use std::path::PathBuf;

use crate::actions::{RollbackOptions, UpgradeOptions};
use crate::cluster::Cluster;
use crate::error::{KubeError, Result};
use crate::helm::HelmUpgrade;
use crate::registry::{Registry, RollbackPlan};
use crate::runner::CommandRunner;
use crate::secrets::SecretValidator;

/// What a namespace is currently running
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentStatus {
    pub namespace: String,
    pub environment: String,
    pub chart: String,
    /// Registry repository (`chart/environment`)
    pub repository: String,
    /// Full image reported by the pod
    pub image: String,
    pub version: String,
    pub values_file: PathBuf,
    pub chart_api_version: ChartApiVersion,
}

/// Result of an upgrade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeOutcome {
    pub namespace: String,
    pub environment: String,
    /// Version running before the upgrade
    pub previous_version: String,
    /// Version handed to helm
    pub version: String,
    pub values_file: PathBuf,
    /// Whether a rollout restart followed
    pub restarted: bool,
    /// helm's output
    pub output: String,
}

/// Upgrade, rollback and restart driver for one deploy context
pub struct Deployer<'a, R: CommandRunner + ?Sized> {
    context: &'a DeployContext,
    runner: &'a R,
}

impl<'a, R: CommandRunner + ?Sized> Deployer<'a, R> {
    pub fn new(context: &'a DeployContext, runner: &'a R) -> Self {
        Self { context, runner }
    }

    fn cluster(&self) -> Cluster<'a, R> {
        Cluster::new(self.runner)
    }

    /// Fail unless the namespace exists in the current cluster
    ///
    /// Chart and environments were already resolved with the context.
    pub fn check_environment(&self, namespace: &str) -> Result<()> {
        if !self.cluster().namespace_exists(namespace)? {
            return Err(KubeError::NamespaceNotFound {
                namespace: namespace.to_string(),
            });
        }
        tracing::debug!(namespace, chart = %self.context.chart.name, "environment valid");
        Ok(())
    }

    /// Running image, its environment and version
    fn resolve(&self, namespace: &str) -> Result<(String, &'a EnvironmentDescriptor, String)> {
        let image = self
            .cluster()
            .deployed_image(namespace, self.context.pod_pattern())?;
        let (environment, version) = extract_env_version(&image, &self.context.environments)?;
        Ok((image, environment, version))
    }

    /// Read-only report of the deployment in a namespace
    pub fn status(&self, namespace: &str) -> Result<DeploymentStatus> {
        self.check_environment(namespace)?;
        let (image, environment, version) = self.resolve(namespace)?;

        Ok(DeploymentStatus {
            namespace: namespace.to_string(),
            environment: environment.name.clone(),
            chart: environment.chart.clone(),
            repository: environment.repository(),
            image,
            version,
            values_file: environment.values_file.clone(),
            chart_api_version: self.context.chart.api_version,
        })
    }

    /// Run helm upgrade with the environment's values file
    ///
    /// Keeps the running version unless one is given. Namespace and secrets
    /// are checked first.
    pub fn upgrade(&self, options: &UpgradeOptions) -> Result<UpgradeOutcome> {
        let namespace = options.namespace.as_str();
        self.check_environment(namespace)?;
        SecretValidator::new(self.context, self.runner).check(namespace)?;

        let (_, environment, running) = self.resolve(namespace)?;
        let version = options.version.clone().unwrap_or_else(|| running.clone());

        let upgrade = HelmUpgrade::new(
            namespace,
            self.context.chart_path(),
            &environment.values_file,
            version.as_str(),
            self.context.chart.api_version,
        );
        let output = upgrade.run(self.runner)?;

        tracing::info!(
            namespace,
            environment = %environment.name,
            from = %running,
            to = %version,
            "helm upgrade finished"
        );

        if options.recreate_pods {
            self.restart(namespace)?;
        }

        Ok(UpgradeOutcome {
            namespace: namespace.to_string(),
            environment: environment.name.clone(),
            previous_version: running,
            version,
            values_file: environment.values_file.clone(),
            restarted: options.recreate_pods,
            output,
        })
    }

    /// Re-publish an older image under a new release-candidate tag
    ///
    /// Deploying the returned tag is left to the caller. Namespace and
    /// secrets are checked before the registry is touched.
    pub fn rollback(&self, options: &RollbackOptions) -> Result<RollbackPlan> {
        let namespace = options.namespace.as_str();
        self.check_environment(namespace)?;
        SecretValidator::new(self.context, self.runner).check(namespace)?;
        let (_, environment, _) = self.resolve(namespace)?;

        let registry_config = &self.context.config.registry;
        let registry = Registry::new(
            self.runner,
            registry_config.max_items,
            registry_config.tag_order,
        );
        let plan =
            registry.resolve_rollback_target(&environment.repository(), options.version.as_deref())?;
        registry.retag(&plan)?;
        Ok(plan)
    }

    /// Restart every deployment in the namespace
    pub fn restart(&self, namespace: &str) -> Result<()> {
        self.cluster().rollout_restart(namespace)?;
        tracing::info!(namespace, "rollout restart requested");
        Ok(())
    }
}
