//! Immutable deployment context
//!
//! Chart, environments and configuration are resolved once when the process
//! starts and shared read-only by every operation afterwards.

use std::path::{Path, PathBuf};

use crate::chart::ChartDir;
use crate::config::Config;
use crate::environment::{Environments, resolve_environments};
use crate::error::{CoreError, Result};

#[derive(Debug, Clone)]
pub struct DeployContext {
    /// Repository root (the directory holding `chart/`)
    pub root: PathBuf,

    pub chart: ChartDir,

    pub environments: Environments,

    pub config: Config,
}

impl DeployContext {
    /// Resolve the chart and its environments below `root`
    ///
    /// Fails when there is no chart directory or no environment could be
    /// derived from its values files.
    pub fn load(root: impl Into<PathBuf>, config: Config) -> Result<Self> {
        let root = root.into();
        let chart = ChartDir::load(&root)?;
        let environments = resolve_environments(&chart.path);

        if environments.is_empty() {
            return Err(CoreError::NoEnvironments {
                path: chart.path.display().to_string(),
            });
        }

        tracing::debug!(
            chart = %chart.name,
            environments = %environments.names().collect::<Vec<_>>().join(", "),
            "deploy context ready"
        );

        Ok(Self {
            root,
            chart,
            environments,
            config,
        })
    }

    /// Path of the chart directory handed to helm
    pub fn chart_path(&self) -> &Path {
        &self.chart.path
    }

    /// The base `values.yaml`
    pub fn default_values_file(&self) -> Result<&Path> {
        self.environments.default_values_file()
    }

    /// Pattern selecting the pod that reports the deployed image
    pub fn pod_pattern(&self) -> &str {
        self.config.pod_pattern.as_deref().unwrap_or(&self.chart.name)
    }

    /// Pattern selecting the namespace secret
    pub fn secret_pattern(&self) -> &str {
        self.config
            .secret_pattern
            .as_deref()
            .unwrap_or(&self.chart.name)
    }
}
