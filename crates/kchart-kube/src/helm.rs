//! Helm upgrade invocation

use kchart_core::ChartApiVersion;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::runner::{CommandRunner, ExternalCommand};

/// helm binary name
pub const HELM: &str = "helm";

/// A `helm upgrade` for one namespace
///
/// The release is named after the namespace it lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelmUpgrade {
    pub namespace: String,
    pub chart_path: PathBuf,
    pub values_file: PathBuf,
    pub image_tag: String,
    pub chart_api_version: ChartApiVersion,
}

impl HelmUpgrade {
    pub fn new(
        namespace: impl Into<String>,
        chart_path: &Path,
        values_file: &Path,
        image_tag: impl Into<String>,
        chart_api_version: ChartApiVersion,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            chart_path: chart_path.to_path_buf(),
            values_file: values_file.to_path_buf(),
            image_tag: image_tag.into(),
            chart_api_version,
        }
    }

    /// `helm upgrade <ns> <chart> -f <values> --set=image.tag=<tag> [-n <ns>]`
    pub fn command(&self) -> ExternalCommand {
        let command = ExternalCommand::new(HELM).args([
            "upgrade".to_string(),
            self.namespace.clone(),
            self.chart_path.display().to_string(),
            "-f".to_string(),
            self.values_file.display().to_string(),
            format!("--set=image.tag={}", self.image_tag),
        ]);

        // v2 charts have no implicit namespace from the kube context
        if self.chart_api_version.requires_namespace_flag() {
            command.args(["-n", self.namespace.as_str()])
        } else {
            command
        }
    }

    /// Run the upgrade and return helm's output
    pub fn run<R: CommandRunner + ?Sized>(&self, runner: &R) -> Result<String> {
        runner.run(&self.command())
    }
}
