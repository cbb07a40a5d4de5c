//! Chart directory discovery

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// Directory (relative to the repository root) holding the chart
pub const CHART_ROOT: &str = "chart";

/// Helm chart-system version, from `Chart.yaml` `apiVersion`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChartApiVersion {
    /// Helm 2 charts; the release namespace comes from the kube context
    #[default]
    V1,
    /// Helm 3 charts; every command needs an explicit `-n <namespace>`
    V2,
}

impl ChartApiVersion {
    /// Whether helm must be given the namespace explicitly
    pub fn requires_namespace_flag(self) -> bool {
        matches!(self, ChartApiVersion::V2)
    }
}

impl std::str::FromStr for ChartApiVersion {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "v1" => Ok(ChartApiVersion::V1),
            "v2" => Ok(ChartApiVersion::V2),
            other => Err(CoreError::InvalidChart {
                message: format!("unsupported apiVersion '{}', expected v1 or v2", other),
            }),
        }
    }
}

impl fmt::Display for ChartApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartApiVersion::V1 => write!(f, "v1"),
            ChartApiVersion::V2 => write!(f, "v2"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartManifest {
    #[serde(default)]
    api_version: Option<String>,
}

/// The chart living under `chart/<name>/`
#[derive(Debug, Clone)]
pub struct ChartDir {
    /// Chart name (the directory name)
    pub name: String,

    /// Absolute or root-relative path to `chart/<name>`
    pub path: PathBuf,

    /// Chart-system version
    pub api_version: ChartApiVersion,
}

impl ChartDir {
    /// Locate and load the chart below a repository root
    pub fn load<P: AsRef<Path>>(root: P) -> Result<Self> {
        let name = resolve_chart_name(root.as_ref())?;
        let path = root.as_ref().join(CHART_ROOT).join(&name);
        let api_version = read_api_version(&path)?;

        tracing::debug!(chart = %name, api_version = %api_version, "resolved chart directory");

        Ok(Self {
            name,
            path,
            api_version,
        })
    }
}

/// Find the chart name: the sole subdirectory of `<root>/chart`
///
/// Directories are sorted by name so the choice does not depend on
/// filesystem order. When several exist the first one wins and the others
/// are reported.
pub fn resolve_chart_name(root: &Path) -> Result<String> {
    let chart_root = root.join(CHART_ROOT);
    let not_found = || CoreError::ChartNotFound {
        path: chart_root.display().to_string(),
    };

    let entries = std::fs::read_dir(&chart_root).map_err(|_| not_found())?;

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect();
    names.sort();

    if names.len() > 1 {
        tracing::warn!(
            candidates = %names.join(", "),
            "multiple chart directories found, using '{}'",
            names[0]
        );
    }

    names.into_iter().next().ok_or_else(not_found)
}

fn read_api_version(chart_path: &Path) -> Result<ChartApiVersion> {
    let manifest = chart_path.join("Chart.yaml");
    if !manifest.exists() {
        return Ok(ChartApiVersion::default());
    }

    let content = std::fs::read_to_string(&manifest)?;
    let parsed: ChartManifest = serde_yaml::from_str(&content)?;

    match parsed.api_version {
        Some(version) => version.parse(),
        None => Ok(ChartApiVersion::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_resolve_single_chart() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("chart/payments")).unwrap();

        assert_eq!(resolve_chart_name(dir.path()).unwrap(), "payments");
    }

    #[test]
    fn test_resolve_ignores_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("chart/payments")).unwrap();
        fs::write(dir.path().join("chart/README.md"), "notes").unwrap();

        assert_eq!(resolve_chart_name(dir.path()).unwrap(), "payments");
    }

    #[test]
    fn test_resolve_multiple_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("chart/zeta")).unwrap();
        fs::create_dir_all(dir.path().join("chart/alpha")).unwrap();

        assert_eq!(resolve_chart_name(dir.path()).unwrap(), "alpha");
    }

    #[test]
    fn test_resolve_missing_chart_root() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_chart_name(dir.path()).unwrap_err();
        assert!(matches!(err, CoreError::ChartNotFound { .. }));
    }

    #[test]
    fn test_resolve_empty_chart_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("chart")).unwrap();
        assert!(resolve_chart_name(dir.path()).is_err());
    }

    #[test]
    fn test_load_reads_api_version() {
        let dir = tempfile::tempdir().unwrap();
        let chart = dir.path().join("chart/payments");
        fs::create_dir_all(&chart).unwrap();
        fs::write(chart.join("Chart.yaml"), "apiVersion: v2\nname: payments\n").unwrap();

        let loaded = ChartDir::load(dir.path()).unwrap();
        assert_eq!(loaded.name, "payments");
        assert_eq!(loaded.api_version, ChartApiVersion::V2);
        assert!(loaded.api_version.requires_namespace_flag());
    }

    #[test]
    fn test_load_defaults_to_v1() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("chart/payments")).unwrap();

        let loaded = ChartDir::load(dir.path()).unwrap();
        assert_eq!(loaded.api_version, ChartApiVersion::V1);
        assert!(!loaded.api_version.requires_namespace_flag());
    }

    #[test]
    fn test_unknown_api_version() {
        assert!("v3".parse::<ChartApiVersion>().is_err());
        assert_eq!("v1".parse::<ChartApiVersion>().unwrap(), ChartApiVersion::V1);
    }
}
