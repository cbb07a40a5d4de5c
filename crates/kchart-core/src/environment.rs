//! Environment descriptors derived from the chart's values files
//!
//! Every `values*.yaml` under `chart/<name>/` declares an `image.repository`
//! of the form `host/chart/environment`. That triple tells us which
//! environment the file configures and which chart identity the running
//! image must carry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::values::ValuesFile;

/// File name of the base values file
pub const DEFAULT_VALUES_FILE: &str = "values.yaml";

/// One deployment environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentDescriptor {
    /// Environment name (e.g. `staging`)
    pub name: String,

    /// Values file configuring this environment
    pub values_file: PathBuf,

    /// Chart identity the deployed image must carry
    pub chart: String,

    /// Registry host from `image.repository`
    pub registry_host: String,
}

impl EnvironmentDescriptor {
    /// Registry repository name (`chart/environment`)
    pub fn repository(&self) -> String {
        format!("{}/{}", self.chart, self.name)
    }

    fn from_values(values: &ValuesFile) -> Option<Self> {
        let repository = values.image_repository()?;
        let segments: Vec<&str> = repository.split('/').collect();
        let [host, chart, environment] = segments.as_slice() else {
            return None;
        };
        if host.is_empty() || chart.is_empty() || environment.is_empty() {
            return None;
        }

        Some(Self {
            name: environment.to_string(),
            values_file: values.path.clone(),
            chart: chart.to_string(),
            registry_host: host.to_string(),
        })
    }
}

/// Environment descriptors keyed by environment name
#[derive(Debug, Clone, Default)]
pub struct Environments {
    by_name: BTreeMap<String, EnvironmentDescriptor>,
    files: Vec<PathBuf>,
}

impl Environments {
    /// Build from already-parsed values files, in the given order
    ///
    /// Returns an empty mapping if any file lacks a well-formed
    /// `image.repository`.
    pub fn from_values(values: &[ValuesFile]) -> Self {
        let mut by_name = BTreeMap::new();

        for file in values {
            let Some(descriptor) = EnvironmentDescriptor::from_values(file) else {
                tracing::warn!(
                    file = %file.path.display(),
                    "values file has no usable image.repository (expected host/chart/environment)"
                );
                return Self::default();
            };

            if let Some(previous) = by_name.insert(descriptor.name.clone(), descriptor) {
                tracing::warn!(
                    environment = %previous.name,
                    overridden = %previous.values_file.display(),
                    by = %file.path.display(),
                    "environment defined by more than one values file, last one wins"
                );
            }
        }

        Self {
            by_name,
            files: values.iter().map(|v| v.path.clone()).collect(),
        }
    }

    /// Look up an environment by name
    pub fn get(&self, name: &str) -> Option<&EnvironmentDescriptor> {
        self.by_name.get(name)
    }

    /// Environment names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    /// All descriptors, sorted by environment name
    pub fn iter(&self) -> impl Iterator<Item = &EnvironmentDescriptor> {
        self.by_name.values()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// The base `values.yaml` among the scanned files
    pub fn default_values_file(&self) -> Result<&Path> {
        self.files
            .iter()
            .find(|path| {
                path.file_name()
                    .is_some_and(|name| name == DEFAULT_VALUES_FILE)
            })
            .map(PathBuf::as_path)
            .ok_or(CoreError::DefaultValuesMissing)
    }
}

/// Scan `<chart_dir>/values*.yaml` and build the environment mapping
///
/// Fails closed: unreadable or malformed files yield an empty mapping, which
/// callers must treat as a precondition failure.
pub fn resolve_environments(chart_dir: &Path) -> Environments {
    let pattern = chart_dir.join("values*.yaml");
    let Some(pattern) = pattern.to_str() else {
        return Environments::default();
    };

    let mut paths: Vec<PathBuf> = match glob::glob(pattern) {
        Ok(paths) => paths.filter_map(|p| p.ok()).collect(),
        Err(e) => {
            tracing::warn!("invalid values file pattern: {}", e);
            return Environments::default();
        }
    };
    paths.sort();

    let mut values = Vec::with_capacity(paths.len());
    for path in paths {
        match ValuesFile::from_file(&path) {
            Ok(file) => values.push(file),
            Err(e) => {
                tracing::warn!(file = %path.display(), "cannot read values file: {}", e);
                return Environments::default();
            }
        }
    }

    Environments::from_values(&values)
}
