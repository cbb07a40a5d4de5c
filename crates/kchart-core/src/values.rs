//! Read-only access to chart values files

use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// A parsed `values*.yaml` file
#[derive(Debug, Clone)]
pub struct ValuesFile {
    /// Where the file was read from
    pub path: PathBuf,

    /// Parsed document
    pub data: JsonValue,
}

impl ValuesFile {
    /// Load a values file from disk
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(path.as_ref(), &content)
    }

    /// Parse a values document, remembering the path it belongs to
    pub fn from_yaml(path: impl Into<PathBuf>, yaml: &str) -> Result<Self> {
        let data: JsonValue = serde_yaml::from_str(yaml)?;
        Ok(Self {
            path: path.into(),
            data,
        })
    }

    /// Get a value by dotted path (e.g., "image.repository")
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        let parts: Vec<&str> = path.split('.').collect();
        get_nested(&self.data, &parts)
    }

    /// Get a string value by dotted path
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(JsonValue::as_str)
    }

    /// `image.repository`, the `host/chart/environment` triple
    pub fn image_repository(&self) -> Option<&str> {
        self.get_str("image.repository")
    }

    /// Names listed under `secrets:`
    ///
    /// Entries may be plain strings or maps carrying a `name` key.
    pub fn secret_names(&self) -> Vec<String> {
        let Some(JsonValue::Array(items)) = self.get("secrets") else {
            return Vec::new();
        };

        items
            .iter()
            .filter_map(|item| match item {
                JsonValue::String(name) => Some(name.clone()),
                JsonValue::Object(map) => map
                    .get("name")
                    .and_then(JsonValue::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .collect()
    }
}

fn get_nested<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    if path.is_empty() {
        return Some(value);
    }

    let key = path[0];
    let remaining = &path[1..];

    match value {
        JsonValue::Object(map) => map.get(key).and_then(|v| get_nested(v, remaining)),
        _ => None,
    }
}
