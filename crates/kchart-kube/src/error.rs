//! Error types for kchart-kube

use kchart_core::CoreError;
use thiserror::Error;

/// Result type for kchart-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur while driving external tools
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Domain failure (chart, environment, version, secrets)
    #[error(transparent)]
    Core(#[from] CoreError),

    /// External command exited with a non-zero status
    #[error("`{command}` failed ({}): {stderr}", .status.map_or("killed by signal".to_string(), |c| format!("exit status {}", c)))]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    /// Required executable is not on PATH
    #[error("'{program}' was not found on PATH\nHint: install it or adjust PATH")]
    MissingExecutable { program: String },

    /// Namespace does not exist in the current cluster
    #[error("Namespace '{namespace}' not found, check you are on the correct cluster")]
    NamespaceNotFound { namespace: String },

    /// No object of the given kind matched
    #[error("No {kind} matching '{pattern}' in namespace '{namespace}'")]
    ObjectNotFound {
        kind: String,
        pattern: String,
        namespace: String,
    },

    /// Registry returned no manifest for a tag
    #[error("No image manifest for tag '{tag}' in repository '{repository}'")]
    EmptyManifest { repository: String, tag: String },

    /// Port-forward could not be established
    #[error("tunnel error: {0}")]
    Tunnel(String),

    /// Unparseable tool output
    #[error("cannot parse command output: {0}")]
    Serialization(String),

    /// Invalid pattern or setting
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for KubeError {
    fn from(e: serde_yaml::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<regex::Error> for KubeError {
    fn from(e: regex::Error) -> Self {
        KubeError::InvalidConfig(e.to_string())
    }
}

impl KubeError {
    /// Check if kubectl reported the requested object as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, KubeError::CommandFailed { stderr, .. }
            if stderr.contains("NotFound") || stderr.contains("not found"))
    }
}
