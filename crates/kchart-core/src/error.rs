//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("This directory does not have a chart folder: {path}")]
    ChartNotFound { path: String },

    #[error("This directory does not have environments defined in {path}")]
    NoEnvironments { path: String },

    #[error("No default values.yaml found among the environment values files")]
    DefaultValuesMissing,

    #[error("Environment '{environment}' is not defined by any values file")]
    UnknownEnvironment { environment: String },

    #[error(
        "FATAL: chart '{found}' running in environment '{environment}' does not belong to this repository (expected '{expected}')"
    )]
    ChartMismatch {
        environment: String,
        expected: String,
        found: String,
    },

    #[error("Invalid image reference '{image}': {message}")]
    InvalidImage { image: String, message: String },

    #[error("Invalid version '{version}': expected MAJOR.MINOR.PATCH[-rc.N]")]
    InvalidVersion { version: String },

    #[error("Not enough tags to roll back: need {needed}, found {found}")]
    NotEnoughTags { needed: usize, found: usize },

    #[error("Version '{version}' does not exist in repository '{repository}'")]
    VersionNotInRegistry { version: String, repository: String },

    #[error("Missing secrets in namespace '{namespace}': {}", .keys.join(", "))]
    MissingSecrets { namespace: String, keys: Vec<String> },

    #[error("Invalid database URI: {message}")]
    InvalidDatabaseUri { message: String },

    #[error("Invalid Chart.yaml: {message}")]
    InvalidChart { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
