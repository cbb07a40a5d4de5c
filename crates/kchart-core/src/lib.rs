//! kchart Core - domain types for per-service chart deployments
//!
//! This crate holds everything that can be decided without talking to a cluster:
//! - `ChartDir`: the chart directory under `chart/` and its chart-system version
//! - `Environments`: environment descriptors derived from `values*.yaml`
//! - `ImageReference`: parsing of deployed container images
//! - `ReleaseVersion`: release-candidate arithmetic and rollback tag selection
//! - `SecretDeclarations`: secrets a chart expects to find in its namespace
//! - `DatabaseUri`: connection strings rewritten to the local tunnel endpoint
//! - `Config` / `DeployContext`: process-wide, immutable settings

pub mod chart;
pub mod config;
pub mod context;
pub mod database;
pub mod environment;
pub mod error;
pub mod image;
pub mod secrets;
pub mod values;
pub mod version;

pub use chart::{ChartApiVersion, ChartDir, resolve_chart_name};
pub use config::{Config, DatabaseConfig, RegistryConfig, TunnelConfig};
pub use context::DeployContext;
pub use database::DatabaseUri;
pub use environment::{EnvironmentDescriptor, Environments, resolve_environments};
pub use error::{CoreError, Result};
pub use image::{ImageReference, extract_env_version};
pub use secrets::{SecretDeclarations, missing_secrets};
pub use values::ValuesFile;
pub use version::{
    LATEST_TAG, ReleaseVersion, TagOrder, compute_release_candidate, select_rollback_pair,
    sort_tags,
};
