//! kchart configuration
//!
//! Looked up in order: an explicit `--config` path, `.kchart.yaml` in the
//! repository root, then `~/.config/kchart/config.yaml`. Every field has a
//! default so an absent file is fine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CoreError, Result};
use crate::version::TagOrder;

/// Project-local configuration file name
pub const PROJECT_CONFIG_FILE: &str = ".kchart.yaml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Pattern selecting the pod whose image identifies the deployment
    /// (defaults to the chart name)
    #[serde(default)]
    pub pod_pattern: Option<String>,

    /// Pattern selecting the namespace secret (defaults to the chart name)
    #[serde(default)]
    pub secret_pattern: Option<String>,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub tunnel: TunnelConfig,

    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Container registry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfig {
    /// Upper bound on tags fetched per repository
    #[serde(default = "default_max_items")]
    pub max_items: u32,

    /// Ordering applied before picking rollback candidates
    #[serde(default)]
    pub tag_order: TagOrder,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            tag_order: TagOrder::default(),
        }
    }
}

fn default_max_items() -> u32 {
    1000
}

/// Port-forward settings for database access
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelConfig {
    /// Pattern selecting the pod to forward through
    #[serde(default = "default_tunnel_pod_pattern")]
    pub pod_pattern: String,

    #[serde(default = "default_local_host")]
    pub local_host: String,

    #[serde(default = "default_local_port")]
    pub local_port: u16,

    #[serde(default = "default_remote_port")]
    pub remote_port: u16,

    /// Wait after starting the forward before using it
    #[serde(default = "default_settle_delay", with = "humantime_serde")]
    pub settle_delay: Duration,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            pod_pattern: default_tunnel_pod_pattern(),
            local_host: default_local_host(),
            local_port: default_local_port(),
            remote_port: default_remote_port(),
            settle_delay: default_settle_delay(),
        }
    }
}

fn default_tunnel_pod_pattern() -> String {
    "pgbouncer|postgres".to_string()
}

fn default_local_host() -> String {
    "127.0.0.1".to_string()
}

fn default_local_port() -> u16 {
    5433
}

fn default_remote_port() -> u16 {
    5432
}

fn default_settle_delay() -> Duration {
    Duration::from_secs(3)
}

/// Migration and dump settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    /// Secret key holding the base64 connection string
    #[serde(default = "default_url_key")]
    pub url_key: String,

    /// Schema migration command (program followed by arguments)
    #[serde(default = "default_migrate_command")]
    pub migrate_command: Vec<String>,

    /// Environment variable receiving the tunneled connection string
    #[serde(default = "default_url_key")]
    pub migrate_env: String,

    /// Dump utility
    #[serde(default = "default_dump_command")]
    pub dump_command: String,

    /// Directory receiving dump files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url_key: default_url_key(),
            migrate_command: default_migrate_command(),
            migrate_env: default_url_key(),
            dump_command: default_dump_command(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_url_key() -> String {
    "DATABASE_URL".to_string()
}

fn default_migrate_command() -> Vec<String> {
    vec!["dbmate".to_string(), "up".to_string()]
}

fn default_dump_command() -> String {
    "pg_dump".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Config {
    /// Load configuration for a repository root
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        let project = root.join(PROJECT_CONFIG_FILE);
        if project.exists() {
            return Self::load_from(&project);
        }

        match Self::user_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// `~/.config/kchart/config.yaml`
    pub fn user_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("kchart").join("config.yaml"))
    }

    fn validate(&self) -> Result<()> {
        if self.database.migrate_command.is_empty() {
            return Err(CoreError::InvalidConfig {
                message: "database.migrateCommand must name a program".to_string(),
            });
        }
        if self.registry.max_items == 0 {
            return Err(CoreError::InvalidConfig {
                message: "registry.maxItems must be greater than zero".to_string(),
            });
        }
        for pattern in [&self.pod_pattern, &self.secret_pattern].into_iter().flatten() {
            regex::Regex::new(pattern).map_err(|e| CoreError::InvalidConfig {
                message: format!("invalid pattern '{}': {}", pattern, e),
            })?;
        }
        regex::Regex::new(&self.tunnel.pod_pattern).map_err(|e| CoreError::InvalidConfig {
            message: format!("invalid tunnel.podPattern: {}", e),
        })?;
        Ok(())
    }
}
