//! Action options for upgrade, rollback and dump operations

/// Options for upgrade operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeOptions {
    /// Target namespace (also the helm release name)
    pub namespace: String,

    /// Image tag to deploy; defaults to the version currently running
    pub version: Option<String>,

    /// Restart every deployment once helm is done
    pub recreate_pods: bool,
}

impl UpgradeOptions {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    /// Deploy a specific image tag
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Restart pods after the upgrade
    pub fn recreate_pods(mut self) -> Self {
        self.recreate_pods = true;
        self
    }
}

/// Options for rollback operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackOptions {
    /// Target namespace
    pub namespace: String,

    /// Existing registry tag to roll back to; defaults to the previous release
    pub version: Option<String>,
}

impl RollbackOptions {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    /// Roll back to a specific tag
    pub fn to_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// Options for database dump
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpOptions {
    pub namespace: String,

    /// Database to dump instead of the one named in the connection string
    pub database: Option<String>,
}

impl DumpOptions {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upgrade_options_builder() {
        let opts = UpgradeOptions::new("staging")
            .with_version("2.4.1")
            .recreate_pods();

        assert_eq!(opts.namespace, "staging");
        assert_eq!(opts.version.as_deref(), Some("2.4.1"));
        assert!(opts.recreate_pods);
    }

    #[test]
    fn test_upgrade_defaults_to_running_version() {
        let opts = UpgradeOptions::new("staging");
        assert!(opts.version.is_none());
        assert!(!opts.recreate_pods);
    }

    #[test]
    fn test_rollback_options_builder() {
        let opts = RollbackOptions::new("production").to_version("1.0.0");
        assert_eq!(opts.namespace, "production");
        assert_eq!(opts.version.as_deref(), Some("1.0.0"));
    }

    #[test]
    fn test_dump_options_builder() {
        let opts = DumpOptions::new("staging").with_database("analytics");
        assert_eq!(opts.database.as_deref(), Some("analytics"));
        assert!(DumpOptions::new("staging").database.is_none());
    }
}
