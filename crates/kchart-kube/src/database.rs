//! Database migrations and dumps through a tunnel
//!
//! The connection string lives base64-encoded in the namespace secret and
//! names a host only reachable inside the cluster. Both operations rewrite it
//! to the local end of a port-forward and run the tool while the forward is
//! open.

use chrono::{DateTime, Local};
use kchart_core::{CoreError, DatabaseUri, DeployContext};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::actions::DumpOptions;
use crate::cluster::Cluster;
use crate::error::{KubeError, Result};
use crate::runner::{CommandRunner, ExternalCommand};
use crate::tunnel::{TunnelSpec, with_tunnel};

/// Compression tool for dump files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compressor {
    /// `7z a -si <file>.7z`
    SevenZip,
    /// `gzip -c > <file>.gz`
    Gzip,
}

impl Compressor {
    /// Prefer 7z, fall back to gzip
    pub fn detect<R: CommandRunner + ?Sized>(runner: &R) -> Result<Self> {
        if runner.find_executable("7z").is_some() {
            Ok(Compressor::SevenZip)
        } else if runner.find_executable("gzip").is_some() {
            Ok(Compressor::Gzip)
        } else {
            Err(KubeError::MissingExecutable {
                program: "7z or gzip".to_string(),
            })
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Compressor::SevenZip => "7z",
            Compressor::Gzip => "gz",
        }
    }

    /// Consumer command, plus the file its stdout must go to
    fn consumer(self, path: &Path) -> (ExternalCommand, Option<&Path>) {
        match self {
            Compressor::SevenZip => (
                ExternalCommand::new("7z").args(["a", "-si"]).arg(path.display().to_string()),
                None,
            ),
            Compressor::Gzip => (ExternalCommand::new("gzip").arg("-c"), Some(path)),
        }
    }
}

impl fmt::Display for Compressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compressor::SevenZip => write!(f, "7z"),
            Compressor::Gzip => write!(f, "gzip"),
        }
    }
}

/// A finished dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpResult {
    pub database: String,
    pub path: PathBuf,
    pub compressor: Compressor,
}

/// `<database>-<YYYYMMDD-HHMMSS>.<ext>`
pub fn dump_file_name(database: &str, at: DateTime<Local>, compressor: Compressor) -> String {
    format!(
        "{}-{}.{}",
        database,
        at.format("%Y%m%d-%H%M%S"),
        compressor.extension()
    )
}

/// Delete whatever a failed dump left behind
fn remove_partial_dump(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::warn!(path = %path.display(), "removed incomplete dump"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), "cannot remove incomplete dump: {}", e),
    }
}

/// Migration and dump runner for one deploy context
pub struct DatabaseOperations<'a, R: CommandRunner + ?Sized> {
    context: &'a DeployContext,
    runner: &'a R,
}

impl<'a, R: CommandRunner + ?Sized> DatabaseOperations<'a, R> {
    pub fn new(context: &'a DeployContext, runner: &'a R) -> Self {
        Self { context, runner }
    }

    fn tunnel_spec(&self, namespace: &str) -> TunnelSpec {
        TunnelSpec::from_config(namespace, &self.context.config.tunnel)
    }

    /// Connection string from the namespace secret, pointed at the tunnel
    pub fn database_uri(&self, namespace: &str) -> Result<DatabaseUri> {
        let cluster = Cluster::new(self.runner);
        let key = &self.context.config.database.url_key;
        let secret = cluster.secret_name(namespace, self.context.secret_pattern())?;

        let encoded = cluster.jsonpath(
            &format!("secret/{}", secret),
            namespace,
            &format!("{{.data.{}}}", key),
        )?;
        if encoded.trim().is_empty() {
            return Err(CoreError::InvalidDatabaseUri {
                message: format!("secret '{}' has no '{}' key", secret, key),
            }
            .into());
        }

        let tunnel = &self.context.config.tunnel;
        Ok(DatabaseUri::from_base64(&encoded)?.tunneled(&tunnel.local_host, tunnel.local_port)?)
    }

    /// Apply pending schema migrations; returns the tool's output
    pub fn migrate(&self, namespace: &str) -> Result<String> {
        let config = &self.context.config.database;
        let Some((program, args)) = config.migrate_command.split_first() else {
            return Err(KubeError::InvalidConfig(
                "database.migrateCommand is empty".to_string(),
            ));
        };

        let uri = self.database_uri(namespace)?;
        let command = ExternalCommand::new(program.as_str())
            .args(args.iter().cloned())
            .env(config.migrate_env.as_str(), uri.as_str());

        with_tunnel(self.runner, &self.tunnel_spec(namespace), |_| {
            self.runner.run(&command)
        })
    }

    /// Dump a database into a compressed file
    pub fn dump(&self, options: &DumpOptions) -> Result<DumpResult> {
        let config = &self.context.config.database;
        if self.runner.find_executable(&config.dump_command).is_none() {
            return Err(KubeError::MissingExecutable {
                program: config.dump_command.clone(),
            });
        }
        let compressor = Compressor::detect(self.runner)?;

        let mut uri = self.database_uri(&options.namespace)?;
        if let Some(database) = &options.database {
            uri = uri.with_database(database);
        }
        let database = uri.database().unwrap_or("postgres").to_string();

        let path = config
            .output_dir
            .join(dump_file_name(&database, Local::now(), compressor));
        let producer = ExternalCommand::new(config.dump_command.as_str()).arg(uri.as_str());
        let (consumer, output) = compressor.consumer(&path);

        let piped = with_tunnel(self.runner, &self.tunnel_spec(&options.namespace), |_| {
            self.runner.pipe(&producer, &consumer, output)
        });
        if let Err(e) = piped {
            remove_partial_dump(&path);
            return Err(e);
        }

        tracing::info!(database = %database, path = %path.display(), "database dumped");
        Ok(DumpResult {
            database,
            path,
            compressor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use chrono::TimeZone;
    use kchart_core::Config;
    use std::fs;
    use std::time::Duration;

    use crate::mock::MockRunner;

    fn context() -> (tempfile::TempDir, DeployContext) {
        let dir = tempfile::tempdir().unwrap();
        let chart = dir.path().join("chart/payments");
        fs::create_dir_all(&chart).unwrap();
        fs::write(
            chart.join("values.yaml"),
            "image:\n  repository: registry/payments/production\n",
        )
        .unwrap();

        let mut config = Config::default();
        config.tunnel.settle_delay = Duration::ZERO;
        config.database.output_dir = PathBuf::from("/backups");
        let context = DeployContext::load(dir.path(), config).unwrap();
        (dir, context)
    }

    fn runner() -> MockRunner {
        let encoded = STANDARD.encode("postgres://app:pw@db.internal:5432/payments");
        MockRunner::new()
            .respond("kubectl get secrets", "secret/payments")
            .respond(
                "kubectl get secret/payments -n staging -o 'jsonpath={.data.DATABASE_URL}'",
                &encoded,
            )
            .respond("kubectl get pods", "pod/payments-web-0\npod/pgbouncer-7d9")
    }

    #[test]
    fn test_dump_file_name() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            dump_file_name("payments", at, Compressor::SevenZip),
            "payments-20240309-140507.7z"
        );
        assert_eq!(
            dump_file_name("payments", at, Compressor::Gzip),
            "payments-20240309-140507.gz"
        );
    }

    #[test]
    fn test_database_uri_rewritten() {
        let (_dir, context) = context();
        let runner = runner();

        let uri = DatabaseOperations::new(&context, &runner)
            .database_uri("staging")
            .unwrap();
        assert_eq!(uri.as_str(), "postgres://app:pw@127.0.0.1:5433/payments");
    }

    #[test]
    fn test_database_uri_missing_key() {
        let (_dir, context) = context();
        let runner = MockRunner::new().respond("kubectl get secrets", "secret/payments");

        let err = DatabaseOperations::new(&context, &runner)
            .database_uri("staging")
            .unwrap_err();
        assert!(matches!(
            err,
            KubeError::Core(CoreError::InvalidDatabaseUri { .. })
        ));
    }

    #[test]
    fn test_migrate_runs_inside_tunnel() {
        let (_dir, context) = context();
        let runner = runner().respond("DATABASE_URL=*** dbmate up", "Applied: 20240101_init.sql");

        let output = DatabaseOperations::new(&context, &runner)
            .migrate("staging")
            .unwrap();
        assert_eq!(output, "Applied: 20240101_init.sql");

        let calls = runner.calls();
        let forward = calls
            .iter()
            .position(|c| c.starts_with("kubectl port-forward pgbouncer-7d9 5433:5432"))
            .unwrap();
        let migrate = calls.iter().position(|c| c == "DATABASE_URL=*** dbmate up").unwrap();
        assert!(forward < migrate);
        assert_eq!(runner.terminations(), 1);
    }

    #[test]
    fn test_migrate_failure_still_closes_tunnel() {
        let (_dir, context) = context();
        let runner = runner().fail("DATABASE_URL=*** dbmate", 1, "Error: pq: relation exists");

        let err = DatabaseOperations::new(&context, &runner)
            .migrate("staging")
            .unwrap_err();
        assert!(matches!(err, KubeError::CommandFailed { .. }));
        assert_eq!(runner.terminations(), 1);
    }

    #[test]
    fn test_dump_prefers_7z() {
        let (_dir, context) = context();
        let runner = runner()
            .with_executable("pg_dump")
            .with_executable("7z")
            .with_executable("gzip");

        let result = DatabaseOperations::new(&context, &runner)
            .dump(&DumpOptions::new("staging"))
            .unwrap();

        assert_eq!(result.compressor, Compressor::SevenZip);
        assert_eq!(result.database, "payments");
        let name = result.path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("payments-") && name.ends_with(".7z"), "{name}");
        assert!(result.path.starts_with("/backups"));

        let piped = runner.calls_matching("pg_dump");
        assert_eq!(piped.len(), 1);
        assert!(piped[0].starts_with("pg_dump postgres://app:pw@127.0.0.1:5433/payments | 7z a -si /backups/payments-"));
        assert_eq!(runner.terminations(), 1);
    }

    #[test]
    fn test_dump_falls_back_to_gzip() {
        let (_dir, context) = context();
        let runner = runner().with_executable("pg_dump").with_executable("gzip");

        let result = DatabaseOperations::new(&context, &runner)
            .dump(&DumpOptions::new("staging").with_database("analytics"))
            .unwrap();

        assert_eq!(result.compressor, Compressor::Gzip);
        assert_eq!(result.database, "analytics");
        let piped = runner.calls_matching("pg_dump");
        assert!(piped[0].starts_with("pg_dump postgres://app:pw@127.0.0.1:5433/analytics | gzip -c > /backups/analytics-"));
        assert!(piped[0].ends_with(".gz"));
    }

    #[test]
    fn test_failed_dump_leaves_no_file() {
        let (_dir, mut context) = context();
        let backups = tempfile::tempdir().unwrap();
        context.config.database.output_dir = backups.path().to_path_buf();
        let runner = runner()
            .with_executable("pg_dump")
            .with_executable("gzip")
            .fail("pg_dump", 1, "pg_dump: error: connection to server failed");

        let err = DatabaseOperations::new(&context, &runner)
            .dump(&DumpOptions::new("staging"))
            .unwrap_err();

        assert!(matches!(err, KubeError::CommandFailed { .. }));
        assert_eq!(runner.calls_matching("pg_dump").len(), 1);
        assert_eq!(fs::read_dir(backups.path()).unwrap().count(), 0);
        assert_eq!(runner.terminations(), 1);
    }

    #[test]
    fn test_dump_requires_pg_dump() {
        let (_dir, context) = context();
        let runner = runner().with_executable("7z");

        let err = DatabaseOperations::new(&context, &runner)
            .dump(&DumpOptions::new("staging"))
            .unwrap_err();
        assert!(matches!(err, KubeError::MissingExecutable { program } if program == "pg_dump"));
        assert_eq!(runner.spawned(), 0);
    }

    #[test]
    fn test_dump_requires_compressor() {
        let (_dir, context) = context();
        let runner = runner().with_executable("pg_dump");

        let err = DatabaseOperations::new(&context, &runner)
            .dump(&DumpOptions::new("staging"))
            .unwrap_err();
        assert!(matches!(err, KubeError::MissingExecutable { .. }));
        assert_eq!(runner.spawned(), 0);
    }
}
