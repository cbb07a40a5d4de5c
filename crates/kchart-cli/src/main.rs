//! kchart CLI - deploy, roll back and maintain per-service Helm charts

use clap::{Parser, Subcommand};
use console::style;
use kchart_core::{Config, DeployContext};
use kchart_kube::SystemRunner;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod exit_codes;

use error::Result;

#[derive(Parser)]
#[command(name = "kchart")]
#[command(author = "kchart Contributors")]
#[command(version)]
#[command(about = "Deploy, roll back and maintain a service's Helm chart", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Echo every external command before it runs
    #[arg(long, global = true, env = "KCHART_DEBUG")]
    debug: bool,

    /// Repository root (the directory holding chart/)
    #[arg(short = 'C', long, global = true, default_value = ".")]
    chdir: PathBuf,

    /// Configuration file (default: .kchart.yaml, then ~/.config/kchart/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// helm upgrade the namespace with its environment values
    Upgrade {
        /// Target namespace
        #[arg(short, long)]
        namespace: String,

        /// Image tag to deploy, default keeps the running version
        #[arg(short, long)]
        version: Option<String>,

        /// Restart the pods afterwards. ATTENTION this can cause downtime!
        #[arg(short, long)]
        recreate_pods: bool,
    },

    /// Restart every deployment in the namespace
    Restart {
        /// Target namespace
        #[arg(short, long)]
        namespace: String,
    },

    /// Re-publish an older image under a new tag and deploy it
    Rollback {
        /// Target namespace
        #[arg(short, long)]
        namespace: String,

        /// Registry tag to roll back to, default the previous release
        #[arg(short, long)]
        version: Option<String>,
    },

    /// Show the environment and version a namespace runs
    Status {
        /// Target namespace
        #[arg(short, long)]
        namespace: String,
    },

    /// Check the namespace exists on the current cluster
    #[command(name = "valid_environment")]
    ValidEnvironment {
        /// Target namespace
        #[arg(short, long)]
        namespace: String,
    },

    /// Check the namespace secret has every key the chart declares
    #[command(name = "valid_secret")]
    ValidSecret {
        /// Target namespace
        #[arg(short, long)]
        namespace: String,
    },

    /// Set one key of the namespace secret
    #[command(name = "patch_secret")]
    PatchSecret {
        /// Target namespace
        #[arg(short, long)]
        namespace: String,

        /// Secret key
        #[arg(long)]
        key: String,

        /// Plain value, base64-encoded before patching
        #[arg(long)]
        value: String,
    },

    /// Run database migrations through a port-forward
    Migrate {
        /// Target namespace
        #[arg(short, long)]
        namespace: String,
    },

    /// Dump the database through a port-forward into a compressed file
    Dump {
        /// Target namespace
        #[arg(short, long)]
        namespace: String,

        /// Database to dump, default the one in the connection string
        #[arg(short, long)]
        database: Option<String>,
    },
}

fn main() {
    miette::set_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            std::process::exit(exit_codes::USAGE_ERROR);
        }
        Err(e) => e.exit(),
    };

    init_tracing(cli.debug);

    let code = match run(cli) {
        Ok(()) => exit_codes::SUCCESS,
        Err(err) => {
            println!("{} {}", style("✗").red().bold(), err);
            tracing::debug!(error = ?err, "command failed");
            err.exit_code()
        }
    };
    std::process::exit(code);
}

/// Log to stderr; `KCHART_LOG` overrides the level
fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("KCHART_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&cli.chdir, cli.config.as_deref())?;
    let context = DeployContext::load(&cli.chdir, config)?;
    let runner = SystemRunner::new(cli.debug);

    match cli.command {
        Commands::Upgrade {
            namespace,
            version,
            recreate_pods,
        } => commands::upgrade::run(
            &context,
            &runner,
            &namespace,
            version.as_deref(),
            recreate_pods,
        ),

        Commands::Restart { namespace } => commands::restart::run(&context, &runner, &namespace),

        Commands::Rollback { namespace, version } => {
            commands::rollback::run(&context, &runner, &namespace, version.as_deref())
        }

        Commands::Status { namespace } => commands::status::run(&context, &runner, &namespace),

        Commands::ValidEnvironment { namespace } => {
            commands::valid_environment::run(&context, &runner, &namespace)
        }

        Commands::ValidSecret { namespace } => {
            commands::valid_secret::run(&context, &runner, &namespace)
        }

        Commands::PatchSecret {
            namespace,
            key,
            value,
        } => commands::patch_secret::run(&context, &runner, &namespace, &key, &value),

        Commands::Migrate { namespace } => commands::migrate::run(&context, &runner, &namespace),

        Commands::Dump {
            namespace,
            database,
        } => commands::dump::run(&context, &runner, &namespace, database.as_deref()),
    }
}
