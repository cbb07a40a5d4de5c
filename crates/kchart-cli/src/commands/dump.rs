//! Dump command - compressed database dump through a tunnel

use console::style;
use kchart_core::DeployContext;
use kchart_kube::{CommandRunner, DatabaseOperations, Deployer, DumpOptions};

use crate::error::Result;

/// Run the dump command
pub fn run<R: CommandRunner + ?Sized>(
    context: &DeployContext,
    runner: &R,
    namespace: &str,
    database: Option<&str>,
) -> Result<()> {
    Deployer::new(context, runner).check_environment(namespace)?;

    let mut options = DumpOptions::new(namespace);
    if let Some(database) = database {
        options = options.with_database(database);
    }

    println!(
        "{} Dumping {} from {}",
        style("→").blue().bold(),
        style(database.unwrap_or("database")).yellow(),
        style(namespace).cyan()
    );

    let result = DatabaseOperations::new(context, runner).dump(&options)?;

    println!(
        "{} Dumped {} to {} ({})",
        style("✓").green().bold(),
        style(&result.database).yellow(),
        result.path.display(),
        result.compressor
    );
    Ok(())
}
