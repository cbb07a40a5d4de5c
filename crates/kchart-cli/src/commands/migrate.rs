//! Migrate command - apply schema migrations through a tunnel

use console::style;
use kchart_core::DeployContext;
use kchart_kube::{CommandRunner, DatabaseOperations, Deployer};

use crate::error::Result;

/// Run the migrate command
pub fn run<R: CommandRunner + ?Sized>(
    context: &DeployContext,
    runner: &R,
    namespace: &str,
) -> Result<()> {
    Deployer::new(context, runner).check_environment(namespace)?;

    println!(
        "{} Migrating database of {} through {}:{}",
        style("→").blue().bold(),
        style(namespace).cyan(),
        context.config.tunnel.local_host,
        context.config.tunnel.local_port
    );

    let output = DatabaseOperations::new(context, runner).migrate(namespace)?;
    if !output.is_empty() {
        println!("{}", output);
    }

    println!("{} Migrations applied", style("✓").green().bold());
    Ok(())
}
