//! Valid environment command - check the namespace exists on this cluster

use console::style;
use kchart_core::DeployContext;
use kchart_kube::{CommandRunner, Deployer};

use crate::error::Result;

/// Run the valid_environment command
pub fn run<R: CommandRunner + ?Sized>(
    context: &DeployContext,
    runner: &R,
    namespace: &str,
) -> Result<()> {
    Deployer::new(context, runner).check_environment(namespace)?;

    println!(
        "{} Environment valid: namespace {}, chart {}, environments {}",
        style("✓").green().bold(),
        style(namespace).cyan(),
        style(&context.chart.name).cyan(),
        context.environments.names().collect::<Vec<_>>().join(", ")
    );
    Ok(())
}
