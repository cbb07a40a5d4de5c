//! Restart command - rollout restart every deployment of a namespace

use console::style;
use kchart_core::DeployContext;
use kchart_kube::{CommandRunner, Deployer};

use crate::error::Result;

/// Run the restart command
pub fn run<R: CommandRunner + ?Sized>(
    context: &DeployContext,
    runner: &R,
    namespace: &str,
) -> Result<()> {
    let deployer = Deployer::new(context, runner);
    deployer.check_environment(namespace)?;
    deployer.restart(namespace)?;

    println!(
        "{} Restarted deployments in {}",
        style("✓").green().bold(),
        style(namespace).cyan()
    );
    Ok(())
}
