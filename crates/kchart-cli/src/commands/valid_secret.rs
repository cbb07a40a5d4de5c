//! Valid secret command - compare declared and deployed secret keys

use console::style;
use kchart_core::DeployContext;
use kchart_kube::{CommandRunner, Deployer, SecretValidator};

use crate::error::Result;

/// Run the valid_secret command
pub fn run<R: CommandRunner + ?Sized>(
    context: &DeployContext,
    runner: &R,
    namespace: &str,
) -> Result<()> {
    Deployer::new(context, runner).check_environment(namespace)?;
    SecretValidator::new(context, runner).check(namespace)?;

    println!(
        "{} Secrets in {} match the chart",
        style("✓").green().bold(),
        style(namespace).cyan()
    );
    Ok(())
}
