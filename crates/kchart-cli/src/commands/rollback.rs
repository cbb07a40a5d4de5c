//! Rollback command - re-publish an older image and deploy it

use console::style;
use kchart_core::DeployContext;
use kchart_kube::{CommandRunner, Deployer, RollbackOptions, UpgradeOptions};

use crate::error::Result;

/// Run the rollback command
pub fn run<R: CommandRunner + ?Sized>(
    context: &DeployContext,
    runner: &R,
    namespace: &str,
    version: Option<&str>,
) -> Result<()> {
    let target = version.map_or_else(|| "previous release".to_string(), |v| format!("version {}", v));
    println!(
        "{} Rolling back {} to {}",
        style("→").blue().bold(),
        style(namespace).cyan(),
        style(&target).yellow()
    );

    let mut options = RollbackOptions::new(namespace);
    if let Some(version) = version {
        options = options.to_version(version);
    }

    let deployer = Deployer::new(context, runner);
    let plan = deployer.rollback(&options)?;

    println!(
        "  {} {}:{} republished as {}",
        style("•").dim(),
        plan.repository,
        style(&plan.base).yellow(),
        style(&plan.new_tag).yellow()
    );

    let outcome = deployer.upgrade(&UpgradeOptions::new(namespace).with_version(&plan.new_tag))?;
    if !outcome.output.is_empty() {
        println!("{}", outcome.output);
    }

    println!(
        "{} Rolled back {} to {} (image of {})",
        style("✓").green().bold(),
        style(namespace).cyan(),
        style(&outcome.version).yellow(),
        plan.base
    );
    Ok(())
}
