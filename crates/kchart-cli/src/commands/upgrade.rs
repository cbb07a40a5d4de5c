//! Upgrade command - helm upgrade a namespace with its environment values

use console::style;
use kchart_core::DeployContext;
use kchart_kube::{CommandRunner, Deployer, UpgradeOptions};

use crate::error::Result;

/// Run the upgrade command
pub fn run<R: CommandRunner + ?Sized>(
    context: &DeployContext,
    runner: &R,
    namespace: &str,
    version: Option<&str>,
    recreate_pods: bool,
) -> Result<()> {
    println!(
        "{} Upgrading {} with chart {}",
        style("→").blue().bold(),
        style(namespace).cyan(),
        style(&context.chart.name).cyan()
    );

    let mut options = UpgradeOptions::new(namespace);
    if let Some(version) = version {
        options = options.with_version(version);
    }
    if recreate_pods {
        options = options.recreate_pods();
    }

    let outcome = Deployer::new(context, runner).upgrade(&options)?;

    if !outcome.output.is_empty() {
        println!("{}", outcome.output);
    }
    if outcome.restarted {
        println!("{} Pods restarted", style("↻").yellow());
    }

    let change = if outcome.previous_version == outcome.version {
        style(outcome.version.clone()).yellow().to_string()
    } else {
        format!(
            "{} → {}",
            style(&outcome.previous_version).dim(),
            style(&outcome.version).yellow()
        )
    };
    println!(
        "{} Upgraded {} ({}) to {}",
        style("✓").green().bold(),
        style(&outcome.namespace).cyan(),
        outcome.environment,
        change
    );

    Ok(())
}
