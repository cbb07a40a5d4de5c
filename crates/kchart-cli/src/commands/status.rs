//! Status command - show what a namespace is running

use console::style;
use kchart_core::DeployContext;
use kchart_kube::{CommandRunner, Deployer};

use crate::error::Result;

/// Run the status command
pub fn run<R: CommandRunner + ?Sized>(
    context: &DeployContext,
    runner: &R,
    namespace: &str,
) -> Result<()> {
    let status = Deployer::new(context, runner).status(namespace)?;

    println!("{}", style("DEPLOYMENT").bold().underlined());
    println!("  Namespace:   {}", style(&status.namespace).cyan());
    println!("  Environment: {}", style(&status.environment).cyan());
    println!("  Chart:       {} ({})", status.chart, status.chart_api_version);
    println!("  Repository:  {}", status.repository);
    println!("  Version:     {}", style(&status.version).yellow());
    println!("  Image:       {}", style(&status.image).dim());
    println!("  Values:      {}", status.values_file.display());

    Ok(())
}
