//! Patch secret command - set one key of the namespace secret

use console::style;
use kchart_core::DeployContext;
use kchart_kube::{CommandRunner, Deployer, SecretValidator};

use crate::error::{CliError, Result};

/// Run the patch_secret command
pub fn run<R: CommandRunner + ?Sized>(
    context: &DeployContext,
    runner: &R,
    namespace: &str,
    key: &str,
    value: &str,
) -> Result<()> {
    validate_key(key)?;
    Deployer::new(context, runner).check_environment(namespace)?;

    let validator = SecretValidator::new(context, runner);
    validator.patch(namespace, key, value)?;

    println!(
        "{} Set {} in {}",
        style("✓").green().bold(),
        style(key).yellow(),
        style(namespace).cyan()
    );

    // Report what is still missing, without failing the patch itself
    if let Err(e) = validator.check(namespace) {
        println!("{} {}", style("!").yellow().bold(), e);
    }
    Ok(())
}

/// Secret keys are limited to alphanumerics, `-`, `_` and `.`
fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(CliError::usage(format!("invalid secret key '{}'", key)))
    }
}
