//! Console message formatting.

use colored::Colorize;
use dialoguer::Confirm;

use super::error::CliResult;

pub fn success(message: &str) -> String {
    format!("{} {}", "✓".green().bold(), message.green())
}

pub fn error(message: &str) -> String {
    format!("{} {}", "✗".red().bold(), message.red())
}

pub fn info(message: &str) -> String {
    format!("{} {}", "ℹ".cyan().bold(), message.cyan())
}

/// Ask a yes/no question; `assume_yes` answers it without prompting.
pub fn confirm(prompt: &str, default: bool, assume_yes: bool) -> CliResult<bool> {
    if assume_yes {
        return Ok(true);
    }
    Ok(Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact()?)
}
