//! Show command - displays the compiled configuration.

use anyhow::{Context, Result};

use crate::config::Config;

/// Show target for the show command.
pub enum ShowTarget {
    /// Paths and staging root status
    Config,
    /// Metadata policy, optionally as JSON
    Policy { json: bool },
}

/// Execute the show command.
pub fn cmd_show(target: ShowTarget, config: &Config) -> Result<()> {
    match target {
        ShowTarget::Config => config.print(),
        ShowTarget::Policy { json: false } => config.policy.print(),
        ShowTarget::Policy { json: true } => {
            let rendered = serde_json::to_string_pretty(&config.policy)
                .context("Failed to render policy as JSON")?;
            println!("{}", rendered);
        }
    }
    Ok(())
}
