//! CLI command: `switchyard config`
//!
//! Prints the configuration the other commands would run with.

use crate::loader::{embedded_defaults, load_config};
use anyhow::{Context, Result};

/// Run the config subcommand.
pub fn run(defaults_only: bool) -> Result<()> {
    let config = if defaults_only {
        embedded_defaults()?
    } else {
        load_config()?
    };

    let rendered = toml::to_string_pretty(&config).context("Failed to serialize configuration")?;
    print!("{rendered}");
    Ok(())
}
