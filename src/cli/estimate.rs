//! CLI command: `switchyard estimate`

use crate::loader::load_config;
use anyhow::{Context, Result};

/// Run the estimate subcommand.
pub fn run(provider: &str, model: &str, input_tokens: u64, output_tokens: u64) -> Result<()> {
    let config = load_config()?;
    let calculator = config.pricing.calculator();

    let total = calculator
        .estimate_cost(provider, model, input_tokens, output_tokens)
        .with_context(|| format!("Cannot estimate cost for {provider}:{model}"))?;

    println!(
        "{provider}:{model}  {input_tokens} in / {output_tokens} out  ->  ${total:.6}"
    );
    Ok(())
}
