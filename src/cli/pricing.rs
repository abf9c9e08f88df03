//! CLI command: `switchyard pricing`
//!
//! Lists the effective pricing table (built-ins plus configured overrides).

use crate::loader::load_config;
use anyhow::Result;
use switchyard_llm::ModelPricing;

/// Run the pricing subcommand.
pub fn run(provider: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let table = config.pricing.table();

    let rows: Vec<&ModelPricing> = match provider {
        Some(provider) => table.for_provider(provider),
        None => table.entries(),
    };

    println!();
    println!("  Model Pricing (per 1K tokens)");
    println!("  {}", "-".repeat(72));
    println!(
        "  {:<12} {:<22} {:>10} {:>10} {:>12}",
        "Provider", "Model", "Input", "Output", "Context"
    );
    println!("  {}", "-".repeat(72));

    if rows.is_empty() {
        println!("  (no pricing entries)");
    }
    for pricing in rows {
        println!(
            "  {:<12} {:<22} {:>10.5} {:>10.5} {:>12}",
            pricing.provider,
            pricing.model,
            pricing.input_cost_per_1k,
            pricing.output_cost_per_1k,
            pricing.context_window
        );
    }

    if let Some(default) = &config.pricing.default_pricing {
        println!("  {}", "-".repeat(72));
        println!(
            "  Unknown models billed at {:.5} / {:.5} {}",
            default.input_cost_per_1k, default.output_cost_per_1k, default.currency
        );
    }
    println!();

    Ok(())
}
