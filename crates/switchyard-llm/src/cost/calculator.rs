//! Cost calculation
//!
//! One policy for unknown models everywhere cost is computed: a lookup miss
//! is an explicit [`Error::PricingNotFound`] unless the caller opted into a
//! default price point, and costs priced that way are tagged
//! [`PricingSource::Default`].

use super::pricing::{ModelPricing, PricingTable};
use super::record::{Cost, PricingSource};
use crate::error::{Error, Result};
use crate::generation::TokenUsage;
use chrono::Utc;
use tracing::debug;

/// Compute the cost of `usage` at `pricing`. Pure and deterministic apart
/// from the timestamp.
#[must_use]
pub fn calculate_cost(usage: &TokenUsage, pricing: &ModelPricing) -> Cost {
    let input_cost = (usage.input_tokens as f64 / 1000.0) * pricing.input_cost_per_1k;
    let output_cost = (usage.output_tokens as f64 / 1000.0) * pricing.output_cost_per_1k;
    Cost {
        input_cost,
        output_cost,
        total_cost: input_cost + output_cost,
        currency: pricing.currency.clone(),
        provider: usage.provider.clone(),
        model: usage.model.clone(),
        timestamp: Utc::now(),
        pricing_source: PricingSource::Table,
    }
}

/// Cost calculator backed by a pricing table
#[derive(Debug, Clone, Default)]
pub struct CostCalculator {
    table: PricingTable,
    default_pricing: Option<ModelPricing>,
}

impl CostCalculator {
    /// Create a calculator over `table` with no fallback price point
    #[must_use]
    pub fn new(table: PricingTable) -> Self {
        Self {
            table,
            default_pricing: None,
        }
    }

    /// Opt into pricing unknown models at `pricing`
    #[must_use]
    pub fn with_default_pricing(mut self, pricing: ModelPricing) -> Self {
        self.default_pricing = Some(pricing);
        self
    }

    /// The underlying table
    #[must_use]
    pub fn table(&self) -> &PricingTable {
        &self.table
    }

    /// The opt-in fallback price point, if any
    #[must_use]
    pub fn default_pricing(&self) -> Option<&ModelPricing> {
        self.default_pricing.as_ref()
    }

    /// Resolve the price point for a provider/model pair
    pub fn pricing_for(&self, provider: &str, model: &str) -> Result<(&ModelPricing, PricingSource)> {
        if let Some(pricing) = self.table.get(provider, model) {
            return Ok((pricing, PricingSource::Table));
        }
        match &self.default_pricing {
            Some(pricing) => {
                debug!(provider, model, "Pricing unknown, using default price point");
                Ok((pricing, PricingSource::Default))
            }
            None => Err(Error::PricingNotFound {
                provider: provider.to_string(),
                model: model.to_string(),
            }),
        }
    }

    /// Cost of a completed call
    pub fn cost_for(&self, usage: &TokenUsage) -> Result<Cost> {
        let (pricing, source) = self.pricing_for(&usage.provider, &usage.model)?;
        Ok(calculate_cost(usage, pricing).with_source(source))
    }

    /// Estimate the cost of a call before making it
    pub fn estimate_cost(
        &self,
        provider: &str,
        model: &str,
        input_tokens: u64,
        estimated_output_tokens: u64,
    ) -> Result<f64> {
        let (pricing, _) = self.pricing_for(provider, model)?;
        let usage = TokenUsage::new(provider, model, input_tokens, estimated_output_tokens);
        Ok(calculate_cost(&usage, pricing).total_cost)
    }
}
