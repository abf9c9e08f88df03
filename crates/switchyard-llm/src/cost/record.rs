//! The derived monetary cost of one generation call

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::pricing::DEFAULT_CURRENCY;

/// Where the price point behind a [`Cost`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingSource {
    /// Exact `provider:model` entry in the pricing table
    Table,
    /// Rates declared by the provider adapter itself
    Provider,
    /// Opt-in fallback price point for unknown models
    Default,
}

/// Monetary cost; `total_cost` is always `input_cost + output_cost`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cost {
    /// Cost of prompt tokens
    pub input_cost: f64,
    /// Cost of completion tokens
    pub output_cost: f64,
    /// Input + output
    pub total_cost: f64,
    /// ISO currency code
    pub currency: String,
    /// Provider name
    pub provider: String,
    /// Model name
    pub model: String,
    /// When the cost was computed
    pub timestamp: DateTime<Utc>,
    /// Origin of the price point
    pub pricing_source: PricingSource,
}

impl Cost {
    /// Create a cost from its two components
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        input_cost: f64,
        output_cost: f64,
    ) -> Self {
        Self {
            input_cost,
            output_cost,
            total_cost: input_cost + output_cost,
            currency: DEFAULT_CURRENCY.to_string(),
            provider: provider.into(),
            model: model.into(),
            timestamp: Utc::now(),
            pricing_source: PricingSource::Table,
        }
    }

    /// A zero cost (free or local models)
    #[must_use]
    pub fn zero(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(provider, model, 0.0, 0.0)
    }

    /// Set the pricing source
    #[must_use]
    pub fn with_source(mut self, source: PricingSource) -> Self {
        self.pricing_source = source;
        self
    }

    /// Set the currency
    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }
}
