//! Application configuration types
//!
//! Contains the configuration structures for the switchyard binary.

use serde::{Deserialize, Serialize};
use switchyard_llm::{CostCalculator, ManagerConfig, ModelPricing, PricingTable, TokenBudget};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Provider routing and resilience
    #[serde(default)]
    pub manager: ManagerConfig,
    /// Pricing table adjustments
    #[serde(default)]
    pub pricing: PricingConfig,
    /// Budget applied to sessions the CLI creates
    #[serde(default)]
    pub budget: BudgetConfig,
}

/// Pricing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Price point for models missing from the table. Unset means unknown
    /// models are reported as unpriced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_pricing: Option<ModelPricing>,
    /// Entries added to (or replacing) the built-in table
    #[serde(default)]
    pub overrides: Vec<ModelPricing>,
}

impl PricingConfig {
    /// Built-in table with overrides applied
    #[must_use]
    pub fn table(&self) -> PricingTable {
        let mut table = PricingTable::with_defaults();
        for pricing in &self.overrides {
            table.insert(pricing.clone());
        }
        table
    }

    /// Calculator over [`table`](Self::table) with the configured default
    #[must_use]
    pub fn calculator(&self) -> CostCalculator {
        let calculator = CostCalculator::new(self.table());
        match &self.default_pricing {
            Some(pricing) => calculator.with_default_pricing(pricing.clone()),
            None => calculator,
        }
    }
}

/// Budget configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Daily ceiling per session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_limit: Option<f64>,
    /// Monthly ceiling per session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_limit: Option<f64>,
}

impl BudgetConfig {
    /// The budget to attach, if any limit is set
    #[must_use]
    pub fn budget(&self) -> Option<TokenBudget> {
        if self.daily_limit.is_none() && self.monthly_limit.is_none() {
            return None;
        }
        let mut budget = TokenBudget::new();
        budget.daily_limit = self.daily_limit;
        budget.monthly_limit = self.monthly_limit;
        Some(budget)
    }
}
