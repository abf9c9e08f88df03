//! Cost - pricing lookup, cost calculation and savings advice
//!
//! This module turns token counts into money and proposes ways to spend less.
//!
//! # Module Structure
//!
//! - `pricing`: Per-1K-token price points and the `provider:model` table
//! - `record`: The derived `Cost` value
//! - `calculator`: Cost calculation with a single unknown-pricing policy
//! - `optimization`: Heuristic savings suggestions

mod calculator;
mod optimization;
mod pricing;
mod record;


pub use calculator::{calculate_cost, CostCalculator};
pub use optimization::{
    format_optimization, generate_optimization_suggestions, CostOptimization, EffortLevel,
    ImpactLevel, OptimizationSuggestion, SuggestionKind,
};
pub use pricing::{default_pricing, pricing_key, ModelPricing, PricingTable, DEFAULT_CURRENCY};
pub use record::{Cost, PricingSource};
