//! Usage - token ledger, daily metrics and session budgets
//!
//! # Module Structure
//!
//! - `types`: Ledger records and rollups
//! - `tracker`: `TokenTracker`, the ledger itself
//! - `budget`: Spending ceilings, the warning ladder and `BudgetGate`

mod budget;
mod tracker;
mod types;

#[cfg(test)]
mod tests;

#[cfg(test)]
pub use budget::MockBudgetGate;
pub use budget::{
    BudgetGate, BudgetPeriod, BudgetStatus, BudgetWarning, TokenBudget, WarningLevel,
};
pub use tracker::TokenTracker;
pub use types::{
    day_key, ProviderUsage, QueryTokens, SessionTokens, TokenMetrics, UsageBreakdown, UsageEvent,
    TOTAL_METRICS_KEY,
};
