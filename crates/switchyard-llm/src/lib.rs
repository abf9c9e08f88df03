//! Switchyard LLM - Multi-provider text generation gateway
//!
//! This crate provides:
//! - Router: Provider contract, breaker-gated fallback routing and per-provider stats
//! - Generation: Request/response/stream data model
//! - Cost: Pricing table, cost calculation and savings advice
//! - Usage: Per-session and per-day token ledger with budgets
//! - Token: Client-side token counting using tiktoken

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cost;
pub mod error;
pub mod generation;
pub mod message;
pub mod router;
pub mod token;
pub mod usage;
pub mod util;

pub use cost::{
    calculate_cost, default_pricing, generate_optimization_suggestions, Cost, CostCalculator,
    CostOptimization, ModelPricing, PricingSource, PricingTable,
};
pub use error::{Error, Result};
pub use generation::{
    chunk_channel, ChunkSender, GenerationRequest, GenerationResponse, StreamChunk, TokenUsage,
};
pub use message::{Message, MessageRole};
pub use router::{
    Manager, ManagerConfig, Provider, ProviderInfo, ProviderStats, ProviderStatus, StubProvider,
};
pub use token::{count_request_tokens, count_tokens, TokenCounter};
pub use usage::{
    BudgetGate, BudgetPeriod, BudgetStatus, BudgetWarning, SessionTokens, TokenBudget,
    TokenMetrics, TokenTracker, UsageEvent, WarningLevel,
};
