//! Router - provider abstraction and fallback routing
//!
//! This module defines the [`Provider`] contract every backend adapter
//! implements and the [`Manager`] that routes requests across providers.
//!
//! ## Resilience
//!
//! - **Circuit breakers**: one per provider; an open breaker skips the
//!   provider without a call
//! - **Fallback order**: after the primary fails, fallbacks are tried once
//!   each, in order
//! - **Stats**: request counts, error rate, mean latency, tokens and cost per
//!   provider
//!
//! # Module Structure
//!
//! - `provider`: Provider trait and descriptive types
//! - `config`: Manager configuration
//! - `stats`: Per-provider statistics
//! - `mock`: Deterministic stub provider
//! - `manager_impl`: Manager implementation

mod config;
mod manager_impl;
mod mock;
mod provider;
mod stats;


pub use config::{
    CircuitBreakerSettings, ManagerConfig, DEFAULT_FAILURE_THRESHOLD,
    DEFAULT_HEALTH_CHECK_TIMEOUT_MS, DEFAULT_RESET_TIMEOUT_MS, DEFAULT_RETRY_ATTEMPTS,
    DEFAULT_TIMEOUT_MS,
};
pub use manager_impl::Manager;
pub use mock::StubProvider;
pub use provider::{Provider, ProviderCapabilities, ProviderInfo, ProviderStatus};
pub use stats::ProviderStats;
