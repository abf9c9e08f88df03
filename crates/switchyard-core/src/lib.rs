//! Switchyard Core - Resilience primitives
//!
//! This crate provides the building blocks the gateway uses to isolate
//! misbehaving backends:
//! - Utils: per-backend circuit breaker

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod utils;

pub use utils::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState};
