//! Utility modules for switchyard-core
//!
//! - circuit_breaker: Circuit breaker pattern for fault tolerance

mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState};
