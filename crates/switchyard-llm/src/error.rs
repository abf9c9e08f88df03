//! Error types for switchyard-llm

use thiserror::Error;

/// Gateway error type
#[derive(Debug, Error)]
pub enum Error {
    /// Provider not registered or misconfigured
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// Circuit breaker rejected the attempt; no call was made
    #[error("circuit open for provider: {0}")]
    CircuitOpen(String),

    /// API error reported by the backend
    #[error("api error: {0}")]
    Api(String),

    /// Rate limit exceeded
    #[error("rate limit exceeded")]
    RateLimit,

    /// Invalid response
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The request itself was rejected as malformed
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Network error
    #[error("network error: {0}")]
    Network(String),

    /// Timeout
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// Caller cancelled the request
    #[error("request cancelled")]
    Cancelled,

    /// Every candidate provider failed
    #[error("all providers failed after {attempts} attempt(s); primary {primary}: {source}")]
    AllProvidersFailed {
        /// Primary provider name
        primary: String,
        /// Number of provider calls that were actually made
        attempts: usize,
        /// The primary provider's original error
        #[source]
        source: Box<Error>,
    },

    /// No price point known for this provider/model pair
    #[error("pricing not found for {provider}:{model}")]
    PricingNotFound {
        /// Provider name
        provider: String,
        /// Model name
        model: String,
    },

    /// Session spend reached its configured limit
    #[error("budget exceeded for session {session_id} ({period} limit)")]
    BudgetExceeded {
        /// Session identifier
        session_id: String,
        /// Which limit was hit ("daily" or "monthly")
        period: String,
    },
}

impl Error {
    /// Whether this failure should count against the provider's circuit breaker.
    ///
    /// Malformed requests and caller cancellations are not the backend's fault
    /// and leave the breaker untouched; every other provider error counts.
    #[must_use]
    pub fn counts_toward_breaker(&self) -> bool {
        !matches!(self, Self::InvalidRequest(_) | Self::Cancelled)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
