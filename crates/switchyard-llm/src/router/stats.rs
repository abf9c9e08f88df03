//! Per-provider request statistics

use crate::util::{running_mean, sanitize_error_for_user};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cumulative statistics for one provider.
///
/// Only attempts that reached the provider and ran to an outcome are
/// counted. Breaker rejections are not, and neither are cancelled attempts:
/// a caller cancellation, a provider reporting `Cancelled`, a dropped stream
/// receiver or an abandoned future all leave the stats untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStats {
    /// Provider name
    pub provider: String,
    /// Attempts that reached the provider
    pub total_requests: u64,
    /// Successful attempts
    pub successful_requests: u64,
    /// Failed attempts
    pub failed_requests: u64,
    /// Mean latency of successful attempts
    pub average_latency_ms: f64,
    /// Accumulated cost of successful attempts
    pub total_cost: f64,
    /// Accumulated tokens of successful attempts
    pub total_tokens: u64,
    /// Last attempt time
    pub last_used: Option<DateTime<Utc>>,
    /// `failed_requests / total_requests`
    pub error_rate: f64,
    /// Most recent failure, sanitized
    pub last_error: Option<String>,
}

impl ProviderStats {
    /// Create empty stats
    #[must_use]
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            average_latency_ms: 0.0,
            total_cost: 0.0,
            total_tokens: 0,
            last_used: None,
            error_rate: 0.0,
            last_error: None,
        }
    }

    /// Record a successful attempt
    pub fn record_success(&mut self, latency_ms: u64, tokens: u64, cost: f64) {
        self.total_requests += 1;
        self.successful_requests += 1;
        self.total_tokens += tokens;
        self.total_cost += cost;
        self.average_latency_ms = running_mean(
            self.average_latency_ms,
            latency_ms as f64,
            self.successful_requests,
        );
        self.touch();
    }

    /// Record a failed attempt
    pub fn record_failure(&mut self, error: &str) {
        self.total_requests += 1;
        self.failed_requests += 1;
        self.last_error = Some(sanitize_error_for_user(error));
        self.touch();
    }

    /// Success rate in `[0, 1]`; 1.0 before any attempt
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 1.0;
        }
        self.successful_requests as f64 / self.total_requests as f64
    }

    fn touch(&mut self) {
        self.last_used = Some(Utc::now());
        self.error_rate = self.failed_requests as f64 / self.total_requests as f64;
    }
}
