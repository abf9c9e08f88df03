//! Manager configuration
//!
//! Every field has a serde default so partial config files deserialize.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use switchyard_core::CircuitBreakerConfig;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// Default retry count (informational)
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
/// Default bound on a single health probe
pub const DEFAULT_HEALTH_CHECK_TIMEOUT_MS: u64 = 5_000;
/// Default consecutive failures before a breaker opens
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
/// Default open window before a trial request
pub const DEFAULT_RESET_TIMEOUT_MS: u64 = 60_000;

fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_retry_attempts() -> u32 {
    DEFAULT_RETRY_ATTEMPTS
}

fn default_health_check_timeout_ms() -> u64 {
    DEFAULT_HEALTH_CHECK_TIMEOUT_MS
}

fn default_failure_threshold() -> u32 {
    DEFAULT_FAILURE_THRESHOLD
}

fn default_reset_timeout_ms() -> u64 {
    DEFAULT_RESET_TIMEOUT_MS
}

// ============================================================================
// Circuit Breaker Settings
// ============================================================================

/// Breaker policy applied to every provider of one manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerSettings {
    /// Consecutive failures before the breaker opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Open window before a trial request, in milliseconds
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout_ms: DEFAULT_RESET_TIMEOUT_MS,
        }
    }
}

impl CircuitBreakerSettings {
    /// Build the breaker configuration
    #[must_use]
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new()
            .with_failure_threshold(self.failure_threshold)
            .with_reset_timeout(Duration::from_millis(self.reset_timeout_ms))
    }
}

// ============================================================================
// Manager Configuration
// ============================================================================

/// Provider selection and resilience policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Provider tried first
    #[serde(default)]
    pub primary: String,
    /// Providers tried, in order, after the primary fails
    #[serde(default)]
    pub fallback_order: Vec<String>,
    /// Whether the fallback chain is used at all
    #[serde(default = "default_true")]
    pub fallback_enabled: bool,
    /// Timeout applied to requests that carry none
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Informational; failover is the fallback chain, never a same-provider retry
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Bound on each health probe
    #[serde(default = "default_health_check_timeout_ms")]
    pub health_check_timeout_ms: u64,
    /// Breaker policy
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,
    /// Model to use per provider when a request names none
    #[serde(default)]
    pub default_models: HashMap<String, String>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            primary: String::new(),
            fallback_order: Vec::new(),
            fallback_enabled: true,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            health_check_timeout_ms: DEFAULT_HEALTH_CHECK_TIMEOUT_MS,
            circuit_breaker: CircuitBreakerSettings::default(),
            default_models: HashMap::new(),
        }
    }
}

impl ManagerConfig {
    /// Create a configuration with `primary` and defaults elsewhere
    #[must_use]
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            ..Default::default()
        }
    }

    /// Set the fallback order
    #[must_use]
    pub fn with_fallbacks<I, S>(mut self, fallbacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_order = fallbacks.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable the fallback chain
    #[must_use]
    pub fn with_fallback_enabled(mut self, enabled: bool) -> Self {
        self.fallback_enabled = enabled;
        self
    }

    /// Set the default request timeout
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the health probe bound
    #[must_use]
    pub fn with_health_check_timeout(mut self, timeout: Duration) -> Self {
        self.health_check_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the breaker policy
    #[must_use]
    pub fn with_circuit_breaker(mut self, failure_threshold: u32, reset_timeout: Duration) -> Self {
        self.circuit_breaker = CircuitBreakerSettings {
            failure_threshold,
            reset_timeout_ms: reset_timeout.as_millis() as u64,
        };
        self
    }

    /// Set the default model for one provider
    #[must_use]
    pub fn with_default_model(
        mut self,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        self.default_models.insert(provider.into(), model.into());
        self
    }

    /// Default request timeout
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Health probe bound
    #[must_use]
    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_millis(self.health_check_timeout_ms)
    }

    /// Fallback providers to try after the primary, without the primary
    /// itself and without duplicates. Empty when fallback is disabled.
    #[must_use]
    pub fn fallback_candidates(&self) -> Vec<&str> {
        if !self.fallback_enabled {
            return Vec::new();
        }
        let mut seen = Vec::new();
        for name in &self.fallback_order {
            if name != &self.primary && !seen.contains(&name.as_str()) {
                seen.push(name.as_str());
            }
        }
        seen
    }

    /// Primary followed by every distinct fallback
    #[must_use]
    pub fn provider_names(&self) -> Vec<&str> {
        let mut names = vec![self.primary.as_str()];
        names.extend(self.fallback_candidates());
        names
    }
}
