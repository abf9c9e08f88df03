//! Circuit Breaker pattern implementation
//!
//! Stops traffic to a backend after repeated failures and periodically lets a
//! single trial request through to probe for recovery.
//! The circuit breaker has three states:
//! - Closed: Normal operation, requests pass through
//! - Open: Failures reached the threshold, requests are rejected
//! - HalfOpen: The reset window elapsed, exactly one trial request is allowed
//!
//! All transitions go through [`CircuitBreaker::allow`] and
//! [`CircuitBreaker::record_result`]; there is no other way to move the
//! state machine except an explicit [`CircuitBreaker::reset`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};


/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - requests pass through
    Closed,
    /// Failures reached the threshold - requests are rejected
    Open,
    /// Testing recovery - a single trial request passes through
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Configuration for circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Duration to wait before an open circuit admits a trial request
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set failure threshold
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set reset timeout
    #[must_use]
    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }
}

/// Point-in-time view of a breaker, safe to hand out to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitSnapshot {
    /// Breaker name (the provider it guards)
    pub name: String,
    /// Current state
    pub state: CircuitState,
    /// Failures recorded since the last success
    pub failure_count: u32,
    /// When the most recent failure was recorded
    pub last_failure_at: Option<DateTime<Utc>>,
    /// When an open breaker will admit its next trial request
    pub next_retry_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<DateTime<Utc>>,
    next_retry: Option<Instant>,
    next_retry_at: Option<DateTime<Utc>>,
    trial_in_flight: bool,
}

impl Inner {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_at: None,
            next_retry: None,
            next_retry_at: None,
            trial_in_flight: false,
        }
    }
}

/// Circuit breaker for fault tolerance
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner::closed()),
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Get the circuit breaker name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the breaker configuration
    #[must_use]
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Get the current state.
    ///
    /// This does not perform the lazy Open -> HalfOpen transition; only
    /// [`allow`](Self::allow) does.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Get current failure count
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// Snapshot the breaker for reporting
    #[must_use]
    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.lock();
        CircuitSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            last_failure_at: inner.last_failure_at,
            next_retry_at: inner.next_retry_at,
        }
    }

    /// Decide whether a request may be attempted now.
    ///
    /// An open breaker whose reset window has elapsed moves to half-open and
    /// grants exactly one trial; further calls are denied until that trial's
    /// outcome is recorded.
    #[must_use]
    pub fn allow(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let due = inner.next_retry.map_or(true, |at| Instant::now() >= at);
                if due {
                    info!(name = %self.name, "Circuit breaker entering half-open state");
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    false
                } else {
                    inner.trial_in_flight = true;
                    true
                }
            }
        }
    }

    /// Record the outcome of an attempt that [`allow`](Self::allow) permitted
    pub fn record_result(&self, success: bool) {
        if success {
            self.record_success();
        } else {
            self.record_failure();
        }
    }

    /// Record a successful operation. Any success closes the circuit.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            info!(name = %self.name, "Circuit breaker closed");
        }
        let last_failure_at = inner.last_failure_at;
        *inner = Inner::closed();
        inner.last_failure_at = last_failure_at;
    }

    /// Record a failed operation
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure_at = Some(Utc::now());

        match inner.state {
            CircuitState::Closed => {
                debug!(
                    name = %self.name,
                    failures = inner.failure_count,
                    threshold = self.config.failure_threshold,
                    "Circuit breaker failure recorded"
                );
                if inner.failure_count >= self.config.failure_threshold.max(1) {
                    self.open(&mut inner);
                }
            }
            CircuitState::HalfOpen => {
                warn!(
                    name = %self.name,
                    "Circuit breaker failure in half-open state, reopening"
                );
                self.open(&mut inner);
            }
            CircuitState::Open => {
                // A request admitted before the circuit opened; keep the current window.
            }
        }
    }

    /// Give back a permission from [`allow`](Self::allow) without recording an
    /// outcome. A half-open breaker becomes ready for another trial.
    pub fn release(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.trial_in_flight = false;
        }
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        let mut inner = self.lock();
        *inner = Inner::closed();
    }

    fn open(&self, inner: &mut Inner) {
        info!(
            name = %self.name,
            failures = inner.failure_count,
            retry_in_ms = self.config.reset_timeout.as_millis() as u64,
            "Circuit breaker opened"
        );
        inner.state = CircuitState::Open;
        inner.trial_in_flight = false;
        inner.next_retry = Some(Instant::now() + self.config.reset_timeout);
        inner.next_retry_at = chrono::Duration::from_std(self.config.reset_timeout)
            .ok()
            .map(|window| Utc::now() + window);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
