//! Manager implementation
//!
//! The Manager owns the provider registry plus one circuit breaker and one
//! stats record per provider. Its lock is held only for in-memory
//! bookkeeping, never across a provider call.

use super::config::ManagerConfig;
use super::provider::{Provider, ProviderInfo, ProviderStatus};
use super::stats::ProviderStats;
use crate::cost::{calculate_cost, Cost, CostCalculator, PricingSource};
use crate::error::{Error, Result};
use crate::generation::{GenerationRequest, GenerationResponse, StreamChunk, TokenUsage};
use crate::usage::BudgetGate;
use chrono::Utc;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use switchyard_core::{CircuitBreaker, CircuitSnapshot, CircuitState};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Buffer of the channel handed to stream callers
const STREAM_BUFFER: usize = 32;

#[derive(Default)]
struct ManagerState {
    providers: HashMap<String, Arc<dyn Provider>>,
    breakers: HashMap<String, Arc<CircuitBreaker>>,
    stats: HashMap<String, ProviderStats>,
}

/// One breaker-approved attempt. Dropping it without an outcome gives the
/// permission back, so an abandoned half-open trial cannot wedge the breaker.
struct Attempt {
    breaker: Arc<CircuitBreaker>,
    settled: bool,
}

impl Attempt {
    fn begin(name: &str, breaker: Arc<CircuitBreaker>) -> Result<Self> {
        if !breaker.allow() {
            debug!(provider = %name, "Circuit open, skipping provider");
            return Err(Error::CircuitOpen(name.to_string()));
        }
        Ok(Self {
            breaker,
            settled: false,
        })
    }

    fn succeed(mut self) {
        self.breaker.record_success();
        self.settled = true;
    }

    fn fail(mut self, error: &Error) {
        if error.counts_toward_breaker() {
            self.breaker.record_failure();
        } else {
            self.breaker.release();
        }
        self.settled = true;
    }
}

impl Drop for Attempt {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.release();
        }
    }
}

/// Multi-provider manager with breaker-gated fallback routing
pub struct Manager {
    config: ManagerConfig,
    state: Arc<RwLock<ManagerState>>,
    cost_calculator: Option<Arc<CostCalculator>>,
    budget_gate: Option<Arc<dyn BudgetGate>>,
}

impl Manager {
    /// Create a manager with no providers registered
    #[must_use]
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(ManagerState::default())),
            cost_calculator: None,
            budget_gate: None,
        }
    }

    /// Price responses from a table instead of each provider's declared rates
    #[must_use]
    pub fn with_cost_calculator(mut self, calculator: CostCalculator) -> Self {
        self.cost_calculator = Some(Arc::new(calculator));
        self
    }

    /// Consult `gate` before any request that carries a session id
    #[must_use]
    pub fn with_budget_gate(mut self, gate: Arc<dyn BudgetGate>) -> Self {
        self.budget_gate = Some(gate);
        self
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Register a provider under `name`.
    ///
    /// The provider's breaker and stats are created on first registration
    /// and survive re-registration.
    pub async fn register(&self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        let name = name.into();
        let breaker_config = self.config.circuit_breaker.to_breaker_config();
        let mut state = self.state.write().await;

        state
            .breakers
            .entry(name.clone())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name.clone(), breaker_config)));
        state
            .stats
            .entry(name.clone())
            .or_insert_with(|| ProviderStats::new(name.clone()));
        if state.providers.insert(name.clone(), provider).is_some() {
            info!(provider = %name, "Provider replaced");
        } else {
            debug!(provider = %name, "Registering provider");
        }
    }

    /// Check that the primary provider is registered
    pub async fn validate(&self) -> Result<()> {
        if self.has_provider(&self.config.primary).await {
            Ok(())
        } else {
            Err(Error::NotConfigured(self.config.primary.clone()))
        }
    }

    /// Check if a provider is registered
    pub async fn has_provider(&self, name: &str) -> bool {
        self.state.read().await.providers.contains_key(name)
    }

    /// Registered provider names, sorted
    pub async fn provider_names(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut names: Vec<_> = state.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Generate a response, failing over along the fallback order.
    ///
    /// Each provider is tried at most once. Providers that are unregistered or
    /// whose breaker denies traffic are skipped without a call. If every
    /// candidate fails, the error wraps the primary's original failure.
    #[instrument(skip(self, request), fields(primary = %self.config.primary))]
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        self.check_budget(request).await?;
        self.validate().await?;

        let primary = self.config.primary.as_str();
        let mut attempts = 0;
        let primary_error = match self.generate_with_provider(primary, request).await {
            Ok(response) => return Ok(response),
            Err(error) => {
                if !matches!(error, Error::CircuitOpen(_)) {
                    attempts += 1;
                    warn!(provider = %primary, error = %error, "Primary provider failed");
                }
                error
            }
        };

        for name in self.config.fallback_candidates() {
            if !self.has_provider(name).await {
                debug!(provider = %name, "Fallback provider not registered, skipping");
                continue;
            }
            match self.generate_with_provider(name, request).await {
                Ok(response) => {
                    info!(provider = %name, attempts, "Fallback provider succeeded");
                    return Ok(response);
                }
                Err(Error::CircuitOpen(_)) => {}
                Err(error) => {
                    attempts += 1;
                    warn!(provider = %name, error = %error, "Fallback provider failed");
                }
            }
        }

        Err(Error::AllProvidersFailed {
            primary: primary.to_string(),
            attempts,
            source: Box::new(primary_error),
        })
    }

    /// [`generate`](Self::generate), abandoned with [`Error::Cancelled`] as
    /// soon as `cancel` fires. An abandoned attempt is not counted against
    /// the provider.
    pub async fn generate_with_cancel(
        &self,
        request: &GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<GenerationResponse> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = self.generate(request) => result,
        }
    }

    /// Generate with one named provider, breaker-gated, without fallback
    #[instrument(skip(self, request))]
    pub async fn generate_with_provider(
        &self,
        name: &str,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse> {
        let (provider, breaker) = self.lookup(name).await?;
        let attempt = Attempt::begin(name, breaker)?;

        let prepared = self.prepare_request(name, provider.as_ref(), request);
        let timeout = prepared
            .timeout
            .unwrap_or_else(|| self.config.default_timeout());

        let started = Instant::now();
        let outcome = match tokio::time::timeout(timeout, provider.generate(&prepared)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(timeout.as_millis() as u64)),
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(mut response) => {
                attempt.succeed();

                response.provider = name.to_string();
                if response.model.is_empty() {
                    response.model = prepared.model.clone().unwrap_or_default();
                }
                response.usage.provider = name.to_string();
                if response.usage.model.is_empty() {
                    response.usage.model = response.model.clone();
                }
                response.usage.normalize_total();
                response.latency_ms = latency_ms;
                response.timestamp = Utc::now();
                response.cost =
                    price_usage(self.cost_calculator.as_deref(), provider.as_ref(), &response.usage);

                let cost = response.cost.as_ref().map_or(0.0, |c| c.total_cost);
                let tokens = response.usage.total_tokens;
                update_stats(&self.state, name, |stats| {
                    stats.record_success(latency_ms, tokens, cost);
                })
                .await;

                debug!(
                    provider = %name,
                    model = %response.model,
                    latency_ms,
                    tokens,
                    "Generation succeeded"
                );
                Ok(response)
            }
            Err(error) => {
                attempt.fail(&error);
                record_failure(&self.state, name, &error).await;
                Err(error)
            }
        }
    }

    /// Start a streamed generation, failing over along the fallback order
    /// until a stream is established.
    ///
    /// Once a provider has accepted the request its stream is returned as-is;
    /// there is no failover mid-stream. The returned channel yields exactly
    /// one terminal chunk and then closes, including on cancellation.
    #[instrument(skip(self, request, cancel), fields(primary = %self.config.primary))]
    pub async fn stream(
        &self,
        request: &GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<StreamChunk>> {
        self.check_budget(request).await?;
        self.validate().await?;

        let primary = self.config.primary.as_str();
        let mut attempts = 0;
        let primary_error = match self.stream_with_provider(primary, request, cancel.clone()).await {
            Ok(rx) => return Ok(rx),
            Err(error) => {
                if !matches!(error, Error::CircuitOpen(_)) {
                    attempts += 1;
                    warn!(provider = %primary, error = %error, "Primary provider failed to stream");
                }
                error
            }
        };

        for name in self.config.fallback_candidates() {
            if !self.has_provider(name).await {
                continue;
            }
            match self.stream_with_provider(name, request, cancel.clone()).await {
                Ok(rx) => {
                    info!(provider = %name, attempts, "Fallback provider streaming");
                    return Ok(rx);
                }
                Err(Error::CircuitOpen(_)) => {}
                Err(error) => {
                    attempts += 1;
                    warn!(provider = %name, error = %error, "Fallback provider failed to stream");
                }
            }
        }

        Err(Error::AllProvidersFailed {
            primary: primary.to_string(),
            attempts,
            source: Box::new(primary_error),
        })
    }

    async fn stream_with_provider(
        &self,
        name: &str,
        request: &GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<StreamChunk>> {
        let (provider, breaker) = self.lookup(name).await?;
        let attempt = Attempt::begin(name, breaker)?;

        let prepared = self.prepare_request(name, provider.as_ref(), request);
        let timeout = prepared
            .timeout
            .unwrap_or_else(|| self.config.default_timeout());

        let started = Instant::now();
        let setup = match tokio::time::timeout(timeout, provider.stream(&prepared, cancel.clone()))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(timeout.as_millis() as u64)),
        };
        let upstream = match setup {
            Ok(rx) => rx,
            Err(error) => {
                attempt.fail(&error);
                record_failure(&self.state, name, &error).await;
                return Err(error);
            }
        };

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(forward_stream(StreamForward {
            name: name.to_string(),
            provider,
            calculator: self.cost_calculator.clone(),
            state: Arc::clone(&self.state),
            attempt,
            started,
            upstream,
            downstream: tx,
            cancel,
        }));
        Ok(rx)
    }

    /// Stats for one provider
    pub async fn stats(&self, name: &str) -> Option<ProviderStats> {
        self.state.read().await.stats.get(name).cloned()
    }

    /// Stats for every registered provider
    pub async fn all_stats(&self) -> HashMap<String, ProviderStats> {
        self.state.read().await.stats.clone()
    }

    /// Breaker snapshot for one provider
    pub async fn circuit_state(&self, name: &str) -> Option<CircuitSnapshot> {
        self.state
            .read()
            .await
            .breakers
            .get(name)
            .map(|breaker| breaker.snapshot())
    }

    /// Describe every registered provider, sorted by registered name.
    ///
    /// Status reflects the provider's breaker.
    pub async fn providers(&self) -> Vec<ProviderInfo> {
        let state = self.state.read().await;
        let mut names: Vec<_> = state.providers.keys().collect();
        names.sort();

        names
            .into_iter()
            .filter_map(|name| {
                let provider = state.providers.get(name)?;
                let mut info = provider.info();
                info.status = state
                    .breakers
                    .get(name)
                    .map_or(ProviderStatus::Available, |b| status_of(&b.snapshot()));
                Some(info)
            })
            .collect()
    }

    /// Probe every registered provider concurrently, each probe bounded by
    /// the health check timeout
    pub async fn health_check(&self) -> HashMap<String, bool> {
        let providers: Vec<(String, Arc<dyn Provider>)> = {
            let state = self.state.read().await;
            state
                .providers
                .iter()
                .map(|(name, provider)| (name.clone(), Arc::clone(provider)))
                .collect()
        };
        let bound = self.config.health_check_timeout();

        let probes = providers.into_iter().map(|(name, provider)| async move {
            let healthy = probe(provider.as_ref(), bound).await;
            if !healthy {
                warn!(provider = %name, "Health check failed");
            }
            (name, healthy)
        });
        join_all(probes).await.into_iter().collect()
    }

    /// Whether any registered provider admits traffic and passes its probe
    pub async fn is_healthy(&self) -> bool {
        let candidates: Vec<Arc<dyn Provider>> = {
            let state = self.state.read().await;
            state
                .providers
                .iter()
                .filter(|(name, _)| {
                    state
                        .breakers
                        .get(*name)
                        .map_or(true, |b| status_of(&b.snapshot()) != ProviderStatus::Unavailable)
                })
                .map(|(_, provider)| Arc::clone(provider))
                .collect()
        };
        let bound = self.config.health_check_timeout();

        join_all(candidates.iter().map(|p| probe(p.as_ref(), bound)))
            .await
            .into_iter()
            .any(|healthy| healthy)
    }

    async fn check_budget(&self, request: &GenerationRequest) -> Result<()> {
        if let (Some(gate), Some(session_id)) = (&self.budget_gate, &request.session_id) {
            gate.check(session_id).await?;
        }
        Ok(())
    }

    async fn lookup(&self, name: &str) -> Result<(Arc<dyn Provider>, Arc<CircuitBreaker>)> {
        let state = self.state.read().await;
        let provider = state
            .providers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotConfigured(name.to_string()))?;
        let breaker = state
            .breakers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotConfigured(name.to_string()))?;
        Ok((provider, breaker))
    }

    /// Copy of `request` with the model and timeout defaults filled in
    fn prepare_request(
        &self,
        name: &str,
        provider: &dyn Provider,
        request: &GenerationRequest,
    ) -> GenerationRequest {
        let mut prepared = request.clone();
        if prepared.model.is_none() {
            prepared.model = Some(
                self.config
                    .default_models
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| provider.default_model().to_string()),
            );
        }
        if prepared.timeout.is_none() {
            prepared.timeout = Some(self.config.default_timeout());
        }
        prepared
    }
}

struct StreamForward {
    name: String,
    provider: Arc<dyn Provider>,
    calculator: Option<Arc<CostCalculator>>,
    state: Arc<RwLock<ManagerState>>,
    attempt: Attempt,
    started: Instant,
    upstream: mpsc::Receiver<StreamChunk>,
    downstream: mpsc::Sender<StreamChunk>,
    cancel: CancellationToken,
}

/// Relay chunks to the caller and settle the attempt on the terminal chunk.
///
/// The attempt is settled before the terminal chunk is handed over, so a
/// slow consumer never holds a breaker permit.
async fn forward_stream(forward: StreamForward) {
    let StreamForward {
        name,
        provider,
        calculator,
        state,
        attempt,
        started,
        mut upstream,
        downstream,
        cancel,
    } = forward;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            chunk = upstream.recv() => chunk,
        };

        let Some(mut chunk) = next else {
            // Cancelled, or the producer went away without a terminal chunk
            let error = if cancel.is_cancelled() {
                Error::Cancelled
            } else {
                Error::InvalidResponse("stream ended without a terminal chunk".to_string())
            };
            attempt.fail(&error);
            record_failure(&state, &name, &error).await;
            deliver_terminal(&downstream, error_chunk(&error)).await;
            return;
        };

        if chunk.done {
            let latency_ms = started.elapsed().as_millis() as u64;
            let (tokens, cost) = match chunk.usage.as_mut() {
                Some(usage) => {
                    usage.provider = name.clone();
                    usage.normalize_total();
                    let cost = price_usage(calculator.as_deref(), provider.as_ref(), usage)
                        .map_or(0.0, |c| c.total_cost);
                    (usage.total_tokens, cost)
                }
                None => (0, 0.0),
            };
            attempt.succeed();
            update_stats(&state, &name, |stats| {
                stats.record_success(latency_ms, tokens, cost);
            })
            .await;
            deliver_terminal(&downstream, chunk).await;
            return;
        }

        if let Some(message) = chunk.error.clone() {
            let error = if cancel.is_cancelled() {
                Error::Cancelled
            } else {
                Error::Api(message)
            };
            attempt.fail(&error);
            record_failure(&state, &name, &error).await;
            deliver_terminal(&downstream, chunk).await;
            return;
        }

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            sent = downstream.send(chunk) => Some(sent.is_ok()),
        };
        match sent {
            Some(true) => {}
            Some(false) => {
                debug!(provider = %name, "Stream receiver dropped");
                attempt.fail(&Error::Cancelled);
                return;
            }
            None => {
                // The pending chunk is dropped; the terminal chunk follows
                let error = Error::Cancelled;
                attempt.fail(&error);
                deliver_terminal(&downstream, error_chunk(&error)).await;
                return;
            }
        }
    }
}

/// Hand over the terminal chunk, waiting for buffer space unless the
/// receiver is gone.
async fn deliver_terminal(downstream: &mpsc::Sender<StreamChunk>, chunk: StreamChunk) {
    tokio::select! {
        _ = downstream.send(chunk) => {}
        _ = downstream.closed() => {}
    }
}

fn error_chunk(error: &Error) -> StreamChunk {
    StreamChunk {
        content: String::new(),
        done: false,
        finish_reason: None,
        usage: None,
        error: Some(error.to_string()),
    }
}

/// Cost of a completed call: the table when attached, else the provider's
/// declared rates. A table miss leaves the cost unknown.
fn price_usage(
    calculator: Option<&CostCalculator>,
    provider: &dyn Provider,
    usage: &TokenUsage,
) -> Option<Cost> {
    match calculator {
        Some(calculator) => match calculator.cost_for(usage) {
            Ok(cost) => Some(cost),
            Err(error) => {
                warn!(
                    provider = %usage.provider,
                    model = %usage.model,
                    error = %error,
                    "Cost unavailable"
                );
                None
            }
        },
        None => Some(
            calculate_cost(usage, &provider.pricing()).with_source(PricingSource::Provider),
        ),
    }
}

/// Record a failed attempt. Cancelled attempts are not recorded.
async fn record_failure(state: &RwLock<ManagerState>, name: &str, error: &Error) {
    if matches!(error, Error::Cancelled) {
        return;
    }
    let message = error.to_string();
    update_stats(state, name, |stats| stats.record_failure(&message)).await;
}

async fn update_stats(
    state: &RwLock<ManagerState>,
    name: &str,
    update: impl FnOnce(&mut ProviderStats),
) {
    let mut state = state.write().await;
    let stats = state
        .stats
        .entry(name.to_string())
        .or_insert_with(|| ProviderStats::new(name));
    update(stats);
}

async fn probe(provider: &dyn Provider, bound: Duration) -> bool {
    tokio::time::timeout(bound, provider.is_healthy())
        .await
        .unwrap_or(false)
}

fn status_of(snapshot: &CircuitSnapshot) -> ProviderStatus {
    match snapshot.state {
        CircuitState::Closed => ProviderStatus::Available,
        CircuitState::HalfOpen => ProviderStatus::Degraded,
        CircuitState::Open => {
            let due = snapshot.next_retry_at.map_or(true, |at| at <= Utc::now());
            if due {
                ProviderStatus::Degraded
            } else {
                ProviderStatus::Unavailable
            }
        }
    }
}
