//! Deterministic stub provider for tests and simulations
//!
//! Replies are a pure function of the request unless replies or failures were
//! queued, so the same request always produces the same content.

use super::provider::{Provider, ProviderCapabilities, ProviderInfo, ProviderStatus};
use crate::cost::ModelPricing;
use crate::error::{Error, Result};
use crate::generation::{chunk_channel, GenerationRequest, GenerationResponse, StreamChunk, TokenUsage};
use crate::token::{count_request_tokens, count_tokens};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Stub per-1K input cost
const STUB_INPUT_COST: f64 = 0.001;
/// Stub per-1K output cost
const STUB_OUTPUT_COST: f64 = 0.002;

enum StubReply {
    Content(String),
    Failure(Error),
}

/// A provider that echoes the last user message, or plays back queued
/// replies and failures.
pub struct StubProvider {
    name: String,
    default_model: String,
    pricing: ModelPricing,
    latency: Option<Duration>,
    chunk_delay: Option<Duration>,
    replies: Mutex<VecDeque<StubReply>>,
    failing: Mutex<Option<String>>,
    healthy: AtomicBool,
    calls: AtomicUsize,
}

impl StubProvider {
    /// Create a stub named `name` serving `<name>-model`
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let default_model = format!("{name}-model");
        let pricing = ModelPricing::new(&name, &default_model, STUB_INPUT_COST, STUB_OUTPUT_COST)
            .with_context_window(128_000);
        Self {
            name,
            default_model,
            pricing,
            latency: None,
            chunk_delay: None,
            replies: Mutex::new(VecDeque::new()),
            failing: Mutex::new(None),
            healthy: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        }
    }

    /// Serve `model` by default
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self.pricing.model = self.default_model.clone();
        self
    }

    /// Declare a price point
    #[must_use]
    pub fn with_pricing(mut self, pricing: ModelPricing) -> Self {
        self.pricing = pricing;
        self
    }

    /// Sleep this long before every reply
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Sleep this long before every streamed chunk
    #[must_use]
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Fail every call with an API error
    #[must_use]
    pub fn failing(self, message: impl Into<String>) -> Self {
        self.set_failing(Some(message.into()));
        self
    }

    /// Switch the always-fail mode on (`Some`) or off (`None`)
    pub fn set_failing(&self, message: Option<String>) {
        *lock(&self.failing) = message;
    }

    /// Queue a one-shot reply
    pub fn push_reply(&self, content: impl Into<String>) {
        lock(&self.replies).push_back(StubReply::Content(content.into()));
    }

    /// Queue a one-shot failure
    pub fn push_failure(&self, error: Error) {
        lock(&self.replies).push_back(StubReply::Failure(error));
    }

    /// Set the health probe result
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Number of generate/stream calls received
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_content(&self, request: &GenerationRequest) -> Result<String> {
        if let Some(reply) = lock(&self.replies).pop_front() {
            return match reply {
                StubReply::Content(content) => Ok(content),
                StubReply::Failure(error) => Err(error),
            };
        }
        if let Some(message) = lock(&self.failing).clone() {
            return Err(Error::Api(message));
        }
        Ok(format!(
            "[{}] {}",
            self.name,
            request.last_user_message().unwrap_or_default()
        ))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait::async_trait]
impl Provider for StubProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.name.clone(),
            models: vec![self.default_model.clone()],
            default_model: self.default_model.clone(),
            capabilities: ProviderCapabilities {
                streaming: true,
                max_context_tokens: self.pricing.context_window,
            },
            pricing: self.pricing.clone(),
            status: ProviderStatus::Available,
        }
    }

    fn pricing(&self) -> ModelPricing {
        self.pricing.clone()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let content = self.next_content(request)?;
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        let usage = TokenUsage::new(
            &self.name,
            &model,
            count_request_tokens(request) as u64,
            count_tokens(&content) as u64,
        );
        Ok(GenerationResponse::new(&self.name, model, content, usage))
    }

    async fn stream(
        &self,
        request: &GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<StreamChunk>> {
        let response = self.generate(request).await?;
        let delay = self.chunk_delay;
        let (tx, rx) = chunk_channel(16);

        tokio::spawn(async move {
            let mut cancelled = false;
            for word in response.content.split_inclusive(' ') {
                let step = async {
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    tx.send(word).await
                };
                let sent = tokio::select! {
                    _ = cancel.cancelled() => {
                        cancelled = true;
                        false
                    }
                    sent = step => sent,
                };
                if !sent {
                    break;
                }
            }

            if cancelled {
                tx.fail(Error::Cancelled).await;
            } else if !tx.is_closed() {
                tx.finish(response.finish_reason, Some(response.usage)).await;
            }
        });

        Ok(rx)
    }

    async fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}
