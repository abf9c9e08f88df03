//! Provider trait definition
//!
//! Every text-generation backend adapter implements [`Provider`].

use crate::cost::ModelPricing;
use crate::error::Result;
use crate::generation::{GenerationRequest, GenerationResponse, StreamChunk};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Availability as reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    /// Taking traffic
    Available,
    /// Probing for recovery (half-open breaker)
    Degraded,
    /// Not taking traffic (open breaker)
    Unavailable,
}

/// What a provider can do
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    /// Supports incremental delivery
    pub streaming: bool,
    /// Largest context the default model accepts
    pub max_context_tokens: u32,
}

/// Static description of a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Provider name
    pub name: String,
    /// Models it serves
    pub models: Vec<String>,
    /// Model used when a request names none
    pub default_model: String,
    /// Capabilities
    pub capabilities: ProviderCapabilities,
    /// Price point of the default model
    pub pricing: ModelPricing,
    /// Availability
    pub status: ProviderStatus,
}

/// Trait for text-generation providers
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Get the default model
    fn default_model(&self) -> &str;

    /// Describe models, capabilities and pricing
    fn info(&self) -> ProviderInfo;

    /// Current per-1K-token pricing of the default model
    fn pricing(&self) -> ModelPricing;

    /// Generate a complete response.
    ///
    /// Backend failures are mapped onto [`crate::Error`]; callers enforce
    /// `request.timeout`.
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse>;

    /// Start a streamed generation.
    ///
    /// The returned channel yields deltas and then exactly one terminal chunk
    /// (`done` or `error`), after which it closes. Cancelling `cancel` closes
    /// the channel.
    async fn stream(
        &self,
        request: &GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<StreamChunk>>;

    /// Best-effort liveness probe. Must return promptly.
    async fn is_healthy(&self) -> bool;
}
