//! Generation request and response types
//!
//! This module defines the single request/response contract every provider
//! speaks, plus the streaming chunk type and its sender.

use crate::cost::Cost;
use crate::message::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

/// Default finish reason for a completed generation
pub const FINISH_STOP: &str = "stop";

/// Token usage for one generation call.
///
/// `total_tokens` is always `input_tokens + output_tokens`; cached and
/// reasoning counts are informational overlays and are not summed into it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub input_tokens: u64,
    /// Completion tokens
    pub output_tokens: u64,
    /// Input + output
    pub total_tokens: u64,
    /// Prompt tokens served from a provider-side cache
    #[serde(default)]
    pub cached_tokens: u64,
    /// Hidden reasoning tokens reported by the provider
    #[serde(default)]
    pub reasoning_tokens: u64,
    /// Provider that consumed the tokens
    pub provider: String,
    /// Model that consumed the tokens
    pub model: String,
    /// When the usage was recorded
    pub timestamp: DateTime<Utc>,
}

impl TokenUsage {
    /// Create usage for a provider/model pair, stamped now
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
            cached_tokens: 0,
            reasoning_tokens: 0,
            provider: provider.into(),
            model: model.into(),
            timestamp: Utc::now(),
        }
    }

    /// Set cached prompt tokens
    #[must_use]
    pub fn with_cached_tokens(mut self, cached: u64) -> Self {
        self.cached_tokens = cached;
        self
    }

    /// Set reasoning tokens
    #[must_use]
    pub fn with_reasoning_tokens(mut self, reasoning: u64) -> Self {
        self.reasoning_tokens = reasoning;
        self
    }

    /// Override the timestamp
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Recompute `total_tokens` as `input_tokens + output_tokens`
    pub fn normalize_total(&mut self) {
        self.total_tokens = self.input_tokens.saturating_add(self.output_tokens);
    }
}

/// Generation request.
///
/// Providers receive it by shared reference, so it cannot change once issued.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Messages in the conversation
    pub messages: Vec<Message>,
    /// Optional system prompt, kept apart from the message list
    pub system_prompt: Option<String>,
    /// Model to use; `None` lets the manager/provider pick its default
    pub model: Option<String>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature (0.0 - 2.0)
    pub temperature: Option<f32>,
    /// Nucleus sampling
    pub top_p: Option<f32>,
    /// Frequency penalty
    pub frequency_penalty: Option<f32>,
    /// Presence penalty
    pub presence_penalty: Option<f32>,
    /// Stop sequences
    #[serde(default)]
    pub stop: Vec<String>,
    /// Per-request timeout; the manager default applies when unset
    pub timeout: Option<Duration>,
    /// Session the request is billed to
    pub session_id: Option<String>,
    /// Free-form caller metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl GenerationRequest {
    /// Create an empty request
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a request with a single user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new().with_message(Message::user(content))
    }

    /// Add a message
    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Add messages
    #[must_use]
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages.extend(messages);
        self
    }

    /// Set the system prompt
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set top-p
    #[must_use]
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Set frequency and presence penalties
    #[must_use]
    pub fn with_penalties(mut self, frequency: f32, presence: f32) -> Self {
        self.frequency_penalty = Some(frequency);
        self.presence_penalty = Some(presence);
        self
    }

    /// Add a stop sequence
    #[must_use]
    pub fn with_stop(mut self, stop: impl Into<String>) -> Self {
        self.stop.push(stop.into());
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Bill the request to a session
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Attach a metadata entry
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Text of the last user message, if any
    #[must_use]
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == crate::message::MessageRole::User)
            .map(|m| m.content.as_str())
    }
}

/// Generation response, produced once per successful provider call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Generated content
    pub content: String,
    /// Finish reason as reported by the backend
    pub finish_reason: String,
    /// Token usage
    pub usage: TokenUsage,
    /// Monetary cost, when pricing for the model is known
    pub cost: Option<Cost>,
    /// Provider that produced the response
    pub provider: String,
    /// Model that produced the response
    pub model: String,
    /// Wall-clock latency of the provider call
    pub latency_ms: u64,
    /// When the response was received
    pub timestamp: DateTime<Utc>,
    /// Opaque provider metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl GenerationResponse {
    /// Create a response; the manager stamps latency, timestamp and cost
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        content: impl Into<String>,
        usage: TokenUsage,
    ) -> Self {
        Self {
            content: content.into(),
            finish_reason: FINISH_STOP.to_string(),
            usage,
            cost: None,
            provider: provider.into(),
            model: model.into(),
            latency_ms: 0,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Set the finish reason
    #[must_use]
    pub fn with_finish_reason(mut self, reason: impl Into<String>) -> Self {
        self.finish_reason = reason.into();
        self
    }
}

// ============================================================================
// Streaming
// ============================================================================

/// One incremental piece of a streamed generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Content delta
    pub content: String,
    /// Terminal success marker
    pub done: bool,
    /// Finish reason (terminal chunks only)
    pub finish_reason: Option<String>,
    /// Final usage (terminal chunks only)
    pub usage: Option<TokenUsage>,
    /// Error message (terminal error chunks only)
    pub error: Option<String>,
}

impl StreamChunk {
    /// A content delta
    #[must_use]
    pub fn delta(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            done: false,
            finish_reason: None,
            usage: None,
            error: None,
        }
    }

    /// Whether no further chunks follow this one
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.done || self.error.is_some()
    }
}

/// Producer half of a chunk stream.
///
/// The terminal methods consume the sender, so nothing can be sent after a
/// `done` or error chunk, and the channel closes when the producer drops it.
#[derive(Debug)]
pub struct ChunkSender {
    tx: mpsc::Sender<StreamChunk>,
}

/// Create a bounded chunk channel
#[must_use]
pub fn chunk_channel(buffer: usize) -> (ChunkSender, mpsc::Receiver<StreamChunk>) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (ChunkSender { tx }, rx)
}

impl ChunkSender {
    /// Send a content delta. Returns `false` if the receiver is gone.
    pub async fn send(&self, content: impl Into<String>) -> bool {
        self.tx.send(StreamChunk::delta(content)).await.is_ok()
    }

    /// Send the terminal success chunk and close the stream
    pub async fn finish(self, finish_reason: impl Into<String>, usage: Option<TokenUsage>) {
        let chunk = StreamChunk {
            content: String::new(),
            done: true,
            finish_reason: Some(finish_reason.into()),
            usage,
            error: None,
        };
        let _ = self.tx.send(chunk).await;
    }

    /// Send the terminal error chunk and close the stream
    pub async fn fail(self, error: impl std::fmt::Display) {
        let chunk = StreamChunk {
            content: String::new(),
            done: false,
            finish_reason: None,
            usage: None,
            error: Some(error.to_string()),
        };
        let _ = self.tx.send(chunk).await;
    }

    /// Whether the receiver has been dropped
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
