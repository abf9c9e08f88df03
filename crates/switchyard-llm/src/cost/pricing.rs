//! Model Pricing - per-1K-token price points
//!
//! Prices are keyed by `"<provider>:<model>"` and looked up by exact match.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Currency used by the built-in price points
pub const DEFAULT_CURRENCY: &str = "USD";

// ============================================================================
// Model Pricing Constants (per 1K tokens, USD)
// ============================================================================

// OpenAI
/// GPT-4o input cost per 1K tokens
pub const GPT4O_INPUT_COST: f64 = 0.0025;
/// GPT-4o output cost per 1K tokens
pub const GPT4O_OUTPUT_COST: f64 = 0.01;
/// GPT-4o-mini input cost per 1K tokens
pub const GPT4O_MINI_INPUT_COST: f64 = 0.000_15;
/// GPT-4o-mini output cost per 1K tokens
pub const GPT4O_MINI_OUTPUT_COST: f64 = 0.000_6;
/// GPT-4 Turbo input cost per 1K tokens
pub const GPT4_TURBO_INPUT_COST: f64 = 0.01;
/// GPT-4 Turbo output cost per 1K tokens
pub const GPT4_TURBO_OUTPUT_COST: f64 = 0.03;

// Anthropic
/// Claude Sonnet input cost per 1K tokens
pub const CLAUDE_SONNET_INPUT_COST: f64 = 0.003;
/// Claude Sonnet output cost per 1K tokens
pub const CLAUDE_SONNET_OUTPUT_COST: f64 = 0.015;
/// Claude Haiku input cost per 1K tokens
pub const CLAUDE_HAIKU_INPUT_COST: f64 = 0.000_8;
/// Claude Haiku output cost per 1K tokens
pub const CLAUDE_HAIKU_OUTPUT_COST: f64 = 0.004;
/// Claude Opus input cost per 1K tokens
pub const CLAUDE_OPUS_INPUT_COST: f64 = 0.015;
/// Claude Opus output cost per 1K tokens
pub const CLAUDE_OPUS_OUTPUT_COST: f64 = 0.075;

// Google
/// Gemini Flash input cost per 1K tokens
pub const GEMINI_FLASH_INPUT_COST: f64 = 0.000_075;
/// Gemini Flash output cost per 1K tokens
pub const GEMINI_FLASH_OUTPUT_COST: f64 = 0.000_3;
/// Gemini Pro input cost per 1K tokens
pub const GEMINI_PRO_INPUT_COST: f64 = 0.001_25;
/// Gemini Pro output cost per 1K tokens
pub const GEMINI_PRO_OUTPUT_COST: f64 = 0.005;

// DeepSeek
/// DeepSeek Chat input cost per 1K tokens
pub const DEEPSEEK_CHAT_INPUT_COST: f64 = 0.000_14;
/// DeepSeek Chat output cost per 1K tokens
pub const DEEPSEEK_CHAT_OUTPUT_COST: f64 = 0.000_28;

/// Pricing for one provider/model pair (per 1K tokens)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Provider name
    pub provider: String,
    /// Model name
    pub model: String,
    /// Cost per 1K input tokens
    pub input_cost_per_1k: f64,
    /// Cost per 1K output tokens
    pub output_cost_per_1k: f64,
    /// ISO currency code
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Context window size
    #[serde(default)]
    pub context_window: u32,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

impl ModelPricing {
    /// Create a USD price point
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        input_cost_per_1k: f64,
        output_cost_per_1k: f64,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            input_cost_per_1k,
            output_cost_per_1k,
            currency: default_currency(),
            context_window: 0,
        }
    }

    /// Set the context window
    #[must_use]
    pub fn with_context_window(mut self, tokens: u32) -> Self {
        self.context_window = tokens;
        self
    }

    /// Table key for this price point
    #[must_use]
    pub fn key(&self) -> String {
        pricing_key(&self.provider, &self.model)
    }
}

/// Build the `"<provider>:<model>"` lookup key
#[must_use]
pub fn pricing_key(provider: &str, model: &str) -> String {
    format!("{provider}:{model}")
}

/// Exact-match pricing table keyed by `provider:model`
#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    entries: HashMap<String, ModelPricing>,
}

impl PricingTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table seeded with [`default_pricing`]
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        for pricing in default_pricing() {
            table.insert(pricing);
        }
        table
    }

    /// Insert or replace a price point
    pub fn insert(&mut self, pricing: ModelPricing) {
        self.entries.insert(pricing.key(), pricing);
    }

    /// Look up a price point by exact provider and model
    #[must_use]
    pub fn get(&self, provider: &str, model: &str) -> Option<&ModelPricing> {
        self.entries.get(&pricing_key(provider, model))
    }

    /// Whether a price point exists
    #[must_use]
    pub fn contains(&self, provider: &str, model: &str) -> bool {
        self.get(provider, model).is_some()
    }

    /// Number of price points
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate price points in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &ModelPricing> {
        self.entries.values()
    }

    /// All price points, sorted by key
    #[must_use]
    pub fn entries(&self) -> Vec<&ModelPricing> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by_key(|p| p.key());
        entries
    }

    /// Price points for one provider, sorted by model
    #[must_use]
    pub fn for_provider(&self, provider: &str) -> Vec<&ModelPricing> {
        let mut entries: Vec<_> = self
            .entries
            .values()
            .filter(|p| p.provider == provider)
            .collect();
        entries.sort_by(|a, b| a.model.cmp(&b.model));
        entries
    }
}

impl FromIterator<ModelPricing> for PricingTable {
    fn from_iter<I: IntoIterator<Item = ModelPricing>>(iter: I) -> Self {
        let mut table = Self::new();
        for pricing in iter {
            table.insert(pricing);
        }
        table
    }
}

/// Built-in price points for common models
#[must_use]
pub fn default_pricing() -> Vec<ModelPricing> {
    vec![
        // OpenAI
        ModelPricing::new("openai", "gpt-4o", GPT4O_INPUT_COST, GPT4O_OUTPUT_COST)
            .with_context_window(128_000),
        ModelPricing::new(
            "openai",
            "gpt-4o-mini",
            GPT4O_MINI_INPUT_COST,
            GPT4O_MINI_OUTPUT_COST,
        )
        .with_context_window(128_000),
        ModelPricing::new(
            "openai",
            "gpt-4-turbo",
            GPT4_TURBO_INPUT_COST,
            GPT4_TURBO_OUTPUT_COST,
        )
        .with_context_window(128_000),
        // Anthropic
        ModelPricing::new(
            "anthropic",
            "claude-3-5-sonnet",
            CLAUDE_SONNET_INPUT_COST,
            CLAUDE_SONNET_OUTPUT_COST,
        )
        .with_context_window(200_000),
        ModelPricing::new(
            "anthropic",
            "claude-3-5-haiku",
            CLAUDE_HAIKU_INPUT_COST,
            CLAUDE_HAIKU_OUTPUT_COST,
        )
        .with_context_window(200_000),
        ModelPricing::new(
            "anthropic",
            "claude-3-opus",
            CLAUDE_OPUS_INPUT_COST,
            CLAUDE_OPUS_OUTPUT_COST,
        )
        .with_context_window(200_000),
        // Google
        ModelPricing::new(
            "gemini",
            "gemini-1.5-flash",
            GEMINI_FLASH_INPUT_COST,
            GEMINI_FLASH_OUTPUT_COST,
        )
        .with_context_window(1_000_000),
        ModelPricing::new(
            "gemini",
            "gemini-1.5-pro",
            GEMINI_PRO_INPUT_COST,
            GEMINI_PRO_OUTPUT_COST,
        )
        .with_context_window(2_000_000),
        // DeepSeek
        ModelPricing::new(
            "deepseek",
            "deepseek-chat",
            DEEPSEEK_CHAT_INPUT_COST,
            DEEPSEEK_CHAT_OUTPUT_COST,
        )
        .with_context_window(64_000),
        // Local models are free
        ModelPricing::new("ollama", "llama3.1", 0.0, 0.0).with_context_window(128_000),
    ]
}
