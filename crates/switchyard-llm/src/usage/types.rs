//! Usage ledger types

use crate::cost::Cost;
use crate::generation::TokenUsage;
use crate::util::running_mean;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Date key used for the global rollup
pub const TOTAL_METRICS_KEY: &str = "total";

/// Format a timestamp as a day-bucket key (`YYYY-MM-DD`, UTC)
#[must_use]
pub fn day_key(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d").to_string()
}

/// Request count, token and cost totals for one slice of usage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageBreakdown {
    /// Number of requests
    pub requests: u64,
    /// Prompt tokens
    pub input_tokens: u64,
    /// Completion tokens
    pub output_tokens: u64,
    /// Input + output
    pub total_tokens: u64,
    /// Accumulated cost
    pub cost: f64,
}

impl UsageBreakdown {
    /// Fold one call into the breakdown
    pub fn add(&mut self, usage: &TokenUsage, cost: f64) {
        self.requests += 1;
        self.input_tokens += usage.input_tokens;
        self.output_tokens += usage.output_tokens;
        self.total_tokens += usage.total_tokens;
        self.cost += cost;
    }

    /// Merge another breakdown into this one
    pub fn merge(&mut self, other: &UsageBreakdown) {
        self.requests += other.requests;
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
        self.cost += other.cost;
    }
}

/// Aggregate metrics for one calendar day (or the global rollup)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenMetrics {
    /// Day key (`YYYY-MM-DD`) or [`TOTAL_METRICS_KEY`]
    pub date: String,
    /// Queries recorded
    pub total_queries: u64,
    /// Prompt tokens
    pub total_input_tokens: u64,
    /// Completion tokens
    pub total_output_tokens: u64,
    /// Input + output
    pub total_tokens: u64,
    /// Accumulated cost
    pub total_cost: f64,
    /// `total_tokens / total_queries`
    pub average_tokens_per_query: f64,
    /// `total_cost / total_queries`
    pub average_cost_per_query: f64,
    /// Breakdown by provider name
    pub by_provider: HashMap<String, UsageBreakdown>,
    /// Breakdown by caller-supplied query type
    pub by_query_type: HashMap<String, UsageBreakdown>,
    /// Breakdown by caller-supplied agent name
    pub by_agent: HashMap<String, UsageBreakdown>,
}

impl TokenMetrics {
    /// Create empty metrics for a day key
    #[must_use]
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            ..Default::default()
        }
    }

    /// Fold one query record into the metrics
    pub fn record(&mut self, query: &QueryTokens) {
        let usage = &query.usage;
        self.total_queries += 1;
        self.total_input_tokens += usage.input_tokens;
        self.total_output_tokens += usage.output_tokens;
        self.total_tokens += usage.total_tokens;
        self.total_cost += query.cost;

        self.by_provider
            .entry(usage.provider.clone())
            .or_default()
            .add(usage, query.cost);
        if let Some(query_type) = &query.query_type {
            self.by_query_type
                .entry(query_type.clone())
                .or_default()
                .add(usage, query.cost);
        }
        if let Some(agent) = &query.agent {
            self.by_agent
                .entry(agent.clone())
                .or_default()
                .add(usage, query.cost);
        }

        self.recompute_averages();
    }

    fn recompute_averages(&mut self) {
        if self.total_queries == 0 {
            self.average_tokens_per_query = 0.0;
            self.average_cost_per_query = 0.0;
            return;
        }
        self.average_tokens_per_query = self.total_tokens as f64 / self.total_queries as f64;
        self.average_cost_per_query = self.total_cost / self.total_queries as f64;
    }
}

/// Per-provider usage inside one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderUsage {
    /// Provider name
    pub provider: String,
    /// Requests billed to this provider
    pub requests: u64,
    /// Prompt tokens
    pub input_tokens: u64,
    /// Completion tokens
    pub output_tokens: u64,
    /// Input + output
    pub total_tokens: u64,
    /// Accumulated cost
    pub cost: f64,
    /// Running mean of reported latencies
    pub average_latency_ms: f64,
    /// Number of latency samples behind the mean
    pub latency_samples: u64,
    /// Last time this provider was billed
    pub last_used: DateTime<Utc>,
}

impl ProviderUsage {
    fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            requests: 0,
            input_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
            cost: 0.0,
            average_latency_ms: 0.0,
            latency_samples: 0,
            last_used: Utc::now(),
        }
    }

    fn record(&mut self, query: &QueryTokens) {
        self.requests += 1;
        self.input_tokens += query.usage.input_tokens;
        self.output_tokens += query.usage.output_tokens;
        self.total_tokens += query.usage.total_tokens;
        self.cost += query.cost;
        self.last_used = query.timestamp;
        if let Some(latency) = query.latency_ms {
            self.latency_samples += 1;
            self.average_latency_ms =
                running_mean(self.average_latency_ms, latency as f64, self.latency_samples);
        }
    }
}

/// One recorded query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryTokens {
    /// Record identifier
    pub id: Uuid,
    /// Session the query was billed to
    pub session_id: String,
    /// Token usage
    pub usage: TokenUsage,
    /// Total cost of the query
    pub cost: f64,
    /// Caller-supplied query type
    pub query_type: Option<String>,
    /// Caller-supplied agent name
    pub agent: Option<String>,
    /// Provider latency, when known
    pub latency_ms: Option<u64>,
    /// When the usage happened (the usage timestamp)
    pub timestamp: DateTime<Utc>,
}

/// Cumulative ledger for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTokens {
    /// Session identifier
    pub session_id: String,
    /// Prompt tokens
    pub total_input_tokens: u64,
    /// Completion tokens
    pub total_output_tokens: u64,
    /// Input + output
    pub total_tokens: u64,
    /// Accumulated cost
    pub total_cost: f64,
    /// Queries recorded
    pub total_queries: u64,
    /// Usage by provider name
    pub by_provider: HashMap<String, ProviderUsage>,
    /// Query records, oldest first
    pub queries: Vec<QueryTokens>,
    /// When the session ledger was created
    pub created_at: DateTime<Utc>,
    /// When the session ledger last changed
    pub updated_at: DateTime<Utc>,
}

impl SessionTokens {
    /// Create an empty ledger
    #[must_use]
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            total_input_tokens: 0,
            total_output_tokens: 0,
            total_tokens: 0,
            total_cost: 0.0,
            total_queries: 0,
            by_provider: HashMap::new(),
            queries: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Fold one query into the ledger, keeping at most `max_records` records.
    ///
    /// Totals always cover every query; only the per-query list is capped.
    pub fn record(&mut self, query: QueryTokens, max_records: usize) {
        self.total_input_tokens += query.usage.input_tokens;
        self.total_output_tokens += query.usage.output_tokens;
        self.total_tokens += query.usage.total_tokens;
        self.total_cost += query.cost;
        self.total_queries += 1;
        self.updated_at = Utc::now();

        self.by_provider
            .entry(query.usage.provider.clone())
            .or_insert_with(|| ProviderUsage::new(query.usage.provider.clone()))
            .record(&query);

        self.queries.push(query);
        if self.queries.len() > max_records {
            let drain_count = self.queries.len() - max_records;
            self.queries.drain(0..drain_count);
        }
    }

    /// Cost of the recorded queries matching `keep`
    #[must_use]
    pub fn spend_where(&self, keep: impl Fn(&QueryTokens) -> bool) -> f64 {
        self.queries.iter().filter(|q| keep(q)).map(|q| q.cost).sum()
    }
}

/// One usage report with optional attribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    /// Token usage
    pub usage: TokenUsage,
    /// Derived cost, if pricing was known
    pub cost: Option<Cost>,
    /// Provider latency
    pub latency_ms: Option<u64>,
    /// Caller-supplied query type
    pub query_type: Option<String>,
    /// Caller-supplied agent name
    pub agent: Option<String>,
}

impl UsageEvent {
    /// Create an event from usage and cost
    #[must_use]
    pub fn new(usage: TokenUsage, cost: Option<Cost>) -> Self {
        Self {
            usage,
            cost,
            latency_ms: None,
            query_type: None,
            agent: None,
        }
    }

    /// Set the latency
    #[must_use]
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    /// Set the query type
    #[must_use]
    pub fn with_query_type(mut self, query_type: impl Into<String>) -> Self {
        self.query_type = Some(query_type.into());
        self
    }

    /// Set the agent
    #[must_use]
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }
}
