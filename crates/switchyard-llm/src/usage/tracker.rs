//! Token Tracker - per-session and per-day usage ledger
//!
//! All state sits behind one `RwLock` owned by the tracker. Each update is
//! atomic, and totals are plain sums, so concurrent reports for the same
//! session end in the same state whatever order they land in.

use super::budget::{BudgetGate, BudgetPeriod, BudgetStatus, TokenBudget};
use super::types::{
    day_key, QueryTokens, SessionTokens, TokenMetrics, UsageBreakdown, UsageEvent,
    TOTAL_METRICS_KEY,
};
use crate::cost::{generate_optimization_suggestions, Cost, CostOptimization};
use crate::error::{Error, Result};
use crate::generation::TokenUsage;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Maximum query records kept per session by default
const DEFAULT_MAX_QUERY_RECORDS: usize = 10_000;

#[derive(Debug, Default)]
struct TrackerState {
    sessions: HashMap<String, SessionTokens>,
    daily: HashMap<String, TokenMetrics>,
    budgets: HashMap<String, TokenBudget>,
}

/// Usage ledger across sessions and days
#[derive(Debug)]
pub struct TokenTracker {
    state: RwLock<TrackerState>,
    max_query_records: usize,
}

impl Default for TokenTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenTracker {
    /// Create an empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(TrackerState::default()),
            max_query_records: DEFAULT_MAX_QUERY_RECORDS,
        }
    }

    /// Cap the per-session query record list. Totals are unaffected.
    #[must_use]
    pub fn with_max_query_records(mut self, max: usize) -> Self {
        self.max_query_records = max.max(1);
        self
    }

    /// Record one call's usage against a session
    pub async fn track_usage(
        &self,
        session_id: &str,
        usage: TokenUsage,
        cost: Option<Cost>,
    ) -> QueryTokens {
        self.track(session_id, UsageEvent::new(usage, cost)).await
    }

    /// Record a usage event against a session
    #[instrument(skip(self, event), fields(session = %session_id))]
    pub async fn track(&self, session_id: &str, event: UsageEvent) -> QueryTokens {
        let cost = event.cost.as_ref().map_or(0.0, |c| c.total_cost);
        let timestamp = event.usage.timestamp;
        let query = QueryTokens {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            usage: event.usage,
            cost,
            query_type: event.query_type,
            agent: event.agent,
            latency_ms: event.latency_ms,
            timestamp,
        };

        let mut state = self.state.write().await;

        let day = day_key(&timestamp);
        state
            .daily
            .entry(day.clone())
            .or_insert_with(|| TokenMetrics::new(day))
            .record(&query);

        if let Some(budget) = state.budgets.get_mut(session_id) {
            budget.add_spend(cost, timestamp, Utc::now());
        }

        state
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionTokens::new(session_id))
            .record(query.clone(), self.max_query_records);

        debug!(
            provider = %query.usage.provider,
            model = %query.usage.model,
            tokens = query.usage.total_tokens,
            cost,
            "Usage tracked"
        );

        query
    }

    /// Attach a budget to a session.
    ///
    /// Current spend is seeded from the session's query records dated today
    /// and this month (UTC), replacing whatever the budget carried.
    #[instrument(skip(self, budget), fields(session = %session_id))]
    pub async fn set_budget(&self, session_id: &str, mut budget: TokenBudget) {
        let now = Utc::now();
        let mut state = self.state.write().await;

        let today = BudgetPeriod::Daily.key(&now);
        let month = BudgetPeriod::Monthly.key(&now);
        let (daily, monthly) = state.sessions.get(session_id).map_or((0.0, 0.0), |s| {
            (
                s.spend_where(|q| BudgetPeriod::Daily.key(&q.timestamp) == today),
                s.spend_where(|q| BudgetPeriod::Monthly.key(&q.timestamp) == month),
            )
        });

        budget.current_daily_spend = daily;
        budget.current_monthly_spend = monthly;
        budget.last_daily_reset = now;
        budget.last_monthly_reset = now;
        budget.warnings.clear();

        debug!(daily, monthly, "Budget attached");
        state.budgets.insert(session_id.to_string(), budget);
    }

    /// Remove a session's budget, returning it
    pub async fn clear_budget(&self, session_id: &str) -> Option<TokenBudget> {
        self.state.write().await.budgets.remove(session_id)
    }

    /// Evaluate a session's budget. `None` if no budget is attached.
    ///
    /// Purely observational: nothing is blocked. Newly reached
    /// (period, level) pairs are appended to the budget's warning history.
    #[instrument(skip(self), fields(session = %session_id))]
    pub async fn check_budget(&self, session_id: &str) -> Option<BudgetStatus> {
        let now = Utc::now();
        let mut state = self.state.write().await;
        let budget = state.budgets.get_mut(session_id)?;

        budget.roll_over(now);
        let warnings = budget.evaluate(now);
        for warning in &warnings {
            if budget.remember(warning) {
                warn!(
                    period = %warning.period,
                    level = %warning.level,
                    spend = warning.spend,
                    limit = warning.limit,
                    "Budget threshold reached"
                );
            }
        }

        Some(BudgetStatus {
            budget: budget.clone(),
            warnings,
        })
    }

    /// Snapshot of one session's ledger
    pub async fn get_session_usage(&self, session_id: &str) -> Option<SessionTokens> {
        self.state.read().await.sessions.get(session_id).cloned()
    }

    /// Known session ids, sorted
    pub async fn session_ids(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut ids: Vec<_> = state.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Metrics for one day key (`YYYY-MM-DD`)
    pub async fn get_daily_metrics(&self, date: &str) -> Option<TokenMetrics> {
        self.state.read().await.daily.get(date).cloned()
    }

    /// Global rollup across every session.
    ///
    /// Scans all sessions, so cost grows with the number of sessions.
    pub async fn get_total_usage(&self) -> TokenMetrics {
        let state = self.state.read().await;
        let mut total = TokenMetrics::new(TOTAL_METRICS_KEY);

        for session in state.sessions.values() {
            total.total_queries += session.total_queries;
            total.total_input_tokens += session.total_input_tokens;
            total.total_output_tokens += session.total_output_tokens;
            total.total_tokens += session.total_tokens;
            total.total_cost += session.total_cost;

            for (provider, usage) in &session.by_provider {
                total
                    .by_provider
                    .entry(provider.clone())
                    .or_default()
                    .merge(&UsageBreakdown {
                        requests: usage.requests,
                        input_tokens: usage.input_tokens,
                        output_tokens: usage.output_tokens,
                        total_tokens: usage.total_tokens,
                        cost: usage.cost,
                    });
            }
        }

        // Attribution is only kept per day
        for day in state.daily.values() {
            for (query_type, breakdown) in &day.by_query_type {
                total
                    .by_query_type
                    .entry(query_type.clone())
                    .or_default()
                    .merge(breakdown);
            }
            for (agent, breakdown) in &day.by_agent {
                total.by_agent.entry(agent.clone()).or_default().merge(breakdown);
            }
        }

        if total.total_queries > 0 {
            total.average_tokens_per_query = total.total_tokens as f64 / total.total_queries as f64;
            total.average_cost_per_query = total.total_cost / total.total_queries as f64;
        }
        total
    }

    /// Savings advice over the global rollup
    pub async fn optimization_suggestions(&self) -> CostOptimization {
        generate_optimization_suggestions(&self.get_total_usage().await)
    }
}

#[async_trait]
impl BudgetGate for TokenTracker {
    async fn check(&self, session_id: &str) -> Result<()> {
        let state = self.state.read().await;
        let Some(budget) = state.budgets.get(session_id) else {
            return Ok(());
        };

        let mut current = budget.clone();
        current.roll_over(Utc::now());
        match current.exceeded_period() {
            Some(period) => Err(Error::BudgetExceeded {
                session_id: session_id.to_string(),
                period: period.to_string(),
            }),
            None => Ok(()),
        }
    }
}
