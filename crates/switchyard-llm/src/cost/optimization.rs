//! Cost optimization advice
//!
//! These are heuristics, not guarantees. Savings figures assume flat rates
//! and say nothing about whether a cheaper provider gives comparable answers.

use crate::usage::TokenMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Heuristic Constants
// ============================================================================

/// Minimum relative spread between the priciest and cheapest provider's
/// average request cost before a switch is suggested
pub const PROVIDER_SPREAD_THRESHOLD: f64 = 0.20;

/// Query volume above which response caching is suggested
pub const CACHING_MIN_QUERIES: u64 = 100;

/// Assumed share of total cost a cache would save
pub const CACHING_SAVINGS_RATE: f64 = 0.15;

/// Average tokens per query below which batching is suggested
pub const BATCHING_MAX_AVG_TOKENS: f64 = 100.0;

/// Query volume above which batching is worth the effort
pub const BATCHING_MIN_QUERIES: u64 = 50;

/// Assumed share of total cost batching would save
pub const BATCHING_SAVINGS_RATE: f64 = 0.10;

/// What kind of change a suggestion proposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    /// Move traffic to a cheaper provider
    SwitchProvider,
    /// Cache repeated responses
    EnableCaching,
    /// Combine small requests
    BatchRequests,
}

/// Qualitative impact of a suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    /// Large share of spend
    High,
    /// Noticeable share of spend
    Medium,
    /// Marginal
    Low,
}

/// Qualitative effort to adopt a suggestion
pub type EffortLevel = ImpactLevel;

impl std::fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// One piece of advice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSuggestion {
    /// Kind of change
    pub kind: SuggestionKind,
    /// Human-readable advice
    pub description: String,
    /// Estimated savings in the tracked currency
    pub estimated_savings: f64,
    /// Qualitative impact
    pub impact: ImpactLevel,
    /// Qualitative effort
    pub effort: EffortLevel,
}

/// Advice derived from a metrics rollup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostOptimization {
    /// Spend the advice is based on
    pub current_cost: f64,
    /// Sum of every suggestion's estimate
    pub total_estimated_savings: f64,
    /// Suggestions, in evaluation order
    pub suggestions: Vec<OptimizationSuggestion>,
    /// When the advice was generated
    pub generated_at: DateTime<Utc>,
}

/// Propose savings for the usage summarized in `metrics`
#[must_use]
pub fn generate_optimization_suggestions(metrics: &TokenMetrics) -> CostOptimization {
    let mut suggestions = Vec::new();

    if let Some(suggestion) = provider_switch_suggestion(metrics) {
        suggestions.push(suggestion);
    }

    if metrics.total_queries > CACHING_MIN_QUERIES {
        let savings = metrics.total_cost * CACHING_SAVINGS_RATE;
        suggestions.push(OptimizationSuggestion {
            kind: SuggestionKind::EnableCaching,
            description: format!(
                "{} queries recorded; caching repeated prompts could save about {:.0}% (est. ${:.4})",
                metrics.total_queries,
                CACHING_SAVINGS_RATE * 100.0,
                savings
            ),
            estimated_savings: savings,
            impact: ImpactLevel::Medium,
            effort: ImpactLevel::Medium,
        });
    }

    if metrics.average_tokens_per_query < BATCHING_MAX_AVG_TOKENS
        && metrics.total_queries > BATCHING_MIN_QUERIES
    {
        let savings = metrics.total_cost * BATCHING_SAVINGS_RATE;
        suggestions.push(OptimizationSuggestion {
            kind: SuggestionKind::BatchRequests,
            description: format!(
                "Queries average {:.0} tokens; batching small requests could save about {:.0}% (est. ${:.4})",
                metrics.average_tokens_per_query,
                BATCHING_SAVINGS_RATE * 100.0,
                savings
            ),
            estimated_savings: savings,
            impact: ImpactLevel::Low,
            effort: ImpactLevel::Medium,
        });
    }

    CostOptimization {
        current_cost: metrics.total_cost,
        total_estimated_savings: suggestions.iter().map(|s| s.estimated_savings).sum(),
        suggestions,
        generated_at: Utc::now(),
    }
}

fn provider_switch_suggestion(metrics: &TokenMetrics) -> Option<OptimizationSuggestion> {
    // Sorted so ties resolve the same way on every call
    let mut averages: Vec<(&str, f64, u64)> = metrics
        .by_provider
        .iter()
        .filter(|(_, b)| b.requests > 0)
        .map(|(name, b)| (name.as_str(), b.cost / b.requests as f64, b.requests))
        .collect();
    if averages.len() < 2 {
        return None;
    }
    averages.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });

    let (low_name, low_avg, _) = averages[0];
    let (high_name, high_avg, high_requests) = averages[averages.len() - 1];
    if high_avg <= low_avg * (1.0 + PROVIDER_SPREAD_THRESHOLD) {
        return None;
    }

    let savings = (high_avg - low_avg) * high_requests as f64;
    Some(OptimizationSuggestion {
        kind: SuggestionKind::SwitchProvider,
        description: format!(
            "{high_name} averages ${high_avg:.4}/request vs ${low_avg:.4} on {low_name}; \
             routing its traffic to {low_name} could save est. ${savings:.4}"
        ),
        estimated_savings: savings,
        impact: ImpactLevel::High,
        effort: ImpactLevel::Low,
    })
}

/// Format advice as plain text
#[must_use]
pub fn format_optimization(optimization: &CostOptimization) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "Current cost: ${:.4}\n",
        optimization.current_cost
    ));
    if optimization.suggestions.is_empty() {
        output.push_str("No optimization suggestions.\n");
        return output;
    }

    output.push_str(&format!(
        "Potential savings: ${:.4} (heuristic estimate)\n",
        optimization.total_estimated_savings
    ));
    for suggestion in &optimization.suggestions {
        output.push_str(&format!(
            "- [impact {}, effort {}] {}\n",
            suggestion.impact, suggestion.effort, suggestion.description
        ));
    }

    output
}
