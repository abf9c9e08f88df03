//! Tests for usage module

use super::*;
use crate::cost::Cost;
use crate::error::Error;
use crate::generation::TokenUsage;
use chrono::{Duration, Utc};
use std::sync::Arc;

fn usage(provider: &str, input: u64, output: u64) -> TokenUsage {
    TokenUsage::new(provider, "test-model", input, output)
}

fn cost(provider: &str, total: f64) -> Option<Cost> {
    Some(Cost::new(provider, "test-model", total, 0.0))
}

#[tokio::test]
async fn test_track_usage_creates_session_and_day() {
    let tracker = TokenTracker::new();
    let query = tracker
        .track_usage("s1", usage("openai", 100, 50), cost("openai", 0.5))
        .await;

    assert_eq!(query.session_id, "s1");
    assert_eq!(query.cost, 0.5);

    let session = tracker.get_session_usage("s1").await.unwrap();
    assert_eq!(session.total_queries, 1);
    assert_eq!(session.total_input_tokens, 100);
    assert_eq!(session.total_output_tokens, 50);
    assert_eq!(session.total_tokens, 150);
    assert_eq!(session.queries.len(), 1);

    let provider = &session.by_provider["openai"];
    assert_eq!(provider.requests, 1);
    assert_eq!(provider.total_tokens, 150);

    let day = tracker
        .get_daily_metrics(&day_key(&query.timestamp))
        .await
        .unwrap();
    assert_eq!(day.total_queries, 1);
    assert_eq!(day.by_provider["openai"].requests, 1);
    assert_eq!(day.average_tokens_per_query, 150.0);
    assert_eq!(day.average_cost_per_query, 0.5);
}

#[tokio::test]
async fn test_track_without_cost_counts_tokens() {
    let tracker = TokenTracker::new();
    tracker.track_usage("s1", usage("local", 10, 10), None).await;

    let session = tracker.get_session_usage("s1").await.unwrap();
    assert_eq!(session.total_tokens, 20);
    assert_eq!(session.total_cost, 0.0);
}

#[tokio::test]
async fn test_day_bucket_follows_usage_timestamp() {
    let tracker = TokenTracker::new();
    let yesterday = Utc::now() - Duration::days(1);
    tracker
        .track_usage(
            "s1",
            usage("openai", 10, 0).with_timestamp(yesterday),
            cost("openai", 1.0),
        )
        .await;

    assert!(tracker.get_daily_metrics(&day_key(&yesterday)).await.is_some());
    assert!(tracker
        .get_daily_metrics(&day_key(&Utc::now()))
        .await
        .is_none());
}

#[tokio::test]
async fn test_concurrent_tracking_sums_exactly() {
    let tracker = Arc::new(TokenTracker::new());
    let n = 64;

    let handles: Vec<_> = (0..n)
        .map(|_| {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move {
                tracker
                    .track_usage("shared", usage("openai", 5, 5), cost("openai", 1.0))
                    .await;
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let session = tracker.get_session_usage("shared").await.unwrap();
    assert_eq!(session.total_queries, n);
    assert_eq!(session.total_cost, n as f64);
    assert_eq!(session.total_tokens, 10 * n);
}

#[tokio::test]
async fn test_provider_latency_is_running_mean() {
    let tracker = TokenTracker::new();
    for latency in [100, 300, 200] {
        tracker
            .track(
                "s1",
                UsageEvent::new(usage("openai", 1, 1), None).with_latency(latency),
            )
            .await;
    }
    // No latency: not a sample
    tracker
        .track("s1", UsageEvent::new(usage("openai", 1, 1), None))
        .await;

    let session = tracker.get_session_usage("s1").await.unwrap();
    let provider = &session.by_provider["openai"];
    assert_eq!(provider.requests, 4);
    assert_eq!(provider.latency_samples, 3);
    assert!((provider.average_latency_ms - 200.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_query_records_are_capped_but_totals_are_not() {
    let tracker = TokenTracker::new().with_max_query_records(2);
    for _ in 0..5 {
        tracker
            .track_usage("s1", usage("openai", 1, 0), cost("openai", 1.0))
            .await;
    }

    let session = tracker.get_session_usage("s1").await.unwrap();
    assert_eq!(session.queries.len(), 2);
    assert_eq!(session.total_queries, 5);
    assert_eq!(session.total_cost, 5.0);
}

#[tokio::test]
async fn test_total_usage_rolls_up_sessions() {
    let tracker = TokenTracker::new();
    tracker
        .track(
            "a",
            UsageEvent::new(usage("openai", 100, 0), cost("openai", 2.0))
                .with_query_type("search")
                .with_agent("planner"),
        )
        .await;
    tracker
        .track(
            "b",
            UsageEvent::new(usage("anthropic", 300, 0), cost("anthropic", 4.0))
                .with_query_type("search"),
        )
        .await;

    assert_eq!(tracker.session_ids().await, vec!["a", "b"]);

    let total = tracker.get_total_usage().await;
    assert_eq!(total.date, TOTAL_METRICS_KEY);
    assert_eq!(total.total_queries, 2);
    assert_eq!(total.total_tokens, 400);
    assert_eq!(total.total_cost, 6.0);
    assert_eq!(total.average_tokens_per_query, 200.0);
    assert_eq!(total.average_cost_per_query, 3.0);
    assert_eq!(total.by_provider.len(), 2);
    assert_eq!(total.by_query_type["search"].requests, 2);
    assert_eq!(total.by_agent["planner"].requests, 1);
}

#[tokio::test]
async fn test_total_usage_empty() {
    let total = TokenTracker::new().get_total_usage().await;
    assert_eq!(total.total_queries, 0);
    assert_eq!(total.average_cost_per_query, 0.0);
}

#[tokio::test]
async fn test_optimization_suggestions_over_rollup() {
    let tracker = TokenTracker::new();
    for _ in 0..5 {
        tracker
            .track_usage("s1", usage("pricey", 500, 0), cost("pricey", 1.0))
            .await;
        tracker
            .track_usage("s1", usage("cheap", 500, 0), cost("cheap", 0.1))
            .await;
    }

    let optimization = tracker.optimization_suggestions().await;
    assert_eq!(optimization.suggestions.len(), 1);
    assert!((optimization.suggestions[0].estimated_savings - 4.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_check_budget_without_budget_is_none() {
    let tracker = TokenTracker::new();
    tracker
        .track_usage("s1", usage("openai", 1, 1), cost("openai", 100.0))
        .await;
    assert!(tracker.check_budget("s1").await.is_none());
}

#[tokio::test]
async fn test_check_budget_approaching() {
    let tracker = TokenTracker::new();
    tracker
        .track_usage("s1", usage("openai", 1, 1), cost("openai", 7.6))
        .await;
    tracker
        .set_budget("s1", TokenBudget::new().with_daily_limit(10.0))
        .await;

    let status = tracker.check_budget("s1").await.unwrap();
    assert_eq!(status.warnings.len(), 1);
    assert_eq!(status.warnings[0].period, BudgetPeriod::Daily);
    assert_eq!(status.warnings[0].level, WarningLevel::Approaching);
    assert!(!status.is_exceeded());
}

#[tokio::test]
async fn test_check_budget_exceeded_after_tracking() {
    let tracker = TokenTracker::new();
    tracker
        .set_budget("s1", TokenBudget::new().with_daily_limit(10.0))
        .await;
    tracker
        .track_usage("s1", usage("openai", 1, 1), cost("openai", 10.0))
        .await;

    let status = tracker.check_budget("s1").await.unwrap();
    assert_eq!(status.warnings.len(), 1);
    assert_eq!(status.warnings[0].level, WarningLevel::Exceeded);
    assert!(status.is_exceeded());
    assert_eq!(status.budget.current_daily_spend, 10.0);
}

#[tokio::test]
async fn test_daily_and_monthly_fire_independently() {
    let tracker = TokenTracker::new();
    tracker
        .set_budget(
            "s1",
            TokenBudget::new()
                .with_daily_limit(10.0)
                .with_monthly_limit(10.0),
        )
        .await;
    tracker
        .track_usage("s1", usage("openai", 1, 1), cost("openai", 9.5))
        .await;

    let status = tracker.check_budget("s1").await.unwrap();
    let periods: Vec<_> = status.warnings.iter().map(|w| w.period).collect();
    assert_eq!(periods, vec![BudgetPeriod::Daily, BudgetPeriod::Monthly]);
    assert!(status
        .warnings
        .iter()
        .all(|w| w.level == WarningLevel::Critical));
}

#[tokio::test]
async fn test_warning_history_is_deduplicated() {
    let tracker = TokenTracker::new();
    tracker
        .set_budget("s1", TokenBudget::new().with_daily_limit(10.0))
        .await;
    tracker
        .track_usage("s1", usage("openai", 1, 1), cost("openai", 8.0))
        .await;

    tracker.check_budget("s1").await.unwrap();
    let status = tracker.check_budget("s1").await.unwrap();
    assert_eq!(status.warnings.len(), 1);
    assert_eq!(status.budget.warnings.len(), 1);

    tracker
        .track_usage("s1", usage("openai", 1, 1), cost("openai", 1.5))
        .await;
    let status = tracker.check_budget("s1").await.unwrap();
    assert_eq!(status.warnings[0].level, WarningLevel::Critical);
    assert_eq!(status.budget.warnings.len(), 2);
}

#[tokio::test]
async fn test_set_budget_ignores_older_days() {
    let tracker = TokenTracker::new();
    let last_year = Utc::now() - Duration::days(400);
    tracker
        .track_usage(
            "s1",
            usage("openai", 1, 1).with_timestamp(last_year),
            cost("openai", 50.0),
        )
        .await;
    tracker
        .set_budget(
            "s1",
            TokenBudget::new()
                .with_daily_limit(10.0)
                .with_monthly_limit(10.0),
        )
        .await;

    let status = tracker.check_budget("s1").await.unwrap();
    assert!(status.warnings.is_empty());
    assert_eq!(status.budget.current_daily_spend, 0.0);
    assert_eq!(status.budget.current_monthly_spend, 0.0);
}

#[tokio::test]
async fn test_budget_gate_blocks_exceeded_session() {
    let tracker = TokenTracker::new();
    tracker
        .set_budget("s1", TokenBudget::new().with_monthly_limit(1.0))
        .await;

    tokio_test::assert_ok!(tracker.check("s1").await);
    tokio_test::assert_ok!(tracker.check("unbudgeted").await);

    tracker
        .track_usage("s1", usage("openai", 1, 1), cost("openai", 1.0))
        .await;
    let err = tracker.check("s1").await.unwrap_err();
    assert!(matches!(
        err,
        Error::BudgetExceeded { ref session_id, ref period } if session_id == "s1" && period == "monthly"
    ));
}

#[tokio::test]
async fn test_clear_budget() {
    let tracker = TokenTracker::new();
    tracker
        .set_budget("s1", TokenBudget::new().with_daily_limit(1.0))
        .await;
    assert!(tracker.clear_budget("s1").await.is_some());
    assert!(tracker.check_budget("s1").await.is_none());
}

#[test]
fn test_warning_ladder_reports_highest_class() {
    assert_eq!(WarningLevel::for_spend(7.4, 10.0), None);
    assert_eq!(
        WarningLevel::for_spend(7.5, 10.0),
        Some(WarningLevel::Approaching)
    );
    assert_eq!(
        WarningLevel::for_spend(7.6, 10.0),
        Some(WarningLevel::Approaching)
    );
    assert_eq!(
        WarningLevel::for_spend(9.5, 10.0),
        Some(WarningLevel::Critical)
    );
    assert_eq!(
        WarningLevel::for_spend(10.0, 10.0),
        Some(WarningLevel::Exceeded)
    );
    assert_eq!(
        WarningLevel::for_spend(25.0, 10.0),
        Some(WarningLevel::Exceeded)
    );
    // Non-positive limits are unlimited
    assert_eq!(WarningLevel::for_spend(5.0, 0.0), None);
}

#[test]
fn test_budget_roll_over_clears_daily_period() {
    let yesterday = Utc::now() - Duration::days(1);
    let mut budget = TokenBudget::new().with_daily_limit(10.0);
    budget.last_daily_reset = yesterday;
    budget.current_daily_spend = 9.0;
    budget.warnings = budget.evaluate(yesterday);
    assert_eq!(budget.warnings.len(), 1);

    assert!(budget.roll_over(Utc::now()));
    assert_eq!(budget.current_daily_spend, 0.0);
    assert!(budget.warnings.is_empty());
    assert!(!budget.roll_over(Utc::now()));
}

#[test]
fn test_add_spend_skips_past_periods() {
    let now = Utc::now();
    let mut budget = TokenBudget::new();
    budget.add_spend(1.0, now - Duration::days(400), now);
    budget.add_spend(2.0, now, now);
    assert_eq!(budget.current_daily_spend, 2.0);
    assert_eq!(budget.current_monthly_spend, 2.0);
}

#[tokio::test]
async fn test_mock_budget_gate() {
    let mut gate = MockBudgetGate::new();
    gate.expect_check()
        .withf(|session_id| session_id == "blocked")
        .times(1)
        .returning(|session_id| {
            Err(Error::BudgetExceeded {
                session_id: session_id.to_string(),
                period: "daily".to_string(),
            })
        });

    tokio_test::assert_err!(gate.check("blocked").await);
}
