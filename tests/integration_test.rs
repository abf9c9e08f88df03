//! Integration tests for Switchyard
//!
//! These tests verify the integration between the crates:
//! - switchyard-core: circuit breaker state as seen through the manager
//! - switchyard-llm: routing, pricing, usage ledger and budgets working together

use std::sync::Arc;
use std::time::Duration;

use switchyard_core::CircuitState;
use switchyard_llm::{
    BudgetGate, CostCalculator, Error, GenerationRequest, Manager, ManagerConfig, ModelPricing,
    PricingSource, PricingTable, StubProvider, TokenBudget, TokenTracker, UsageEvent,
};
use tokio_util::sync::CancellationToken;

fn gateway_config() -> ManagerConfig {
    ManagerConfig::new("openai")
        .with_fallbacks(["anthropic", "gemini"])
        .with_default_model("openai", "gpt-4o-mini")
        .with_default_model("anthropic", "claude-3-5-haiku")
        .with_default_model("gemini", "gemini-1.5-flash")
}

async fn register_stubs(manager: &Manager, stubs: &[(&str, Arc<StubProvider>)]) {
    for (name, stub) in stubs {
        manager.register(*name, stub.clone()).await;
    }
}

// ============================================================================
// Routing + Accounting
// ============================================================================

#[tokio::test]
async fn test_fallback_responses_feed_the_usage_ledger() {
    let openai = Arc::new(StubProvider::new("openai").failing("upstream 503"));
    let anthropic = Arc::new(StubProvider::new("anthropic"));
    let manager = Manager::new(gateway_config())
        .with_cost_calculator(CostCalculator::new(PricingTable::with_defaults()));
    register_stubs(
        &manager,
        &[("openai", openai.clone()), ("anthropic", anthropic.clone())],
    )
    .await;

    let tracker = TokenTracker::new();
    let mut billed = 0.0;
    for i in 0..3 {
        let request = GenerationRequest::user(format!("question {i}")).with_session("s1");
        let response = manager.generate(&request).await.unwrap();

        assert_eq!(response.provider, "anthropic");
        assert_eq!(response.model, "claude-3-5-haiku");
        assert_eq!(response.usage.provider, "anthropic");
        let cost = response.cost.clone().unwrap();
        assert_eq!(cost.pricing_source, PricingSource::Table);
        billed += cost.total_cost;

        let event = UsageEvent::new(response.usage.clone(), response.cost.clone())
            .with_latency(response.latency_ms);
        tracker.track("s1", event).await;
    }

    assert_eq!(openai.calls(), 3);
    assert_eq!(anthropic.calls(), 3);

    let openai_stats = manager.stats("openai").await.unwrap();
    assert_eq!(openai_stats.failed_requests, 3);
    assert_eq!(openai_stats.error_rate, 1.0);
    assert!(openai_stats.last_error.unwrap().contains("upstream 503"));

    let anthropic_stats = manager.stats("anthropic").await.unwrap();
    assert_eq!(anthropic_stats.successful_requests, 3);
    assert!((anthropic_stats.total_cost - billed).abs() < 1e-12);

    let session = tracker.get_session_usage("s1").await.unwrap();
    assert_eq!(session.total_queries, 3);
    assert!((session.total_cost - billed).abs() < 1e-12);
    assert_eq!(session.by_provider["anthropic"].requests, 3);
    assert!(!session.by_provider.contains_key("openai"));

    let totals = tracker.get_total_usage().await;
    assert_eq!(totals.total_queries, 3);
    assert_eq!(totals.total_tokens, anthropic_stats.total_tokens);
}

#[tokio::test]
async fn test_repeated_failures_open_the_breaker_and_stop_calls() {
    let config = gateway_config().with_circuit_breaker(2, Duration::from_secs(60));
    let openai = Arc::new(StubProvider::new("openai").failing("boom"));
    let anthropic = Arc::new(StubProvider::new("anthropic"));
    let manager = Manager::new(config);
    register_stubs(
        &manager,
        &[("openai", openai.clone()), ("anthropic", anthropic.clone())],
    )
    .await;

    for _ in 0..5 {
        let response = manager
            .generate(&GenerationRequest::user("hello"))
            .await
            .unwrap();
        assert_eq!(response.provider, "anthropic");
    }

    // Two failures trip the breaker; later requests never reach openai
    assert_eq!(openai.calls(), 2);
    assert_eq!(anthropic.calls(), 5);
    let snapshot = manager.circuit_state("openai").await.unwrap();
    assert_eq!(snapshot.state, CircuitState::Open);
    assert!(snapshot.next_retry_at.is_some());
    assert_eq!(manager.stats("openai").await.unwrap().total_requests, 2);
}

#[tokio::test]
async fn test_exhausted_chain_reports_primary_error() {
    let manager = Manager::new(gateway_config());
    register_stubs(
        &manager,
        &[
            ("openai", Arc::new(StubProvider::new("openai").failing("primary down"))),
            ("anthropic", Arc::new(StubProvider::new("anthropic").failing("second down"))),
            ("gemini", Arc::new(StubProvider::new("gemini").failing("third down"))),
        ],
    )
    .await;

    let err = manager
        .generate(&GenerationRequest::user("hello"))
        .await
        .unwrap_err();
    match err {
        Error::AllProvidersFailed {
            primary,
            attempts,
            source,
        } => {
            assert_eq!(primary, "openai");
            assert_eq!(attempts, 3);
            assert!(source.to_string().contains("primary down"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ============================================================================
// Budgets
// ============================================================================

#[tokio::test]
async fn test_budget_gate_blocks_after_spend_reaches_limit() {
    let mut table = PricingTable::with_defaults();
    table.insert(ModelPricing::new("openai", "pricey", 10.0, 10.0));
    let tracker = Arc::new(TokenTracker::new());
    tracker
        .set_budget("s1", TokenBudget::new().with_daily_limit(0.001))
        .await;

    let gate: Arc<dyn BudgetGate> = tracker.clone();
    let openai = Arc::new(StubProvider::new("openai").with_model("pricey"));
    let manager = Manager::new(ManagerConfig::new("openai"))
        .with_cost_calculator(CostCalculator::new(table))
        .with_budget_gate(gate);
    manager.register("openai", openai.clone()).await;

    let request = GenerationRequest::user("expensive question").with_session("s1");
    let response = manager.generate(&request).await.unwrap();
    tracker
        .track(
            "s1",
            UsageEvent::new(response.usage.clone(), response.cost.clone()),
        )
        .await;

    let status = tracker.check_budget("s1").await.unwrap();
    assert!(status.is_exceeded());

    let err = manager.generate(&request).await.unwrap_err();
    match err {
        Error::BudgetExceeded { session_id, period } => {
            assert_eq!(session_id, "s1");
            assert_eq!(period, "daily");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(openai.calls(), 1);

    // Other sessions are unaffected
    let other = GenerationRequest::user("hello").with_session("s2");
    tokio_test::assert_ok!(manager.generate(&other).await);
}

// ============================================================================
// Streaming
// ============================================================================

#[tokio::test]
async fn test_stream_delivers_content_then_single_terminal_chunk() {
    let manager = Manager::new(gateway_config())
        .with_cost_calculator(CostCalculator::new(PricingTable::with_defaults()));
    manager
        .register("openai", Arc::new(StubProvider::new("openai")))
        .await;

    let mut rx = manager
        .stream(
            &GenerationRequest::user("hello there"),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let mut content = String::new();
    let mut terminal = Vec::new();
    while let Some(chunk) = rx.recv().await {
        if chunk.is_terminal() {
            terminal.push(chunk);
        } else {
            content.push_str(&chunk.content);
        }
    }

    assert_eq!(content, "[openai] hello there");
    assert_eq!(terminal.len(), 1);
    assert!(terminal[0].done);
    assert_eq!(terminal[0].usage.as_ref().unwrap().provider, "openai");

    let stats = manager.stats("openai").await.unwrap();
    assert_eq!(stats.successful_requests, 1);
    assert!(stats.total_tokens > 0);
}

#[tokio::test]
async fn test_cancelled_stream_leaves_breaker_closed() {
    let config = gateway_config().with_circuit_breaker(1, Duration::from_secs(60));
    let manager = Manager::new(config);
    manager
        .register(
            "openai",
            Arc::new(StubProvider::new("openai").with_chunk_delay(Duration::from_millis(50))),
        )
        .await;

    let cancel = CancellationToken::new();
    let mut rx = manager
        .stream(
            &GenerationRequest::user("a long answer with many words"),
            cancel.clone(),
        )
        .await
        .unwrap();
    cancel.cancel();

    let mut last = None;
    while let Some(chunk) = rx.recv().await {
        last = Some(chunk);
    }
    let last = last.unwrap();
    assert!(!last.done);
    assert_eq!(last.error.as_deref(), Some("request cancelled"));

    let snapshot = manager.circuit_state("openai").await.unwrap();
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert_eq!(snapshot.failure_count, 0);
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_reflects_probes() {
    let openai = Arc::new(StubProvider::new("openai"));
    let anthropic = Arc::new(StubProvider::new("anthropic"));
    let manager = Manager::new(gateway_config());
    register_stubs(
        &manager,
        &[("openai", openai.clone()), ("anthropic", anthropic.clone())],
    )
    .await;

    openai.set_healthy(false);
    let health = manager.health_check().await;
    assert_eq!(health.get("openai"), Some(&false));
    assert_eq!(health.get("anthropic"), Some(&true));
    assert!(manager.is_healthy().await);

    anthropic.set_healthy(false);
    assert!(!manager.is_healthy().await);
}
