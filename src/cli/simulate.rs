//! CLI command: `switchyard simulate`
//!
//! Registers a stub backend for every configured provider, routes a batch of
//! requests through the manager and prints the resulting stats, session
//! ledger, budget status and savings suggestions.

use crate::loader::load_config;
use anyhow::{bail, Result};
use std::collections::HashMap;
use std::sync::Arc;
use switchyard_llm::cost::format_optimization;
use switchyard_llm::{
    BudgetGate, GenerationRequest, Manager, ProviderStats, StubProvider, TokenTracker, UsageEvent,
};
use tracing::{info, warn};

/// Options for one simulation run
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    /// Number of requests to send
    pub requests: usize,
    /// Providers forced to fail
    pub failing: Vec<String>,
    /// Session billed for the run
    pub session: String,
    /// Attach the tracker as a budget gate
    pub enforce_budget: bool,
}

/// Run the simulate subcommand.
pub async fn run(options: SimulateOptions) -> Result<()> {
    let config = load_config()?;
    if config.manager.primary.is_empty() {
        bail!("manager.primary is not configured");
    }

    let calculator = config.pricing.calculator();
    let tracker = Arc::new(TokenTracker::new());
    if let Some(budget) = config.budget.budget() {
        tracker.set_budget(&options.session, budget).await;
    }

    let mut manager = Manager::new(config.manager.clone()).with_cost_calculator(calculator.clone());
    if options.enforce_budget {
        let gate: Arc<dyn BudgetGate> = tracker.clone();
        manager = manager.with_budget_gate(gate);
    }

    for name in config.manager.provider_names() {
        let mut stub = StubProvider::new(name);
        if let Some(model) = config.manager.default_models.get(name) {
            stub = stub.with_model(model);
            if let Some(pricing) = calculator.table().get(name, model) {
                stub = stub.with_pricing(pricing.clone());
            }
        }
        if options.failing.iter().any(|f| f == name) {
            stub = stub.failing(format!("{name} is down (simulated)"));
        }
        manager.register(name, Arc::new(stub)).await;
    }
    manager.validate().await?;

    info!(
        requests = options.requests,
        session = %options.session,
        "Starting simulation"
    );

    let mut served: HashMap<String, usize> = HashMap::new();
    let mut failed = 0usize;
    for i in 0..options.requests {
        let request = GenerationRequest::user(format!("simulated request number {}", i + 1))
            .with_session(options.session.clone());

        match manager.generate(&request).await {
            Ok(response) => {
                *served.entry(response.provider.clone()).or_default() += 1;
                let event = UsageEvent::new(response.usage.clone(), response.cost.clone())
                    .with_latency(response.latency_ms)
                    .with_query_type("simulation")
                    .with_agent("cli");
                tracker.track(&options.session, event).await;
                tracker.check_budget(&options.session).await;
            }
            Err(e) => {
                failed += 1;
                warn!(request = i + 1, error = %e, "Simulated request failed");
            }
        }
    }

    print_stats(&manager.all_stats().await);
    print_served(&served, failed);
    print_session(&tracker, &options.session).await;

    let optimization = tracker.optimization_suggestions().await;
    println!("{}", format_optimization(&optimization));
    println!();

    Ok(())
}

fn print_stats(stats: &HashMap<String, ProviderStats>) {
    let mut rows: Vec<&ProviderStats> = stats.values().collect();
    rows.sort_by(|a, b| a.provider.cmp(&b.provider));

    println!();
    println!("  Provider Stats");
    println!("  {}", "-".repeat(72));
    println!(
        "  {:<12} {:>8} {:>8} {:>8} {:>10} {:>12}",
        "Provider", "Total", "OK", "Failed", "Avg ms", "Cost"
    );
    println!("  {}", "-".repeat(72));
    for s in rows {
        println!(
            "  {:<12} {:>8} {:>8} {:>8} {:>10.1} {:>12.6}",
            s.provider,
            s.total_requests,
            s.successful_requests,
            s.failed_requests,
            s.average_latency_ms,
            s.total_cost
        );
        if let Some(err) = &s.last_error {
            println!("  {:<12} last error: {}", "", err);
        }
    }
}

fn print_served(served: &HashMap<String, usize>, failed: usize) {
    let mut rows: Vec<(&String, &usize)> = served.iter().collect();
    rows.sort();

    println!("  {}", "-".repeat(72));
    let summary: Vec<String> = rows
        .iter()
        .map(|(name, count)| format!("{name}={count}"))
        .collect();
    println!("  Served by: {}  |  Failed: {}", summary.join(", "), failed);
}

async fn print_session(tracker: &TokenTracker, session: &str) {
    println!();
    match tracker.get_session_usage(session).await {
        Some(usage) => {
            println!(
                "  Session {}: {} queries, {} tokens, ${:.6}",
                usage.session_id, usage.total_queries, usage.total_tokens, usage.total_cost
            );
        }
        None => println!("  Session {session}: no usage recorded"),
    }

    if let Some(status) = tracker.check_budget(session).await {
        let budget = &status.budget;
        if let Some(limit) = budget.daily_limit {
            println!(
                "  Daily budget:   ${:.4} / ${:.4}",
                budget.current_daily_spend, limit
            );
        }
        if let Some(limit) = budget.monthly_limit {
            println!(
                "  Monthly budget: ${:.4} / ${:.4}",
                budget.current_monthly_spend, limit
            );
        }
        for warning in &budget.warnings {
            println!("  !! {}", warning.message);
        }
        if status.is_exceeded() {
            println!("  Budget exceeded");
        }
    }
    println!();
}
