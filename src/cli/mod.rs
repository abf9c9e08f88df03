//! CLI module for Switchyard
//!
//! Provides commands:
//! - `pricing`: List the effective pricing table
//! - `estimate`: Estimate the cost of a call before making it
//! - `simulate`: Drive the manager against stub providers and report usage
//! - `config`: Print the effective configuration

use clap::{Parser, Subcommand};

pub mod config;
pub mod estimate;
pub mod pricing;
pub mod simulate;

/// Switchyard gateway CLI
#[derive(Parser, Debug)]
#[command(name = "switchyard")]
#[command(about = "Multi-provider text generation gateway")]
#[command(version)]
pub struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long = "json", global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List model pricing
    Pricing {
        /// Only show this provider
        #[arg(short, long)]
        provider: Option<String>,
    },
    /// Estimate the cost of a call
    Estimate {
        /// Provider name
        #[arg(short, long)]
        provider: String,
        /// Model name
        #[arg(short, long)]
        model: String,
        /// Prompt tokens
        #[arg(short, long)]
        input: u64,
        /// Expected completion tokens
        #[arg(short, long, default_value_t = 0)]
        output: u64,
    },
    /// Route requests through stub providers and print the resulting ledger
    Simulate {
        /// Number of requests to send
        #[arg(short = 'n', long, default_value_t = 10)]
        requests: usize,
        /// Providers that should fail every call (repeatable)
        #[arg(short, long)]
        fail: Vec<String>,
        /// Session the requests are billed to
        #[arg(short, long, default_value = "simulation")]
        session: String,
        /// Refuse requests once the configured budget is exceeded
        #[arg(long)]
        enforce_budget: bool,
    },
    /// Print the effective configuration as TOML
    Config {
        /// Show the embedded defaults instead of the merged result
        #[arg(long)]
        defaults: bool,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Pricing { provider }) => pricing::run(provider.as_deref()),
        Some(Commands::Estimate {
            provider,
            model,
            input,
            output,
        }) => estimate::run(&provider, &model, input, output),
        Some(Commands::Simulate {
            requests,
            fail,
            session,
            enforce_budget,
        }) => {
            simulate::run(simulate::SimulateOptions {
                requests,
                failing: fail,
                session,
                enforce_budget,
            })
            .await
        }
        Some(Commands::Config { defaults }) => config::run(defaults),
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}
