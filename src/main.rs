//! agent-gateway
//!
//! Resilient, multi-tenant front for a reasoning engine and its slow
//! downstream services.
//!
//! # Architecture Overview
//!
//! ```text
//!   POST /v1/chat
//!        │
//!        ▼
//!   ┌──────────┐   ┌───────────────────┐   ┌──────────────────┐
//!   │   http   │──▶│ gateway           │──▶│ agents           │
//!   │  server  │   │ validate/deadline │   │ handle cache     │
//!   └──────────┘   └─────────┬─────────┘   └────────┬─────────┘
//!                            │                      │ parallel context reads
//!                            ▼                      ▼
//!                  ┌───────────────────┐   ┌──────────────────┐
//!                  │ sessions          │   │ cache (TTL +     │
//!                  │ per-session FIFO  │   │ single-flight)   │
//!                  └─────────┬─────────┘   └────────┬─────────┘
//!                            ▼                      ▼
//!                  ┌───────────────────┐   ┌──────────────────┐
//!                  │ engine + toolbox  │──▶│ resilience       │
//!                  │ reads / writes    │   │ breaker + retry  │
//!                  └─────────┬─────────┘   └────────┬─────────┘
//!                            │ writes (single shot) │
//!                            ▼                      ▼
//!                  ┌──────────────────────────────────────────┐
//!                  │ client::SharedClient (pooled reqwest)    │──▶ downstream services
//!                  └──────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use agent_gateway::config::{load_config, GatewayConfig, CONFIG_ENV};
use agent_gateway::lifecycle::startup;
use agent_gateway::observability::logging;

#[derive(Parser)]
#[command(name = "agent-gateway", version, about = "Resilient multi-tenant agent gateway")]
struct Args {
    /// Path to the TOML config file (falls back to $GATEWAY_CONFIG, then defaults).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let path = args
        .config
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

    let config = match &path {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?path,
        "agent-gateway starting"
    );

    startup::run(config, path).await
}
