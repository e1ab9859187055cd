//! Plugsmith - WordPress plugin generator coordination core
//!
//! CLI entry point for operating on sessions and guardrails.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod config;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plugsmith=info,plugsmith_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = cli::Cli::parse();
    debug!(version = env!("CARGO_PKG_VERSION"), "Starting Plugsmith");

    cli::run(cli).await
}
