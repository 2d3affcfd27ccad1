//! Nova Server - Headless autonomous treasury operator
//!
//! Runs the full agent swarm without any UI or HTTP server. Metrics are
//! pushed via structured JSON logs to stdout - no incoming connections.
//!
//! # Usage
//! ```sh
//! DRY_RUN=true cargo run --bin nova-server
//! ```
//!
//! # Environment Variables
//! - `DATABASE_URL` - SQLite database (default: sqlite://nova.db)
//! - `DRY_RUN` - Simulate executions without touching collaborators (default: true)
//! - `AUTO_DECISIONS` - Run the autonomous decision interval (default: true)
//! - `OBSERVABILITY_ENABLED` - Enable metrics reporting (default: true)
//!
//! External collaborators (exchange clients, venues, publication sinks) are
//! plugged in via `Application::with_services` by the embedding binary;
//! this default server runs the coordination core on its own.

use anyhow::Result;
use nova::application::system::Application;
use nova::config::Config;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Setup logging (stdout only)
    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false).pretty();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    info!("Nova Server {} starting...", env!("CARGO_PKG_VERSION"));
    info!("Mode: HEADLESS (no UI, no HTTP server)");

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded: dry_run={}, auto_decisions={}, poll={}ms",
        config.engine.dry_run, config.engine.auto_decisions, config.swarm.poll_interval_ms
    );

    // Build and start the swarm
    let app = Application::build(config).await?;
    let handle = app.start().await?;
    info!("Swarm running. Press Ctrl+C to shutdown.");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received.");
    handle.shutdown().await;

    Ok(())
}
