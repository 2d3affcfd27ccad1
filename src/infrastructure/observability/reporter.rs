//! Push-based metrics reporter for Nova
//!
//! Periodically outputs swarm metrics as structured JSON to stdout.
//!
//! **Security**: This system only SENDS data, never accepts requests.

use crate::infrastructure::observability::metrics::Metrics;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Metrics snapshot for JSON output
#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub portfolio_value_usd: f64,
    pub hedge_ratio: f64,
    pub risk_multiplier: f64,
    pub pending_approvals: u64,
    pub active_agents: u64,
}

/// Push-based metrics reporter
///
/// Outputs metrics as structured JSON logs on a configurable interval.
/// No HTTP server, no incoming connections - only outbound data.
pub struct MetricsReporter {
    metrics: Metrics,
    start_time: Instant,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(metrics: Metrics, interval_seconds: u64) -> Self {
        Self {
            metrics,
            start_time: Instant::now(),
            interval: Duration::from_secs(interval_seconds),
        }
    }

    /// Run the reporter in a loop, outputting metrics periodically
    pub async fn run(self) {
        info!(
            "MetricsReporter: Starting push-based metrics (interval: {:?})",
            self.interval
        );

        loop {
            tokio::time::sleep(self.interval).await;

            let snapshot = self.collect_snapshot();
            match serde_json::to_string(&snapshot) {
                Ok(json) => println!("METRICS_JSON:{}", json),
                Err(e) => warn!("MetricsReporter: serialization failed: {}", e),
            }
        }
    }

    fn collect_snapshot(&self) -> MetricsSnapshot {
        let uptime = self.start_time.elapsed().as_secs();
        self.metrics.uptime_seconds.set(uptime as f64);

        MetricsSnapshot {
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_seconds: uptime,
            version: env!("CARGO_PKG_VERSION").to_string(),
            portfolio_value_usd: self.metrics.portfolio_value_usd.get(),
            hedge_ratio: self.metrics.hedge_ratio.get(),
            risk_multiplier: self.metrics.risk_multiplier.get(),
            pending_approvals: self.metrics.pending_approvals.get() as u64,
            active_agents: self.metrics.active_agents.get() as u64,
        }
    }
}
