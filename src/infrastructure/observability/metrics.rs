//! Prometheus metrics definitions for Nova
//!
//! All metrics use the `nova_` prefix and are push-only.

use prometheus::{
    CounterVec, Gauge, Opts, Registry,
    core::{AtomicF64, GenericGauge},
};
use std::sync::Arc;

/// Prometheus metrics for the swarm
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Total portfolio value in USD
    pub portfolio_value_usd: GenericGauge<AtomicF64>,
    /// Aggregate hedge ratio (shortUsd / hedgeableUsd)
    pub hedge_ratio: GenericGauge<AtomicF64>,
    /// Swarm risk multiplier from the last cycle
    pub risk_multiplier: GenericGauge<AtomicF64>,
    /// Pending approvals currently queued
    pub pending_approvals: GenericGauge<AtomicF64>,
    /// Agents with a live heartbeat
    pub active_agents: GenericGauge<AtomicF64>,
    /// Messages published to the bus, by kind
    pub messages_sent_total: CounterVec,
    /// Messages the supervisor has drained, by sender
    pub messages_processed_total: CounterVec,
    /// Decisions emitted, by type and tier
    pub decisions_total: CounterVec,
    /// Uptime in seconds
    pub uptime_seconds: GenericGauge<AtomicF64>,
}

impl Metrics {
    /// Create a new Metrics instance with all gauges and counters registered
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let portfolio_value_usd = Gauge::with_opts(Opts::new(
            "nova_portfolio_value_usd",
            "Total portfolio value in USD",
        ))?;
        registry.register(Box::new(portfolio_value_usd.clone()))?;

        let hedge_ratio = Gauge::with_opts(Opts::new(
            "nova_hedge_ratio",
            "Aggregate hedge ratio (shortUsd / hedgeableUsd)",
        ))?;
        registry.register(Box::new(hedge_ratio.clone()))?;

        let risk_multiplier = Gauge::with_opts(Opts::new(
            "nova_risk_multiplier",
            "Swarm risk multiplier from the last decision cycle",
        ))?;
        registry.register(Box::new(risk_multiplier.clone()))?;

        let pending_approvals = Gauge::with_opts(Opts::new(
            "nova_pending_approvals",
            "Pending approvals currently queued",
        ))?;
        registry.register(Box::new(pending_approvals.clone()))?;

        let active_agents = Gauge::with_opts(Opts::new(
            "nova_active_agents",
            "Agents with a live heartbeat",
        ))?;
        registry.register(Box::new(active_agents.clone()))?;

        let messages_sent_total = CounterVec::new(
            Opts::new("nova_messages_sent_total", "Messages published to the bus"),
            &["kind"],
        )?;
        registry.register(Box::new(messages_sent_total.clone()))?;

        let messages_processed_total = CounterVec::new(
            Opts::new(
                "nova_messages_processed_total",
                "Messages drained by the supervisor",
            ),
            &["sender"],
        )?;
        registry.register(Box::new(messages_processed_total.clone()))?;

        let decisions_total = CounterVec::new(
            Opts::new("nova_decisions_total", "Decisions emitted by the engine"),
            &["decision_type", "tier"],
        )?;
        registry.register(Box::new(decisions_total.clone()))?;

        let uptime_seconds =
            Gauge::with_opts(Opts::new("nova_uptime_seconds", "Uptime in seconds"))?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            portfolio_value_usd,
            hedge_ratio,
            risk_multiplier,
            pending_approvals,
            active_agents,
            messages_sent_total,
            messages_processed_total,
            decisions_total,
            uptime_seconds,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_once() {
        let metrics = Metrics::new().expect("metrics should register");
        metrics.portfolio_value_usd.set(1234.5);
        metrics.decisions_total.with_label_values(&["OPEN_HEDGE", "AUTO"]).inc();
        assert_eq!(metrics.portfolio_value_usd.get(), 1234.5);
    }
}
