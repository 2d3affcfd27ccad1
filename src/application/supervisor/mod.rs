//! Supervisor: the swarm's router and mouthpiece.
//!
//! Consumes worker messages through a `(sender, kind)` handler registry,
//! gates everything outbound behind cooldowns, dedup and the content filter,
//! owns the token-child agents, and emits the periodic swarm briefing.

pub mod briefing;
pub mod dedup;
mod handlers;
pub mod publish;

pub use publish::{Destination, OutboundGate};

use crate::application::agents::token_child::{TokenChildAgent, TokenChildConfig};
use crate::application::runtime::{
    AgentContext, WorkerAgent, start_worker, stop_worker,
};
use crate::config::SwarmEnvConfig;
use crate::domain::message::{Message, MessageType};
use crate::domain::ports::{MarketDataSource, PositionLedger};
use crate::infrastructure::observability::Metrics;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dedup::FingerprintHistory;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Routed handler identities. Lookup tries the exact `(sender, kind)` pair,
/// then the wildcard sender for the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Narrative,
    SafetyAlert,
    AnalystIntel,
    LauncherEvent,
    CommunityReport,
    HealthCommand,
    HealthStatus,
    ChildStatus,
    CfoReport,
}

pub const WILDCARD_SENDER: &str = "*";

/// Mutable supervisor state, persisted across restarts.
pub struct SupervisorState {
    pub messages_processed: u64,
    pub last_briefing_at: Option<DateTime<Utc>>,
    pub last_narrative_post_at: Option<DateTime<Utc>>,
    pub fingerprints: FingerprintHistory,
    dirty: bool,
}

#[derive(Serialize, Deserialize, Default)]
struct SupervisorStateBlob {
    messages_processed: u64,
    last_briefing_at: Option<DateTime<Utc>>,
    last_narrative_post_at: Option<DateTime<Utc>>,
    recent_x_post_hashes: Vec<String>,
}

pub struct Supervisor {
    ctx: Arc<AgentContext>,
    gate: OutboundGate,
    config: SwarmEnvConfig,
    registry: HashMap<(String, MessageType), HandlerKind>,
    pub(crate) state: Mutex<SupervisorState>,
    children: Mutex<HashMap<String, Arc<TokenChildAgent>>>,
    market: Option<Arc<dyn MarketDataSource>>,
    ledger: Option<Arc<dyn PositionLedger>>,
    metrics: Option<Metrics>,
}

impl Supervisor {
    pub fn new(
        ctx: Arc<AgentContext>,
        gate: OutboundGate,
        config: SwarmEnvConfig,
        market: Option<Arc<dyn MarketDataSource>>,
        ledger: Option<Arc<dyn PositionLedger>>,
        metrics: Option<Metrics>,
    ) -> Arc<Self> {
        let fingerprint_cap = config.max_x_post_history;
        Arc::new(Self {
            ctx,
            gate,
            config,
            registry: Self::default_registry(),
            state: Mutex::new(SupervisorState {
                messages_processed: 0,
                last_briefing_at: None,
                last_narrative_post_at: None,
                fingerprints: FingerprintHistory::new(fingerprint_cap),
                dirty: false,
            }),
            children: Mutex::new(HashMap::new()),
            market,
            ledger,
            metrics,
        })
    }

    fn default_registry() -> HashMap<(String, MessageType), HandlerKind> {
        let mut registry = HashMap::new();
        registry.insert(
            ("nova-scout".to_string(), MessageType::Intel),
            HandlerKind::Narrative,
        );
        registry.insert(
            ("nova-guardian".to_string(), MessageType::Alert),
            HandlerKind::SafetyAlert,
        );
        registry.insert(
            ("nova-analyst".to_string(), MessageType::Intel),
            HandlerKind::AnalystIntel,
        );
        registry.insert(
            ("nova-analyst".to_string(), MessageType::Report),
            HandlerKind::AnalystIntel,
        );
        registry.insert(
            ("nova-launcher".to_string(), MessageType::Report),
            HandlerKind::LauncherEvent,
        );
        registry.insert(
            ("nova-community".to_string(), MessageType::Report),
            HandlerKind::CommunityReport,
        );
        registry.insert(
            ("nova-health".to_string(), MessageType::Command),
            HandlerKind::HealthCommand,
        );
        registry.insert(
            ("nova-health".to_string(), MessageType::Status),
            HandlerKind::HealthStatus,
        );
        registry.insert(
            ("nova-cfo".to_string(), MessageType::Report),
            HandlerKind::CfoReport,
        );
        // Any other agent's status rows are child reports.
        registry.insert(
            (WILDCARD_SENDER.to_string(), MessageType::Status),
            HandlerKind::ChildStatus,
        );
        registry
    }

    pub fn resolve_handler(&self, from: &str, kind: MessageType) -> Option<HandlerKind> {
        self.registry
            .get(&(from.to_string(), kind))
            .or_else(|| self.registry.get(&(WILDCARD_SENDER.to_string(), kind)))
            .copied()
    }

    pub(crate) fn gate(&self) -> &OutboundGate {
        &self.gate
    }

    pub(crate) fn swarm_config(&self) -> &SwarmEnvConfig {
        &self.config
    }

    // --- child management ---

    pub async fn spawn_child(&self, mint: &str, symbol: &str) -> Result<()> {
        let mut children = self.children.lock().await;
        if children.contains_key(mint) {
            debug!("nova-supervisor: child for {} already running", mint);
            return Ok(());
        }

        let name = format!("nova-token-{}", mint);
        let child_ctx = AgentContext::new(
            &name,
            "token_child",
            self.ctx.bus().clone(),
            self.ctx.agent_registry().clone(),
            self.ctx.kv().clone(),
        );
        let child = TokenChildAgent::new(
            child_ctx,
            self.market.clone(),
            TokenChildConfig {
                mint: mint.to_string(),
                symbol: symbol.to_string(),
                report_interval: Duration::from_secs(300),
            },
        );

        start_worker(
            child.clone() as Arc<dyn WorkerAgent>,
            self.config.heartbeat_interval_ms,
            self.config.poll_interval_ms,
            self.config.poll_batch_size,
        )
        .await?;

        info!("nova-supervisor: spawned child {} for {}", name, symbol);
        children.insert(mint.to_string(), child);
        Ok(())
    }

    pub async fn deactivate_child(&self, mint: &str) -> bool {
        let child = self.children.lock().await.remove(mint);
        match child {
            Some(child) => {
                let worker: Arc<dyn WorkerAgent> = child;
                stop_worker(&worker).await;
                info!("nova-supervisor: deactivated child for {}", mint);
                true
            }
            None => {
                debug!("nova-supervisor: no child for {}", mint);
                false
            }
        }
    }

    /// Resolve a child's agent name back to its mint.
    pub async fn child_mint_by_agent_name(&self, agent_name: &str) -> Option<String> {
        let children = self.children.lock().await;
        for (mint, child) in children.iter() {
            if child.context().name() == agent_name {
                return Some(mint.clone());
            }
        }
        None
    }

    pub async fn child_count(&self) -> usize {
        self.children.lock().await.len()
    }

    // --- state persistence ---

    pub(crate) async fn restore_state(&self) {
        let Some(value) = self.ctx.restore_state().await else {
            return;
        };
        let Ok(blob) = serde_json::from_value::<SupervisorStateBlob>(value) else {
            warn!("nova-supervisor: persisted state unreadable, starting fresh");
            return;
        };
        let mut state = self.state.lock().await;
        state.messages_processed = blob.messages_processed;
        state.last_briefing_at = blob.last_briefing_at;
        state.last_narrative_post_at = blob.last_narrative_post_at;
        state.fingerprints =
            FingerprintHistory::restore(self.config.max_x_post_history, blob.recent_x_post_hashes);
        info!(
            "nova-supervisor: restored state ({} processed, {} fingerprints)",
            state.messages_processed,
            state.fingerprints.len()
        );
    }

    pub(crate) async fn save_state(&self) {
        let blob = {
            let mut state = self.state.lock().await;
            state.dirty = false;
            SupervisorStateBlob {
                messages_processed: state.messages_processed,
                last_briefing_at: state.last_briefing_at,
                last_narrative_post_at: state.last_narrative_post_at,
                recent_x_post_hashes: state.fingerprints.snapshot(),
            }
        };
        match serde_json::to_value(&blob) {
            Ok(value) => self.ctx.save_state(&value).await,
            Err(e) => warn!("nova-supervisor: state serialize failed: {}", e),
        }
    }

    pub async fn messages_processed(&self) -> u64 {
        self.state.lock().await.messages_processed
    }

    pub async fn last_narrative_post_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.last_narrative_post_at
    }

    // --- briefing ---

    pub async fn run_briefing(&self) {
        let window = ChronoDuration::hours(self.config.briefing_interval_hours as i64);
        let since = Utc::now() - window;

        let active = self
            .ctx
            .agent_registry()
            .active_agents(Utc::now() - ChronoDuration::milliseconds(
                self.config.heartbeat_dead_after_ms as i64,
            ))
            .await
            .unwrap_or_default();

        let recent = self
            .ctx
            .bus()
            .recent_for(self.ctx.name(), since)
            .await
            .unwrap_or_default();

        let stats = self.collect_stats().await;
        let processed = self.state.lock().await.messages_processed;

        let output = briefing::build_briefing(&active, &recent, &stats, processed);
        info!(
            "nova-supervisor: briefing ({} key, {} routine)",
            output.key_intel_count, output.routine_count
        );

        self.gate.publish(Destination::Admin, &output.admin).await;
        self.gate
            .publish(Destination::Channel, &output.community)
            .await;

        {
            let mut state = self.state.lock().await;
            state.messages_processed = 0;
            state.last_briefing_at = Some(Utc::now());
        }
        self.save_state().await;
    }

    /// Live stats for the briefing. Every source is optional; failures
    /// degrade to a missing section.
    async fn collect_stats(&self) -> briefing::BriefingStats {
        let mut stats = briefing::BriefingStats::default();

        if let Some(ledger) = &self.ledger {
            let since = Utc::now() - ChronoDuration::days(7);
            match ledger.closed_positions(since).await {
                Ok(positions) if !positions.is_empty() => {
                    let pnl: f64 = positions.iter().map(|p| p.pnl_usd).sum();
                    stats.pnl_summary =
                        Some(format!("{:+.2} USD over {} closes (7d)", pnl, positions.len()));
                }
                Ok(_) => {}
                Err(e) => debug!("nova-supervisor: pnl stats unavailable: {}", e),
            }
        }

        if let Some(metrics) = &self.metrics {
            stats.metrics_summary = Some(format!(
                "portfolio ${:.0}, hedge {:.0}%, risk x{:.2}",
                metrics.portfolio_value_usd.get(),
                metrics.hedge_ratio.get() * 100.0,
                metrics.risk_multiplier.get()
            ));
        }

        stats
    }
}

#[async_trait]
impl WorkerAgent for Supervisor {
    fn context(&self) -> &Arc<AgentContext> {
        &self.ctx
    }

    async fn on_start(&self) -> Result<()> {
        self.restore_state().await;
        Ok(())
    }

    async fn on_stop(&self) -> Result<()> {
        // Best-effort concurrent shutdown of all children.
        let children: Vec<Arc<TokenChildAgent>> =
            self.children.lock().await.drain().map(|(_, c)| c).collect();
        let stops = children.into_iter().map(|child| async move {
            let worker: Arc<dyn WorkerAgent> = child;
            stop_worker(&worker).await;
        });
        futures::future::join_all(stops).await;

        self.save_state().await;
        Ok(())
    }

    async fn handle_message(&self, message: &Message) -> Result<()> {
        let handler = self.resolve_handler(&message.from, message.kind);

        {
            let mut state = self.state.lock().await;
            state.messages_processed += 1;
            state.dirty = true;
        }
        if let Some(metrics) = &self.metrics {
            metrics
                .messages_processed_total
                .with_label_values(&[message.from.as_str()])
                .inc();
        }

        match handler {
            Some(HandlerKind::Narrative) => self.handle_narrative(message).await,
            Some(HandlerKind::SafetyAlert) => self.handle_safety_alert(message).await,
            Some(HandlerKind::AnalystIntel) => self.handle_analyst_intel(message).await,
            Some(HandlerKind::LauncherEvent) => self.handle_launcher_event(message).await,
            Some(HandlerKind::CommunityReport) => self.handle_community_report(message).await,
            Some(HandlerKind::HealthCommand) => self.handle_health_command(message).await,
            Some(HandlerKind::HealthStatus) => self.handle_health_status(message).await,
            Some(HandlerKind::ChildStatus) => self.handle_child_status(message).await,
            Some(HandlerKind::CfoReport) => self.handle_cfo_report(message).await,
            None => {
                debug!(
                    "nova-supervisor: no handler for ({}, {})",
                    message.from, message.kind
                );
                Ok(())
            }
        }
    }
}

/// Bring the supervisor online with its briefing and state-flush intervals.
pub async fn start_supervisor(supervisor: Arc<Supervisor>) -> Result<()> {
    let config = supervisor.swarm_config().clone();
    start_worker(
        supervisor.clone() as Arc<dyn WorkerAgent>,
        config.heartbeat_interval_ms,
        config.poll_interval_ms,
        config.poll_batch_size,
    )
    .await?;

    let briefing_supervisor = Arc::clone(&supervisor);
    supervisor
        .context()
        .add_interval(
            Duration::from_secs(config.briefing_interval_hours * 3600),
            "briefing",
            move || {
                let supervisor = Arc::clone(&briefing_supervisor);
                async move {
                    supervisor.run_briefing().await;
                }
            },
        )
        .await;

    // Counter persistence: flush when a batch left the state dirty.
    let flush_supervisor = Arc::clone(&supervisor);
    supervisor
        .context()
        .add_interval(
            Duration::from_millis(config.poll_interval_ms.max(5000)),
            "state-flush",
            move || {
                let supervisor = Arc::clone(&flush_supervisor);
                async move {
                    if supervisor.state.lock().await.dirty {
                        supervisor.save_state().await;
                    }
                }
            },
        )
        .await;

    Ok(())
}
