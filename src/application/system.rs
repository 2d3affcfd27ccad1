//! System orchestrator: builds and starts the whole swarm.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::application::agents::{
    analyst::AnalystAgent,
    cfo::CfoAgent,
    community::CommunityAgent,
    guardian::{GuardianAgent, WatchTarget},
    health::HealthAgent,
    launcher::LauncherAgent,
    scout::ScoutAgent,
};
use crate::application::engine::{DecisionEngine, EngineServices};
use crate::application::learning::LearningEngine;
use crate::application::runtime::{AgentContext, CFO, SUPERVISOR, WorkerAgent, start_worker, stop_worker};
use crate::application::supervisor::{OutboundGate, Supervisor, start_supervisor};
use crate::config::Config;
use crate::domain::ports::{ContentFilter, PublicationSink};
use crate::infrastructure::feeds::{NarrativeFeed, RssNarrativeSource};
use crate::infrastructure::observability::{Metrics, MetricsReporter};
use crate::infrastructure::persistence::{
    AgentRepository, CleanupTask, Database, KvRepository, MessageRepository,
};

/// Default sweep cadence for the intel-producing workers.
const WORKER_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

pub struct Application {
    pub config: Config,
    pub database: Database,
    pub bus: MessageRepository,
    pub agents: AgentRepository,
    pub kv: KvRepository,
    services: EngineServices,
    sink: Option<Arc<dyn PublicationSink>>,
    filter: Option<Arc<dyn ContentFilter>>,
    feed: Option<Arc<dyn NarrativeFeed>>,
}

/// Handles to the running swarm, used for clean shutdown.
pub struct SystemHandle {
    pub supervisor: Arc<Supervisor>,
    pub engine: Arc<DecisionEngine>,
    workers: Vec<Arc<dyn WorkerAgent>>,
}

impl Application {
    pub async fn build(config: Config) -> Result<Self> {
        info!("Building Nova swarm (db: {})...", config.database_url);
        let database = Database::new(&config.database_url).await?;

        let bus = MessageRepository::new(database.clone());
        let agents = AgentRepository::new(database.clone());
        let kv = KvRepository::new(database.clone());

        let feed: Option<Arc<dyn NarrativeFeed>> = if config.swarm.scout_feed_url.is_empty() {
            None
        } else {
            Some(Arc::new(RssNarrativeSource::new(&config.swarm.scout_feed_url)))
        };

        Ok(Self {
            config,
            database,
            bus,
            agents,
            kv,
            services: EngineServices::default(),
            sink: None,
            filter: None,
            feed,
        })
    }

    /// Plug the external collaborator set (exchange clients, venues, ...).
    pub fn with_services(mut self, services: EngineServices) -> Self {
        self.services = services;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn PublicationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_filter(mut self, filter: Arc<dyn ContentFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_feed(mut self, feed: Arc<dyn NarrativeFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    fn context(&self, name: &str, kind: &str) -> Arc<AgentContext> {
        AgentContext::new(
            name,
            kind,
            self.bus.clone(),
            self.agents.clone(),
            self.kv.clone(),
        )
    }

    pub async fn start(self) -> Result<SystemHandle> {
        let swarm = self.config.swarm.clone();
        let metrics = match Metrics::new() {
            Ok(metrics) => Some(metrics),
            Err(e) => {
                warn!("Metrics registry failed, running without: {}", e);
                None
            }
        };

        // Decision engine + CFO
        let learning = LearningEngine::new(self.services.ledger.clone(), self.kv.clone());
        let mut engine_config = self.config.engine.clone();
        if !self.config.live_trading && !engine_config.dry_run {
            warn!("LIVE_TRADING is off, forcing dry-run mode");
            engine_config.dry_run = true;
        }
        let engine = DecisionEngine::new(
            self.services.clone(),
            engine_config,
            learning,
            self.bus.clone(),
            self.kv.clone(),
            metrics.clone(),
        );

        // Supervisor
        let gate = OutboundGate::new(
            self.sink.clone(),
            self.filter.clone(),
            &swarm.farcaster_channel,
            swarm.x_char_limit,
        );
        let supervisor = Supervisor::new(
            self.context(SUPERVISOR, "supervisor"),
            gate,
            swarm.clone(),
            self.services.market.clone(),
            self.services.ledger.clone(),
            metrics.clone(),
        );
        start_supervisor(supervisor.clone()).await?;

        // Workers
        let mut workers: Vec<Arc<dyn WorkerAgent>> = Vec::new();

        let scout = ScoutAgent::new(
            self.context("nova-scout", "scout"),
            self.feed.clone(),
            Duration::from_secs(swarm.scout_poll_interval_secs),
        );
        workers.push(scout);

        let guardian = GuardianAgent::new(
            self.context("nova-guardian", "guardian"),
            self.services.market.clone(),
            vec![
                WatchTarget {
                    symbol: "SOL".to_string(),
                    mint: None,
                },
                WatchTarget {
                    symbol: "BTC".to_string(),
                    mint: None,
                },
            ],
            WORKER_SWEEP_INTERVAL,
        );
        workers.push(guardian);

        let analyst = AnalystAgent::new(
            self.context("nova-analyst", "analyst"),
            self.services.market.clone(),
            vec!["SOL".to_string(), "BTC".to_string(), "ETH".to_string()],
            WORKER_SWEEP_INTERVAL,
        );
        workers.push(analyst);

        let community = CommunityAgent::new(
            self.context("nova-community", "community"),
            Duration::from_secs(600),
            swarm.ban_burst_threshold,
            swarm.ban_burst_window_minutes,
        );
        workers.push(community);

        let launcher = LauncherAgent::new(
            self.context("nova-launcher", "launcher"),
            self.services.market.clone(),
            WORKER_SWEEP_INTERVAL,
        );
        workers.push(launcher);

        let health = HealthAgent::new(
            self.context("nova-health", "health"),
            Duration::from_millis(swarm.heartbeat_degraded_after_ms),
            swarm.heartbeat_degraded_after_ms,
            swarm.heartbeat_dead_after_ms,
        );
        workers.push(health);

        let cfo = CfoAgent::new(self.context(CFO, "cfo"), engine.clone());
        workers.push(cfo);

        for worker in &workers {
            start_worker(
                worker.clone(),
                swarm.heartbeat_interval_ms,
                swarm.poll_interval_ms,
                swarm.poll_batch_size,
            )
            .await?;
        }

        // Bus garbage collection
        let cleanup = CleanupTask::new(
            self.bus.clone(),
            self.agents.clone(),
            self.kv.clone(),
            swarm.cleanup_interval_hours,
            swarm.audit_retention_days,
        );
        tokio::spawn(cleanup.run());

        // Push-based metrics
        if self.config.observability.enabled
            && let Some(metrics) = metrics
        {
            let reporter =
                MetricsReporter::new(metrics, self.config.observability.interval_seconds);
            tokio::spawn(reporter.run());
        }

        info!("Nova swarm running ({} workers + supervisor).", workers.len());
        Ok(SystemHandle {
            supervisor,
            engine,
            workers,
        })
    }
}

impl SystemHandle {
    /// Cooperative shutdown: workers first, then the supervisor (which
    /// tears down its children).
    pub async fn shutdown(self) {
        info!("Shutting down swarm...");
        for worker in &self.workers {
            stop_worker(worker).await;
        }
        let supervisor: Arc<dyn WorkerAgent> = self.supervisor;
        stop_worker(&supervisor).await;
        info!("Swarm stopped.");
    }
}
