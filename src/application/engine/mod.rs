//! Autonomous decision engine.
//!
//! One cycle: gather -> consult -> assess -> decide -> execute -> report.
//! Cycles are serialized process-wide by a try-lock; an overlapping
//! invocation returns an empty, skipped outcome. Every result carries the
//! cycle's trace id.

pub mod approvals;
pub mod consult;
pub mod cooldowns;
pub mod execute;
pub mod gather;
pub mod rules;

pub use approvals::{ApprovalQueue, PendingApproval};
pub use cooldowns::CooldownTracker;

use crate::application::learning::LearningEngine;
use crate::config::EngineEnvConfig;
use crate::domain::decision::{Decision, DecisionResult, Tier};
use crate::domain::errors::ApprovalError;
use crate::domain::intel::SwarmIntel;
use crate::domain::portfolio::PortfolioState;
use crate::domain::ports::{
    BridgeService, LendingProtocol, LpVenue, MarketDataSource, PerpVenue, PositionLedger,
    PredictionMarket, ScoutContext, StakingService, WalletService,
};
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::persistence::{KvRepository, MessageRepository};
use chrono::{Duration as ChronoDuration, Utc};
use rules::{OpportunityData, RuleContext};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Pause between sequential executions, for external rate limits.
const INTER_DECISION_DELAY: Duration = Duration::from_secs(2);

/// The optional collaborator set. An unset service disables the rules that
/// need it; nothing treats absence as an error.
#[derive(Default, Clone)]
pub struct EngineServices {
    pub market: Option<Arc<dyn MarketDataSource>>,
    pub wallet: Option<Arc<dyn WalletService>>,
    pub perp: Option<Arc<dyn PerpVenue>>,
    pub prediction: Option<Arc<dyn PredictionMarket>>,
    pub staking: Option<Arc<dyn StakingService>>,
    pub lending: Option<Arc<dyn LendingProtocol>>,
    pub lp_venues: Vec<Arc<dyn LpVenue>>,
    pub bridge: Option<Arc<dyn BridgeService>>,
    pub ledger: Option<Arc<dyn PositionLedger>>,
}

/// Everything a single cycle produced.
pub struct CycleOutcome {
    pub trace_id: String,
    pub skipped: bool,
    pub portfolio: Option<PortfolioState>,
    pub intel: Option<SwarmIntel>,
    pub results: Vec<DecisionResult>,
}

impl CycleOutcome {
    fn skipped(trace_id: String) -> Self {
        Self {
            trace_id,
            skipped: true,
            portfolio: None,
            intel: None,
            results: Vec::new(),
        }
    }
}

pub struct DecisionEngine {
    services: EngineServices,
    config: EngineEnvConfig,
    live_cooldowns: CooldownTracker,
    dry_cooldowns: CooldownTracker,
    approvals: ApprovalQueue,
    learning: LearningEngine,
    cycle_lock: Mutex<()>,
    bus: MessageRepository,
    kv: KvRepository,
    metrics: Option<Metrics>,
    paused: AtomicBool,
}

impl DecisionEngine {
    pub fn new(
        services: EngineServices,
        config: EngineEnvConfig,
        learning: LearningEngine,
        bus: MessageRepository,
        kv: KvRepository,
        metrics: Option<Metrics>,
    ) -> Arc<Self> {
        Arc::new(Self {
            services,
            config,
            live_cooldowns: CooldownTracker::new(),
            dry_cooldowns: CooldownTracker::new(),
            approvals: ApprovalQueue::new(),
            learning,
            cycle_lock: Mutex::new(()),
            bus,
            kv,
            metrics,
            paused: AtomicBool::new(false),
        })
    }

    pub fn approvals(&self) -> &ApprovalQueue {
        &self.approvals
    }

    pub fn config(&self) -> &EngineEnvConfig {
        &self.config
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Snapshot without deciding; used by status commands.
    pub async fn snapshot(&self) -> PortfolioState {
        gather::gather_portfolio(&self.services, &self.config).await
    }

    /// Run one full decision cycle. Overlapping invocations return an
    /// empty, skipped outcome.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let trace_id = Uuid::new_v4().to_string()[..8].to_string();

        let Ok(_guard) = self.cycle_lock.try_lock() else {
            debug!("[{}] cycle already running, skipping", trace_id);
            return CycleOutcome::skipped(trace_id);
        };
        if self.is_paused() {
            debug!("[{}] engine paused, skipping", trace_id);
            return CycleOutcome::skipped(trace_id);
        }

        let now = Utc::now();
        info!("[{}] cycle start", trace_id);

        // 1. Gather, 2. Consult, learning prior
        let portfolio = gather::gather_portfolio(&self.services, &self.config).await;
        let intel = consult::consult_intel(&self.bus, now).await;
        let adaptive = self.learning.current().await;

        // 3. Opportunity data the rules will score
        let data = self.fetch_opportunities(&portfolio, &intel).await;

        // 4. Decide
        let decisions = {
            let ctx = RuleContext {
                portfolio: &portfolio,
                intel: &intel,
                adaptive: &adaptive,
                config: &self.config,
                data: &data,
                live_cooldowns: &self.live_cooldowns,
                dry_cooldowns: &self.dry_cooldowns,
                now,
            };
            rules::generate_decisions(&ctx)
        };
        info!(
            "[{}] {} decisions (risk x{:.2}, {:?})",
            trace_id,
            decisions.len(),
            intel.risk_multiplier,
            intel.condition()
        );

        // 5. Execute sequentially with the rate-limit delay
        let mut results = Vec::with_capacity(decisions.len());
        for (index, decision) in decisions.into_iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(INTER_DECISION_DELAY).await;
            }
            results.push(self.execute_one(decision, &trace_id).await);
        }

        self.publish_metrics(&portfolio, &intel);
        self.write_audit_row(&trace_id, &portfolio, &intel, &results)
            .await;

        CycleOutcome {
            trace_id,
            skipped: false,
            portfolio: Some(portfolio),
            intel: Some(intel),
            results,
        }
    }

    /// Execute one decision; `Approval` tiers are queued instead.
    async fn execute_one(&self, decision: Decision, trace_id: &str) -> DecisionResult {
        if decision.tier == Tier::Approval {
            let entry = self.approvals.queue(
                decision.clone(),
                ChronoDuration::minutes(self.config.approval_expiry_min),
            );
            if let Some(metrics) = &self.metrics {
                metrics.pending_approvals.set(self.approvals.len() as f64);
            }
            let mut result = execute::execute_decision(
                &decision,
                &self.services,
                &self.config,
                &self.live_cooldowns,
                &self.dry_cooldowns,
                trace_id,
            )
            .await;
            debug!("[{}] queued approval {}", trace_id, entry.id);
            result.pending_approval = true;
            return result;
        }

        let result = execute::execute_decision(
            &decision,
            &self.services,
            &self.config,
            &self.live_cooldowns,
            &self.dry_cooldowns,
            trace_id,
        )
        .await;
        if let Some(metrics) = &self.metrics {
            metrics
                .decisions_total
                .with_label_values(&[decision.kind.as_str(), decision.tier.as_str()])
                .inc();
        }
        result
    }

    /// Admin approval: take the queued decision, override the tier to
    /// `Auto`, dispatch once.
    pub async fn execute_approved(&self, id: &str) -> Result<DecisionResult, ApprovalError> {
        let entry = self.approvals.take(id)?;
        if let Some(metrics) = &self.metrics {
            metrics.pending_approvals.set(self.approvals.len() as f64);
        }

        let mut decision = entry.decision;
        decision.tier = Tier::Auto;
        info!("approval {} granted, executing {}", id, decision.kind);

        Ok(execute::execute_decision(
            &decision,
            &self.services,
            &self.config,
            &self.live_cooldowns,
            &self.dry_cooldowns,
            &format!("approval-{}", id),
        )
        .await)
    }

    /// Drop expired approvals; called by the CFO sweeper interval.
    pub fn sweep_approvals(&self) {
        let dropped = self.approvals.sweep(Utc::now());
        if dropped > 0 {
            info!("{} approvals expired unexecuted", dropped);
            if let Some(metrics) = &self.metrics {
                metrics.pending_approvals.set(self.approvals.len() as f64);
            }
        }
    }

    /// Manual admin action, dispatched through the same executor so
    /// dry-run and cooldown semantics hold.
    pub async fn execute_manual(&self, decision: Decision) -> DecisionResult {
        execute::execute_decision(
            &decision,
            &self.services,
            &self.config,
            &self.live_cooldowns,
            &self.dry_cooldowns,
            "manual",
        )
        .await
    }

    pub fn services(&self) -> &EngineServices {
        &self.services
    }

    async fn fetch_opportunities(
        &self,
        portfolio: &PortfolioState,
        intel: &SwarmIntel,
    ) -> OpportunityData {
        let mut data = OpportunityData::default();

        if self.config.enable_polymarket
            && let Some(prediction) = &self.services.prediction
        {
            let scout = ScoutContext {
                narratives: intel.narratives.clone(),
                trending_symbols: intel
                    .token_prices
                    .values()
                    .filter(|t| t.trending)
                    .map(|t| t.symbol.clone())
                    .collect(),
            };
            match prediction
                .scan_opportunities(portfolio.usdc_balance, &scout)
                .await
            {
                Ok(opportunities) => data.prediction_opportunities = opportunities,
                Err(e) => debug!("opportunity scan failed: {}", e),
            }
        }

        if self.config.enable_lending
            && let Some(lending) = &self.services.lending
        {
            match lending.get_apys().await {
                Ok(apys) => data.lending_apys = Some(apys),
                Err(e) => debug!("APY fetch failed: {}", e),
            }
            match lending.get_lst_assets().await {
                Ok(assets) => data.lst_assets = assets,
                Err(e) => debug!("LST asset fetch failed: {}", e),
            }
        }

        if self.config.enable_lp {
            for venue in &self.services.lp_venues {
                match venue.discover_pools().await {
                    Ok(mut pools) => data.pool_candidates.append(&mut pools),
                    Err(e) => debug!("{} discovery failed: {}", venue.venue_name(), e),
                }
            }
        }

        if self.config.enable_flash_arb
            && let Some(bridge) = &self.services.bridge
        {
            match bridge.scan_for_opportunity().await {
                Ok(opportunity) => data.arb_opportunity = opportunity,
                Err(e) => debug!("arb scan failed: {}", e),
            }
        }

        data
    }

    fn publish_metrics(&self, portfolio: &PortfolioState, intel: &SwarmIntel) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        metrics.portfolio_value_usd.set(portfolio.total_portfolio_usd);
        metrics.hedge_ratio.set(portfolio.hedge_ratio);
        metrics.risk_multiplier.set(intel.risk_multiplier);
        metrics.pending_approvals.set(self.approvals.len() as f64);
    }

    /// Summarised cycle record in the KV audit trail; reclaimed with the
    /// audit window.
    async fn write_audit_row(
        &self,
        trace_id: &str,
        portfolio: &PortfolioState,
        intel: &SwarmIntel,
        results: &[DecisionResult],
    ) {
        let row = serde_json::json!({
            "trace_id": trace_id,
            "at": Utc::now().to_rfc3339(),
            "total_portfolio_usd": portfolio.total_portfolio_usd,
            "hedge_ratio": portfolio.hedge_ratio,
            "risk_multiplier": intel.risk_multiplier,
            "market_condition": intel.condition(),
            "decisions": results.iter().map(|r| serde_json::json!({
                "kind": r.decision.kind,
                "tier": r.decision.tier,
                "executed": r.executed,
                "success": r.success,
                "dry_run": r.dry_run,
                "pending_approval": r.pending_approval,
            })).collect::<Vec<_>>(),
        });
        if let Err(e) = self
            .kv
            .put(&format!("audit:cycle:{}", trace_id), &row)
            .await
        {
            warn!("[{}] audit row write failed: {}", trace_id, e);
        }
    }
}
