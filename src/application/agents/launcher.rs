//! Launcher: token lifecycle events.
//!
//! Launch commands arrive from the admin; the launcher announces them and
//! then watches the market until the token clears its graduation price, at
//! which point it emits `graduated` so the supervisor spins up a child
//! monitor.

use crate::application::runtime::{AgentContext, WorkerAgent};
use crate::domain::message::{Message, MessagePriority, MessageType};
use crate::domain::ports::MarketDataSource;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingLaunch {
    pub mint: String,
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    pub graduation_price_usd: f64,
}

pub struct LauncherAgent {
    ctx: Arc<AgentContext>,
    market: Option<Arc<dyn MarketDataSource>>,
    pending: Arc<RwLock<Vec<PendingLaunch>>>,
    check_interval: Duration,
}

impl LauncherAgent {
    pub fn new(
        ctx: Arc<AgentContext>,
        market: Option<Arc<dyn MarketDataSource>>,
        check_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            market,
            pending: Arc::new(RwLock::new(Vec::new())),
            check_interval,
        })
    }

    async fn check_graduations(
        ctx: &Arc<AgentContext>,
        market: &Arc<dyn MarketDataSource>,
        pending: &Arc<RwLock<Vec<PendingLaunch>>>,
    ) {
        let launches = pending.read().await.clone();
        if launches.is_empty() {
            return;
        }

        let mut graduated = Vec::new();
        for launch in &launches {
            match market.get_price(&launch.symbol).await {
                Ok(price) if price >= launch.graduation_price_usd => {
                    info!(
                        "nova-launcher: {} graduated at ${:.4}",
                        launch.symbol, price
                    );
                    ctx.report_to_supervisor(
                        MessageType::Report,
                        MessagePriority::High,
                        serde_json::json!({
                            "event": "graduated",
                            "mint": launch.mint,
                            "symbol": launch.symbol,
                            "name": launch.name,
                            "price_usd": price,
                        }),
                    )
                    .await;
                    graduated.push(launch.mint.clone());
                }
                Ok(_) => {}
                Err(e) => debug!("nova-launcher: price check for {} failed: {}", launch.symbol, e),
            }
        }

        if !graduated.is_empty() {
            pending
                .write()
                .await
                .retain(|l| !graduated.contains(&l.mint));
        }
    }
}

#[async_trait]
impl WorkerAgent for LauncherAgent {
    fn context(&self) -> &Arc<AgentContext> {
        &self.ctx
    }

    async fn on_start(&self) -> Result<()> {
        let Some(market) = self.market.clone() else {
            info!("nova-launcher: no market data source, graduation checks disabled");
            return Ok(());
        };

        let ctx = Arc::clone(&self.ctx);
        let pending = Arc::clone(&self.pending);
        self.ctx
            .add_interval(self.check_interval, "graduation-check", move || {
                let ctx = Arc::clone(&ctx);
                let market = Arc::clone(&market);
                let pending = Arc::clone(&pending);
                async move {
                    LauncherAgent::check_graduations(&ctx, &market, &pending).await;
                }
            })
            .await;
        Ok(())
    }

    async fn handle_message(&self, message: &Message) -> Result<()> {
        if message.kind != MessageType::Command {
            return Ok(());
        }
        if message.payload.get("command").and_then(|c| c.as_str()) != Some("launch_token") {
            return Ok(());
        }

        let launch: PendingLaunch = serde_json::from_value(message.payload.clone())?;
        info!("nova-launcher: launched {} ({})", launch.symbol, launch.mint);

        self.ctx
            .report_to_supervisor(
                MessageType::Report,
                MessagePriority::High,
                serde_json::json!({
                    "event": "launched",
                    "mint": launch.mint,
                    "symbol": launch.symbol,
                    "name": launch.name,
                }),
            )
            .await;

        self.pending.write().await.push(launch);
        Ok(())
    }
}
