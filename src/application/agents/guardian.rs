//! Guardian: safety monitor over the watchlist.
//!
//! Tracks 24h moves on watched tokens and escalates by severity. A drop past
//! the crash threshold goes out critical with a `market_crash` command so the
//! supervisor forwards it to the decision engine.

use crate::application::runtime::{AgentContext, CFO, WorkerAgent};
use crate::domain::message::{Message, MessagePriority, MessageType};
use crate::domain::ports::MarketDataSource;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// 24h drop (pct) at which an alert is raised.
const ALERT_DROP_PCT: f64 = 8.0;

/// 24h drop (pct) treated as a market crash.
const CRASH_DROP_PCT: f64 = 20.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchTarget {
    pub symbol: String,
    #[serde(default)]
    pub mint: Option<String>,
}

pub struct GuardianAgent {
    ctx: Arc<AgentContext>,
    market: Option<Arc<dyn MarketDataSource>>,
    watchlist: Arc<RwLock<Vec<WatchTarget>>>,
    sweep_interval: Duration,
}

impl GuardianAgent {
    pub fn new(
        ctx: Arc<AgentContext>,
        market: Option<Arc<dyn MarketDataSource>>,
        initial_watchlist: Vec<WatchTarget>,
        sweep_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            market,
            watchlist: Arc::new(RwLock::new(initial_watchlist)),
            sweep_interval,
        })
    }

    async fn sweep(
        ctx: &Arc<AgentContext>,
        market: &Arc<dyn MarketDataSource>,
        watchlist: &Arc<RwLock<Vec<WatchTarget>>>,
    ) {
        ctx.set_task(Some("scanning")).await;

        let symbols: Vec<String> = watchlist
            .read()
            .await
            .iter()
            .map(|t| t.symbol.clone())
            .collect();
        if symbols.is_empty() {
            ctx.set_task(None).await;
            return;
        }

        let quotes = match market.get_prices(&symbols).await {
            Ok(quotes) => quotes,
            Err(e) => {
                debug!("nova-guardian: price fetch failed: {}", e);
                ctx.set_task(None).await;
                return;
            }
        };

        let mut table = Vec::new();
        for (symbol, quote) in &quotes {
            table.push(serde_json::json!({
                "symbol": symbol,
                "price_usd": quote.usd,
                "change_24h_pct": quote.change_24h_pct,
                "trending": quote.change_24h_pct.abs() >= ALERT_DROP_PCT,
            }));

            let drop = -quote.change_24h_pct;
            if drop >= CRASH_DROP_PCT {
                warn!(
                    "nova-guardian: {} down {:.1}% in 24h, raising market crash",
                    symbol, drop
                );
                ctx.report_to_supervisor(
                    MessageType::Alert,
                    MessagePriority::Critical,
                    serde_json::json!({
                        "severity": "critical",
                        "category": "market_crash",
                        "command": "market_crash",
                        "token": symbol,
                        "description": format!("{} crashed {:.1}% in 24h", symbol, drop),
                    }),
                )
                .await;
            } else if drop >= ALERT_DROP_PCT {
                ctx.report_to_supervisor(
                    MessageType::Alert,
                    MessagePriority::High,
                    serde_json::json!({
                        "severity": "high",
                        "token": symbol,
                        "description": format!("{} down {:.1}% in 24h, crash watch", symbol, drop),
                    }),
                )
                .await;
            }
        }

        // Enriched watchlist for the decision engine.
        ctx.send_message(
            CFO,
            MessageType::Intel,
            MessagePriority::Medium,
            serde_json::json!({
                "intel_type": "watchlist_tokens",
                "tokens": table,
            }),
            Some(chrono::Duration::hours(4)),
        )
        .await;

        ctx.set_task(None).await;
    }
}

#[async_trait]
impl WorkerAgent for GuardianAgent {
    fn context(&self) -> &Arc<AgentContext> {
        &self.ctx
    }

    async fn on_start(&self) -> Result<()> {
        let Some(market) = self.market.clone() else {
            info!("nova-guardian: no market data source, sweep disabled");
            return Ok(());
        };

        let ctx = Arc::clone(&self.ctx);
        let watchlist = Arc::clone(&self.watchlist);
        self.ctx
            .add_interval(self.sweep_interval, "watch-sweep", move || {
                let ctx = Arc::clone(&ctx);
                let market = Arc::clone(&market);
                let watchlist = Arc::clone(&watchlist);
                async move {
                    GuardianAgent::sweep(&ctx, &market, &watchlist).await;
                }
            })
            .await;
        Ok(())
    }

    async fn handle_message(&self, message: &Message) -> Result<()> {
        if message.kind != MessageType::Command {
            return Ok(());
        }
        let command = message
            .payload
            .get("command")
            .and_then(|c| c.as_str())
            .unwrap_or_default();
        match command {
            "watch_token" => {
                if let Ok(target) =
                    serde_json::from_value::<WatchTarget>(message.payload.clone())
                {
                    info!("nova-guardian: watching {}", target.symbol);
                    self.watchlist.write().await.push(target);
                }
            }
            "unwatch_token" => {
                if let Some(symbol) = message.payload.get("symbol").and_then(|s| s.as_str()) {
                    self.watchlist.write().await.retain(|t| t.symbol != symbol);
                }
            }
            other => debug!("nova-guardian: unknown command '{}'", other),
        }
        Ok(())
    }
}
