//! Analyst: periodic market digests.
//!
//! Produces three intel streams: price alerts on outsized 24h moves, a token
//! table for the decision engine, and a DeFi snapshot summary for the
//! supervisor digest. A move past the spike threshold also raises the
//! volume-spike flag.

use crate::application::runtime::{AgentContext, CFO, WorkerAgent};
use crate::domain::message::{Message, MessagePriority, MessageType};
use crate::domain::ports::MarketDataSource;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// 24h move (pct) that produces a price alert.
const PRICE_ALERT_PCT: f64 = 10.0;

/// 24h move (pct) flagged as a volume spike.
const SPIKE_PCT: f64 = 20.0;

pub struct AnalystAgent {
    ctx: Arc<AgentContext>,
    market: Option<Arc<dyn MarketDataSource>>,
    tracked: Arc<RwLock<Vec<String>>>,
    sweep_interval: Duration,
}

impl AnalystAgent {
    pub fn new(
        ctx: Arc<AgentContext>,
        market: Option<Arc<dyn MarketDataSource>>,
        tracked: Vec<String>,
        sweep_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            market,
            tracked: Arc::new(RwLock::new(tracked)),
            sweep_interval,
        })
    }

    async fn sweep(
        ctx: &Arc<AgentContext>,
        market: &Arc<dyn MarketDataSource>,
        tracked: &Arc<RwLock<Vec<String>>>,
    ) {
        ctx.set_task(Some("analyzing")).await;

        let symbols = tracked.read().await.clone();
        let quotes = match market.get_prices(&symbols).await {
            Ok(quotes) => quotes,
            Err(e) => {
                debug!("nova-analyst: price fetch failed: {}", e);
                ctx.set_task(None).await;
                return;
            }
        };

        let mut table = Vec::new();
        let mut spike_symbol: Option<(String, f64)> = None;

        for (symbol, quote) in &quotes {
            table.push(serde_json::json!({
                "symbol": symbol,
                "price_usd": quote.usd,
                "change_24h_pct": quote.change_24h_pct,
                "trending": quote.change_24h_pct.abs() >= PRICE_ALERT_PCT,
            }));

            if quote.change_24h_pct.abs() >= PRICE_ALERT_PCT {
                ctx.report_to_supervisor(
                    MessageType::Intel,
                    MessagePriority::High,
                    serde_json::json!({
                        "intel_type": "price_alert",
                        "symbol": symbol,
                        "price_usd": quote.usd,
                        "change_24h_pct": quote.change_24h_pct,
                    }),
                )
                .await;
            }

            if quote.change_24h_pct.abs() >= SPIKE_PCT {
                let magnitude = quote.change_24h_pct.abs();
                if spike_symbol
                    .as_ref()
                    .map(|(_, prev)| magnitude > *prev)
                    .unwrap_or(true)
                {
                    spike_symbol = Some((symbol.clone(), magnitude));
                }
            }
        }

        // The supervisor forwards spikes to the decision engine; the token
        // table below goes to the engine directly.
        if let Some((symbol, magnitude)) = &spike_symbol {
            info!("nova-analyst: volume spike on {} ({:.1}%)", symbol, magnitude);
            ctx.report_to_supervisor(
                MessageType::Intel,
                MessagePriority::High,
                serde_json::json!({
                    "intel_type": "volume_spike",
                    "symbol": symbol,
                    "multiple": magnitude / PRICE_ALERT_PCT,
                    "window_minutes": 1440,
                }),
            )
            .await;
        }

        // Token table + snapshot for the decision engine and the digest.
        ctx.send_message(
            CFO,
            MessageType::Intel,
            MessagePriority::Medium,
            serde_json::json!({
                "intel_type": "token_prices",
                "tokens": table,
            }),
            Some(chrono::Duration::hours(4)),
        )
        .await;

        let movers = quotes
            .iter()
            .filter(|(_, q)| q.change_24h_pct.abs() >= PRICE_ALERT_PCT)
            .count();
        ctx.report_to_supervisor(
            MessageType::Report,
            MessagePriority::Low,
            serde_json::json!({
                "intel_type": "defi_snapshot",
                "summary": format!("{} tracked tokens, {} outsized movers", quotes.len(), movers),
            }),
        )
        .await;

        ctx.set_task(None).await;
    }
}

#[async_trait]
impl WorkerAgent for AnalystAgent {
    fn context(&self) -> &Arc<AgentContext> {
        &self.ctx
    }

    async fn on_start(&self) -> Result<()> {
        let Some(market) = self.market.clone() else {
            info!("nova-analyst: no market data source, sweep disabled");
            return Ok(());
        };

        let ctx = Arc::clone(&self.ctx);
        let tracked = Arc::clone(&self.tracked);
        self.ctx
            .add_interval(self.sweep_interval, "market-sweep", move || {
                let ctx = Arc::clone(&ctx);
                let market = Arc::clone(&market);
                let tracked = Arc::clone(&tracked);
                async move {
                    AnalystAgent::sweep(&ctx, &market, &tracked).await;
                }
            })
            .await;
        Ok(())
    }

    async fn handle_message(&self, message: &Message) -> Result<()> {
        if message.kind == MessageType::Command
            && message.payload.get("command").and_then(|c| c.as_str()) == Some("track_symbol")
            && let Some(symbol) = message.payload.get("symbol").and_then(|s| s.as_str())
        {
            info!("nova-analyst: tracking {}", symbol);
            self.tracked.write().await.push(symbol.to_string());
        }
        Ok(())
    }
}
