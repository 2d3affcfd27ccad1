//! Token child: per-mint monitor spawned by the supervisor.

use crate::application::runtime::{AgentContext, WorkerAgent};
use crate::domain::message::{Message, MessagePriority, MessageType};
use crate::domain::ports::MarketDataSource;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct TokenChildConfig {
    pub mint: String,
    pub symbol: String,
    pub report_interval: Duration,
}

pub struct TokenChildAgent {
    ctx: Arc<AgentContext>,
    market: Option<Arc<dyn MarketDataSource>>,
    config: TokenChildConfig,
}

impl TokenChildAgent {
    pub fn new(
        ctx: Arc<AgentContext>,
        market: Option<Arc<dyn MarketDataSource>>,
        config: TokenChildConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            market,
            config,
        })
    }

    pub fn mint(&self) -> &str {
        &self.config.mint
    }

    async fn report(
        ctx: &Arc<AgentContext>,
        market: &Option<Arc<dyn MarketDataSource>>,
        mint: &str,
        symbol: &str,
    ) {
        let price = match market {
            Some(market) => match market.get_price(symbol).await {
                Ok(price) => Some(price),
                Err(e) => {
                    debug!("{}: price fetch failed: {}", ctx.name(), e);
                    None
                }
            },
            None => None,
        };

        ctx.report_to_supervisor(
            MessageType::Status,
            MessagePriority::Low,
            serde_json::json!({
                "mint": mint,
                "symbol": symbol,
                "price_usd": price,
            }),
        )
        .await;
    }
}

#[async_trait]
impl WorkerAgent for TokenChildAgent {
    fn context(&self) -> &Arc<AgentContext> {
        &self.ctx
    }

    async fn on_start(&self) -> Result<()> {
        let ctx = Arc::clone(&self.ctx);
        let market = self.market.clone();
        let mint = self.config.mint.clone();
        let symbol = self.config.symbol.clone();
        self.ctx
            .add_interval(self.config.report_interval, "token-report", move || {
                let ctx = Arc::clone(&ctx);
                let market = market.clone();
                let mint = mint.clone();
                let symbol = symbol.clone();
                async move {
                    TokenChildAgent::report(&ctx, &market, &mint, &symbol).await;
                }
            })
            .await;
        Ok(())
    }

    async fn handle_message(&self, message: &Message) -> Result<()> {
        debug!(
            "{}: ignoring {} from {}",
            self.ctx.name(),
            message.kind,
            message.from
        );
        Ok(())
    }
}
