//! Scout: narrative intel producer.
//!
//! Polls the configured narrative feed, scores each headline, and pushes
//! `narrative_shift` intel to the supervisor plus a sentiment summary to the
//! CFO. A missing feed disables the loop; the agent still answers bus
//! traffic.

use crate::application::runtime::{AgentContext, CFO, WorkerAgent};
use crate::domain::message::{Message, MessagePriority, MessageType};
use crate::infrastructure::feeds::{NarrativeFeed, SENTIMENT_THRESHOLD, SentimentScorer};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Rolling window of headline scores backing the bullish flag.
const SCORE_WINDOW: usize = 20;

pub struct ScoutAgent {
    ctx: Arc<AgentContext>,
    feed: Option<Arc<dyn NarrativeFeed>>,
    scorer: Arc<SentimentScorer>,
    recent_scores: Arc<Mutex<VecDeque<f64>>>,
    poll_interval: Duration,
}

impl ScoutAgent {
    pub fn new(
        ctx: Arc<AgentContext>,
        feed: Option<Arc<dyn NarrativeFeed>>,
        poll_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            feed,
            scorer: Arc::new(SentimentScorer::new()),
            recent_scores: Arc::new(Mutex::new(VecDeque::with_capacity(SCORE_WINDOW))),
            poll_interval,
        })
    }

    async fn sweep(
        ctx: &Arc<AgentContext>,
        feed: &Arc<dyn NarrativeFeed>,
        scorer: &SentimentScorer,
        recent_scores: &Mutex<VecDeque<f64>>,
    ) {
        ctx.set_task(Some("scanning")).await;

        let items = match feed.fetch_new().await {
            Ok(items) => items,
            Err(e) => {
                debug!("nova-scout: feed fetch failed: {}", e);
                ctx.set_task(None).await;
                return;
            }
        };

        for item in &items {
            let score = scorer.score_item(&item.title, &item.body);
            {
                let mut scores = recent_scores.lock().await;
                if scores.len() == SCORE_WINDOW {
                    scores.pop_front();
                }
                scores.push_back(score);
            }

            let priority = if score.abs() > SENTIMENT_THRESHOLD {
                MessagePriority::High
            } else {
                MessagePriority::Medium
            };

            ctx.report_to_supervisor(
                MessageType::Intel,
                priority,
                serde_json::json!({
                    "intel_type": "narrative_shift",
                    "summary": item.title,
                    "sentiment_score": score,
                    "url": item.url,
                }),
            )
            .await;
        }

        // Sentiment digest for the decision engine, freshest wins.
        let (bullish, mean) = {
            let scores = recent_scores.lock().await;
            if scores.is_empty() {
                (None, 0.0)
            } else {
                let mean: f64 = scores.iter().sum::<f64>() / scores.len() as f64;
                let bullish = if mean > SENTIMENT_THRESHOLD {
                    Some(true)
                } else if mean < -SENTIMENT_THRESHOLD {
                    Some(false)
                } else {
                    None
                };
                (bullish, mean)
            }
        };

        if !items.is_empty() {
            ctx.send_message(
                CFO,
                MessageType::Intel,
                MessagePriority::Medium,
                serde_json::json!({
                    "intel_type": "scout_sentiment",
                    "crypto_bullish": bullish,
                    "sentiment_score": mean,
                    "summary": items.last().map(|i| i.title.clone()).unwrap_or_default(),
                    "narratives": items.iter().map(|i| i.title.clone()).collect::<Vec<_>>(),
                }),
                Some(chrono::Duration::hours(4)),
            )
            .await;
            info!("nova-scout: {} new narratives, mean score {:.2}", items.len(), mean);
        }

        ctx.set_task(None).await;
    }
}

#[async_trait]
impl WorkerAgent for ScoutAgent {
    fn context(&self) -> &Arc<AgentContext> {
        &self.ctx
    }

    async fn on_start(&self) -> Result<()> {
        let Some(feed) = self.feed.clone() else {
            info!("nova-scout: no feed configured, narrative loop disabled");
            return Ok(());
        };

        let ctx = Arc::clone(&self.ctx);
        let scorer = Arc::clone(&self.scorer);
        let scores = Arc::clone(&self.recent_scores);
        self.ctx
            .add_interval(self.poll_interval, "feed-sweep", move || {
                let ctx = Arc::clone(&ctx);
                let feed = Arc::clone(&feed);
                let scorer = Arc::clone(&scorer);
                let scores = Arc::clone(&scores);
                async move {
                    ScoutAgent::sweep(&ctx, &feed, &scorer, &scores).await;
                }
            })
            .await;
        Ok(())
    }

    async fn handle_message(&self, message: &Message) -> Result<()> {
        debug!(
            "nova-scout: ignoring {} from {}",
            message.kind, message.from
        );
        Ok(())
    }
}
