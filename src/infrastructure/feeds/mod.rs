pub mod rss_feed;
pub mod sentiment;

pub use rss_feed::RssNarrativeSource;
pub use sentiment::{SENTIMENT_THRESHOLD, SentimentScorer};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One narrative item pulled from a feed.
#[derive(Debug, Clone)]
pub struct FeedItem {
    pub id: String,
    pub title: String,
    pub body: String,
    pub url: Option<String>,
    pub published_at: DateTime<Utc>,
}

/// Source of narrative items for the scout. Each call returns only items
/// not returned before.
#[async_trait]
pub trait NarrativeFeed: Send + Sync {
    async fn fetch_new(&self) -> Result<Vec<FeedItem>>;
}
