use crate::infrastructure::core::http_client_factory::HttpClientFactory;
use crate::infrastructure::feeds::NarrativeFeed;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest_middleware::ClientWithMiddleware;
use rss::Channel;
use std::collections::HashSet;
use std::io::Cursor;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::FeedItem;

/// RSS narrative source for the scout.
///
/// The scout polls on its own interval; each `fetch_new` call returns only
/// items not seen before. The first fetch marks the backlog as seen so a
/// restart does not flood the supervisor with stale narratives.
pub struct RssNarrativeSource {
    url: String,
    client: ClientWithMiddleware,
    seen_guids: Arc<Mutex<HashSet<String>>>,
    primed: Arc<Mutex<bool>>,
}

impl RssNarrativeSource {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: HttpClientFactory::create_client(),
            seen_guids: Arc::new(Mutex::new(HashSet::new())),
            primed: Arc::new(Mutex::new(false)),
        }
    }

    async fn fetch_channel(&self) -> Result<Channel> {
        let response = self.client.get(&self.url).send().await?;
        let bytes = response.bytes().await?;
        Channel::read_from(Cursor::new(bytes)).map_err(|e| anyhow::anyhow!(e))
    }
}

#[async_trait]
impl NarrativeFeed for RssNarrativeSource {
    async fn fetch_new(&self) -> Result<Vec<FeedItem>> {
        let channel = self.fetch_channel().await?;

        let mut primed = self.primed.lock().await;
        let mut guids = self.seen_guids.lock().await;

        if !*primed {
            for item in channel.items() {
                if let Some(guid) = item.guid() {
                    guids.insert(guid.value.to_string());
                } else if let Some(link) = item.link() {
                    guids.insert(link.to_string());
                }
            }
            *primed = true;
            info!(
                "RssNarrativeSource: primed, marked {} items as seen",
                guids.len()
            );
            return Ok(Vec::new());
        }

        let mut fresh = Vec::new();
        for item in channel.items() {
            let guid = item
                .guid()
                .map(|g| g.value.to_string())
                .or_else(|| item.link().map(|l| l.to_string()))
                .unwrap_or_else(|| Uuid::new_v4().to_string());

            if guids.contains(&guid) {
                continue;
            }
            guids.insert(guid.clone());

            let published_at = item
                .pub_date()
                .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);

            fresh.push(FeedItem {
                id: guid,
                title: item.title().unwrap_or("No Title").to_string(),
                body: item.description().unwrap_or("").to_string(),
                url: item.link().map(|l| l.to_string()),
                published_at,
            });
        }

        debug!("RssNarrativeSource: {} new items", fresh.len());
        Ok(fresh)
    }
}
