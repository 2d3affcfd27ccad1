//! Outbound publication gate.
//!
//! Every publish runs the content filter first: a critical threat blocks
//! the post, non-critical threats log and pass. No filter configured means
//! fail-open. Absent sinks are skipped, not errors.

use crate::domain::fingerprint::truncate_at_word_boundary;
use crate::domain::ports::{ContentFilter, PublicationSink};
use std::sync::Arc;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    X,
    Channel,
    Admin,
    Farcaster,
}

impl Destination {
    fn as_str(&self) -> &'static str {
        match self {
            Destination::X => "x",
            Destination::Channel => "channel",
            Destination::Admin => "admin",
            Destination::Farcaster => "farcaster",
        }
    }
}

pub struct OutboundGate {
    sink: Option<Arc<dyn PublicationSink>>,
    filter: Option<Arc<dyn ContentFilter>>,
    farcaster_channel: String,
    x_char_limit: usize,
}

impl OutboundGate {
    pub fn new(
        sink: Option<Arc<dyn PublicationSink>>,
        filter: Option<Arc<dyn ContentFilter>>,
        farcaster_channel: &str,
        x_char_limit: usize,
    ) -> Self {
        Self {
            sink,
            filter,
            farcaster_channel: farcaster_channel.to_string(),
            x_char_limit,
        }
    }

    /// Run the filter. Returns false when the content must not go out.
    fn passes_filter(&self, content: &str, destination: Destination) -> bool {
        let Some(filter) = &self.filter else {
            return true; // fail-open
        };
        let verdict = filter.scan_outbound(content, destination.as_str());
        if verdict.has_critical() {
            error!(
                "outbound to {} blocked by content filter: {:?}",
                destination.as_str(),
                verdict
                    .threats
                    .iter()
                    .map(|t| t.description.as_str())
                    .collect::<Vec<_>>()
            );
            return false;
        }
        for threat in &verdict.threats {
            warn!(
                "outbound to {} flagged (non-blocking): {}",
                destination.as_str(),
                threat.description
            );
        }
        true
    }

    /// Publish to one destination. Returns true when the post went out.
    pub async fn publish(&self, destination: Destination, content: &str) -> bool {
        if !self.passes_filter(content, destination) {
            return false;
        }
        let Some(sink) = &self.sink else {
            debug!("no sink configured, dropping post to {}", destination.as_str());
            return false;
        };

        let result = match destination {
            Destination::X => {
                let clipped = truncate_at_word_boundary(content, self.x_char_limit);
                sink.post_to_x(&clipped).await
            }
            Destination::Channel => sink.post_to_channel(content).await,
            Destination::Admin => sink.post_to_admin(content).await,
            Destination::Farcaster => {
                sink.post_to_farcaster(content, &self.farcaster_channel).await
            }
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("post to {} failed: {}", destination.as_str(), e);
                false
            }
        }
    }

    /// Fan a narrative out to all public sinks. Returns true when at least
    /// the X post went out.
    pub async fn publish_narrative(&self, content: &str) -> bool {
        let posted = self.publish(Destination::X, content).await;
        self.publish(Destination::Channel, content).await;
        self.publish(Destination::Farcaster, content).await;
        posted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mock::{KeywordContentFilter, RecordingSink};

    #[tokio::test]
    async fn test_critical_threat_blocks_publish() {
        let sink = Arc::new(RecordingSink::new());
        let filter = Arc::new(KeywordContentFilter::new(&["sk-secret"], &[]));
        let gate = OutboundGate::new(Some(sink.clone()), Some(filter), "solana", 280);

        let posted = gate
            .publish(Destination::X, "leaked key sk-secret do not post")
            .await;
        assert!(!posted);
        assert!(sink.posts().await.is_empty());
    }

    #[tokio::test]
    async fn test_warning_threat_passes() {
        let sink = Arc::new(RecordingSink::new());
        let filter = Arc::new(KeywordContentFilter::new(&[], &["hype"]));
        let gate = OutboundGate::new(Some(sink.clone()), Some(filter), "solana", 280);

        let posted = gate.publish(Destination::Channel, "pure hype update").await;
        assert!(posted);
        assert_eq!(sink.posts_to("channel").await.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_filter_is_fail_open() {
        let sink = Arc::new(RecordingSink::new());
        let gate = OutboundGate::new(Some(sink.clone()), None, "solana", 280);
        assert!(gate.publish(Destination::Admin, "hello").await);
    }

    #[tokio::test]
    async fn test_x_posts_truncated_at_limit() {
        let sink = Arc::new(RecordingSink::new());
        let gate = OutboundGate::new(Some(sink.clone()), None, "solana", 280);
        let long = "word ".repeat(120);
        gate.publish(Destination::X, &long).await;
        let posts = sink.posts_to("x").await;
        assert_eq!(posts.len(), 1);
        assert!(posts[0].chars().count() <= 280);
    }
}
