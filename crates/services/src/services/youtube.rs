//! Cached proxy for the public YouTube channel feed.
//!
//! The frontend shows latest videos without exposing an API key: we fetch
//! `youtube.com/feeds/videos.xml` server-side and cache the XML for 10
//! minutes per channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

const FEED_URL: &str = "https://www.youtube.com/feeds/videos.xml";
const CACHE_TTL: Duration = Duration::from_secs(600);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum YoutubeError {
    #[error("invalid channel id")]
    InvalidChannelId,
    #[error("feed request failed: {0}")]
    Request(#[from] reqwest::Error),
}

struct CachedFeed {
    fetched_at: Instant,
    xml: Arc<String>,
}

#[derive(Clone)]
pub struct YoutubeCache {
    client: reqwest::Client,
    cache: Arc<RwLock<HashMap<String, CachedFeed>>>,
}

impl YoutubeCache {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Fetch a channel's feed XML, from cache when fresh.
    pub async fn feed(&self, channel_id: &str) -> Result<Arc<String>, YoutubeError> {
        if !is_valid_channel_id(channel_id) {
            return Err(YoutubeError::InvalidChannelId);
        }

        if let Some(cached) = self.cache.read().await.get(channel_id) {
            if cached.fetched_at.elapsed() < CACHE_TTL {
                debug!(channel_id, "YouTube feed served from cache");
                return Ok(Arc::clone(&cached.xml));
            }
        }

        let xml = self
            .client
            .get(FEED_URL)
            .query(&[("channel_id", channel_id)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let xml = Arc::new(xml);
        self.cache.write().await.insert(
            channel_id.to_string(),
            CachedFeed {
                fetched_at: Instant::now(),
                xml: Arc::clone(&xml),
            },
        );
        debug!(channel_id, "YouTube feed fetched");
        Ok(xml)
    }
}

impl Default for YoutubeCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Channel ids are 24 chars of base64url-ish alphabet starting with "UC".
/// We only gate on the alphabet so handles keep working if the format
/// drifts.
fn is_valid_channel_id(channel_id: &str) -> bool {
    !channel_id.is_empty()
        && channel_id.len() <= 64
        && channel_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_id_validation() {
        assert!(is_valid_channel_id("UC_x5XG1OV2P6uZZ5FSM9Ttw"));
        assert!(is_valid_channel_id("abc-123_XYZ"));
        assert!(!is_valid_channel_id(""));
        assert!(!is_valid_channel_id("has space"));
        assert!(!is_valid_channel_id("semi;colon"));
        assert!(!is_valid_channel_id(&"x".repeat(65)));
    }

    #[tokio::test]
    async fn test_invalid_channel_rejected_before_network() {
        let cache = YoutubeCache::new();
        assert!(matches!(
            cache.feed("../injection").await,
            Err(YoutubeError::InvalidChannelId)
        ));
    }
}
