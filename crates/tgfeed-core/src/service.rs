use std::{sync::Arc, time::Duration};

use tracing::debug;

use crate::{
    config::ScanConfig,
    domain::{Message, MessageId},
    ports::ChannelClient,
    scan::{CacheSnapshot, ScanCache},
    Error, Result,
};

/// Entry point for the two feed operations.
///
/// Owns the shared channel client and the per-channel scan cache. The HTTP
/// layer (through the scan worker) only ever calls `fetch_all_messages` and
/// `fetch_message_by_id`.
pub struct FeedService {
    client: Arc<dyn ChannelClient>,
    cache: ScanCache,
}

impl FeedService {
    pub fn new(client: Arc<dyn ChannelClient>, scan: ScanConfig, ttl: Duration) -> Self {
        Self {
            client,
            cache: ScanCache::new(scan, ttl),
        }
    }

    /// Every cached message for `channel`, after extending the scan.
    pub async fn fetch_all_messages(&self, channel: &str) -> Result<Vec<Message>> {
        let channel = validate_channel(channel)?;
        self.cache.extend(self.client.as_ref(), channel).await
    }

    /// Live single-message lookup; never reads or writes the cache.
    pub async fn fetch_message_by_id(&self, channel: &str, id: MessageId) -> Result<Message> {
        let channel = validate_channel(channel)?;
        let handle = self.client.resolve_channel(channel).await?;
        debug!(channel, %id, "direct lookup");
        self.client
            .fetch_message_by_id(&handle, id)
            .await?
            .filter(Message::has_body)
            .ok_or_else(|| Error::NotFound(format!("message {id} in {channel}")))
    }

    pub async fn purge_expired(&self) -> usize {
        self.cache.purge_expired().await
    }

    pub async fn snapshot(&self, channel: &str) -> Option<CacheSnapshot> {
        self.cache.snapshot(channel).await
    }
}

/// Trimmed channel name, or `InvalidInput` when nothing is left.
pub fn validate_channel(raw: &str) -> Result<&str> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput(
            "Channel username cannot be empty".to_string(),
        ));
    }
    Ok(name)
}

pub fn parse_message_id(raw: &str) -> Result<MessageId> {
    raw.trim()
        .parse::<u64>()
        .map(MessageId)
        .map_err(|_| Error::InvalidInput("Invalid message ID".to_string()))
}
