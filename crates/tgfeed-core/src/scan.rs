//! Incremental scan cache.
//!
//! Telegram only supports point lookups by message id, so new posts are found
//! by probing ids forward from the last evaluated one (the frontier). Each
//! channel keeps its own entry behind its own lock:
//! - the frontier only moves forward until the entry expires
//! - stored messages are strictly ascending by id and never empty
//! - a scan stops after `empty_run_limit` consecutive empty ids or at `max_id`
//!
//! Expiry drops the whole entry, frontier included, so the next request
//! rescans the channel from id 1.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    config::ScanConfig,
    domain::{ChannelHandle, Message, MessageId},
    ports::ChannelClient,
    Result,
};

/// Cached state for one channel.
#[derive(Debug)]
pub struct ChannelCacheEntry {
    messages: Vec<Message>,
    last_processed_id: MessageId,
    created_at: Instant,
    refreshed_at: Instant,
    ttl: Duration,
}

impl ChannelCacheEntry {
    fn new(ttl: Duration, now: Instant) -> Self {
        Self {
            messages: Vec::new(),
            last_processed_id: MessageId(0),
            created_at: now,
            refreshed_at: now,
            ttl,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_processed_id(&self) -> MessageId {
        self.last_processed_id
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.refreshed_at) >= self.ttl
    }

    /// Strictly ascending, non-empty messages, none beyond the frontier.
    fn is_consistent(&self) -> bool {
        let ascending = self.messages.windows(2).all(|w| w[0].id < w[1].id);
        let bodies = self.messages.iter().all(Message::has_body);
        let bounded = self
            .messages
            .last()
            .map(|m| m.id <= self.last_processed_id)
            .unwrap_or(true);
        ascending && bodies && bounded
    }

    /// Mark `id` as evaluated, storing `found` when it carries a body.
    fn record(&mut self, id: MessageId, found: Option<Message>) -> bool {
        if id <= self.last_processed_id {
            return false;
        }
        self.last_processed_id = id;
        match found {
            Some(m) if m.has_body() => {
                self.messages.push(Message { id, ..m });
                true
            }
            _ => false,
        }
    }
}

/// Why a forward scan ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanStop {
    EmptyRun,
    MaxId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanOutcome {
    pub started_after: MessageId,
    pub last_processed_id: MessageId,
    pub found: usize,
    pub stop: ScanStop,
}

/// Point-in-time copy of a channel entry.
#[derive(Clone, Debug)]
pub struct CacheSnapshot {
    pub messages: Vec<Message>,
    pub last_processed_id: MessageId,
    pub age: Duration,
}

type Slot = Arc<Mutex<ChannelCacheEntry>>;

/// Per-channel message cache driving the forward scan.
pub struct ScanCache {
    cfg: ScanConfig,
    ttl: Duration,
    entries: Mutex<HashMap<String, Slot>>,
}

impl ScanCache {
    pub fn new(cfg: ScanConfig, ttl: Duration) -> Self {
        Self {
            cfg,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    async fn slot(&self, channel: &str) -> Slot {
        let mut map = self.entries.lock().await;
        map.entry(channel.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(ChannelCacheEntry::new(
                    self.ttl,
                    Instant::now(),
                )))
            })
            .clone()
    }

    /// Extend the cached scan for `channel` and return every message seen so far.
    ///
    /// Channel resolution errors propagate untouched and leave the cache alone.
    /// Concurrent calls for the same channel run one after another.
    pub async fn extend(
        &self,
        client: &dyn ChannelClient,
        channel: &str,
    ) -> Result<Vec<Message>> {
        let handle = client.resolve_channel(channel).await?;

        let slot = self.slot(channel).await;
        let mut entry = slot.lock().await;

        let now = Instant::now();
        if entry.is_expired_at(now) && entry.last_processed_id > MessageId(0) {
            info!(channel, "cache entry expired, rescanning from the start");
            *entry = ChannelCacheEntry::new(self.ttl, now);
        } else if !entry.is_consistent() {
            warn!(channel, "cache entry failed its invariants, rebuilding");
            *entry = ChannelCacheEntry::new(self.ttl, now);
        }

        let outcome = scan_forward(client, &handle, &mut entry, self.cfg).await;
        entry.refreshed_at = Instant::now();

        let outcome = outcome?;
        info!(
            channel,
            from = %outcome.started_after,
            frontier = %outcome.last_processed_id,
            found = outcome.found,
            stop = ?outcome.stop,
            total = entry.messages.len(),
            "scan finished"
        );

        Ok(entry.messages.clone())
    }

    pub async fn snapshot(&self, channel: &str) -> Option<CacheSnapshot> {
        let slot = self.entries.lock().await.get(channel).cloned()?;
        let entry = slot.lock().await;
        Some(CacheSnapshot {
            messages: entry.messages.clone(),
            last_processed_id: entry.last_processed_id,
            age: entry.created_at.elapsed(),
        })
    }

    /// Drop expired entries nobody is using. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now()).await
    }

    async fn purge_expired_at(&self, now: Instant) -> usize {
        let mut map = self.entries.lock().await;
        let before = map.len();
        // Slots are only cloned under the map lock, so a count of one means no
        // request holds or waits on this entry.
        map.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(entry) => !entry.is_expired_at(now),
                Err(_) => true,
            }
        });
        let removed = before - map.len();
        if removed > 0 {
            debug!(removed, remaining = map.len(), "purged expired cache entries");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Probe ids after the entry's frontier until the stop policy triggers.
///
/// Transient lookup failures count as empty ids and are never retried. Any
/// other error aborts the scan before the failing id, keeping earlier progress.
async fn scan_forward(
    client: &dyn ChannelClient,
    handle: &ChannelHandle,
    entry: &mut ChannelCacheEntry,
    cfg: ScanConfig,
) -> Result<ScanOutcome> {
    let started_after = entry.last_processed_id;
    let mut found = 0usize;
    let mut empty_run = 0u32;
    let mut cursor = started_after.next();

    let stop = loop {
        let Some(id) = cursor.filter(|id| id.0 <= cfg.max_id) else {
            break ScanStop::MaxId;
        };

        let lookup = match client.fetch_message_by_id(handle, id).await {
            Ok(m) => m,
            Err(e) if e.is_transient() => {
                warn!(channel = %handle.username, %id, "lookup failed, skipping: {e}");
                None
            }
            Err(e) => return Err(e),
        };

        if entry.record(id, lookup) {
            found += 1;
            empty_run = 0;
        } else {
            empty_run += 1;
            if empty_run >= cfg.empty_run_limit {
                break ScanStop::EmptyRun;
            }
        }

        cursor = id.next();
    };

    Ok(ScanOutcome {
        started_after,
        last_processed_id: entry.last_processed_id,
        found,
        stop,
    })
}
