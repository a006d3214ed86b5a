use async_trait::async_trait;

use crate::{
    domain::{ChannelHandle, Message, MessageId},
    Result,
};

/// Hexagonal port for reading channel posts.
///
/// Telegram is the only implementation; the core never sees the bot library.
/// Implementations do no caching.
#[async_trait]
pub trait ChannelClient: Send + Sync {
    /// Fails with `NotFound` for unknown channels, `Auth` when the session is
    /// not established and `Transient` for network or flood-wait failures.
    async fn resolve_channel(&self, name: &str) -> Result<ChannelHandle>;

    /// `Ok(None)` when the slot has no content (deleted, never assigned,
    /// service message, media without caption). `Transient` on a failed call.
    async fn fetch_message_by_id(
        &self,
        channel: &ChannelHandle,
        id: MessageId,
    ) -> Result<Option<Message>>;
}
