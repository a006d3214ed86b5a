//! Telegram adapter (teloxide).
//!
//! Implements the `tgfeed-core` `ChannelClient` port over the Bot API. The
//! Bot API cannot read a channel post by id, so each lookup forwards the post
//! into a scratch chat, reads the copy, and deletes it again.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use teloxide::{
    prelude::*,
    types::{Recipient, User},
    ApiError, RequestError,
};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use tgfeed_core::{
    domain::{ChannelHandle, Message, MessageId},
    errors::Error,
    ports::ChannelClient,
    Result,
};

/// Shared Bot API session. Construct once, `connect()`, then share behind an `Arc`.
pub struct TelegramChannelClient {
    bot: Bot,
    scratch_chat: ChatId,
    connected: AtomicBool,
}

impl TelegramChannelClient {
    pub fn new(bot: Bot, scratch_chat_id: i64) -> Self {
        Self {
            bot,
            scratch_chat: ChatId(scratch_chat_id),
            connected: AtomicBool::new(false),
        }
    }

    pub fn from_token(token: &str, scratch_chat_id: i64) -> Self {
        Self::new(Bot::new(token), scratch_chat_id)
    }

    /// Validate the token with `getMe` and mark the session usable.
    pub async fn connect(&self) -> Result<User> {
        let me = self.with_retry(|| self.bot.get_me()).await?;
        self.connected.store(true, Ordering::SeqCst);
        info!(bot = %me.username(), "telegram session established");
        Ok(me.user)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(Error::Auth("telegram session not established".to_string()))
        }
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(RequestError::RetryAfter(wait)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    debug!(?wait, "flood wait, retrying");
                    sleep(wait).await;
                }
                Err(other) => return Err(map_err(other)),
            }
        }
    }

    async fn discard_copy(&self, copy: teloxide::types::MessageId) {
        if let Err(e) = self.bot.delete_message(self.scratch_chat, copy).await {
            warn!(error = %e, "failed to delete probe copy");
        }
    }
}

/// Translate a Bot API failure into the core taxonomy.
pub fn map_err(e: RequestError) -> Error {
    match e {
        RequestError::Api(ApiError::ChatNotFound) => Error::NotFound("chat not found".to_string()),
        // Bot API answers "Unauthorized" for a rejected token.
        RequestError::Api(ApiError::NotFound) => Error::Auth("invalid bot token".to_string()),
        RequestError::Api(ApiError::BotKicked) | RequestError::Api(ApiError::BotBlocked) => {
            Error::Auth(format!("telegram refused access: {e}"))
        }
        other => Error::Transient(format!("telegram error: {other}")),
    }
}

/// Errors that mean "no post at this id" rather than a failure.
fn is_missing_post(e: &RequestError) -> bool {
    matches!(
        e,
        RequestError::Api(ApiError::MessageToForwardNotFound)
            | RequestError::Api(ApiError::MessageIdInvalid)
    )
}

/// Text or caption of a forwarded copy, with the original post date.
fn copy_to_message(id: MessageId, copy: &teloxide::types::Message) -> Option<Message> {
    let text = copy.text().or_else(|| copy.caption())?;
    let date = copy.forward_date().unwrap_or(copy.date).timestamp();
    Some(Message {
        id,
        text: text.to_string(),
        date,
        link: None,
    })
}

#[async_trait]
impl ChannelClient for TelegramChannelClient {
    async fn resolve_channel(&self, name: &str) -> Result<ChannelHandle> {
        self.ensure_connected()?;
        let username = name.trim_start_matches('@');
        let recipient = Recipient::ChannelUsername(format!("@{username}"));
        let chat = self
            .with_retry(|| self.bot.get_chat(recipient.clone()))
            .await
            .map_err(|e| match e {
                Error::NotFound(_) => Error::NotFound(format!("channel {username}")),
                other => other,
            })?;

        Ok(ChannelHandle {
            chat_id: chat.id.0,
            username: chat.username().unwrap_or(username).to_string(),
            title: chat.title().map(str::to_string),
        })
    }

    async fn fetch_message_by_id(
        &self,
        channel: &ChannelHandle,
        id: MessageId,
    ) -> Result<Option<Message>> {
        self.ensure_connected()?;
        // Bot API ids are i32; anything larger cannot exist.
        let Ok(raw) = i32::try_from(id.0) else {
            return Ok(None);
        };

        let from = ChatId(channel.chat_id);
        let msg_id = teloxide::types::MessageId(raw);
        let mut attempts = 0usize;
        let copy = loop {
            match self
                .bot
                .forward_message(self.scratch_chat, from, msg_id)
                .disable_notification(true)
                .await
            {
                Ok(copy) => break copy,
                Err(e) if is_missing_post(&e) => return Ok(None),
                Err(RequestError::RetryAfter(wait)) if attempts < 1 => {
                    attempts += 1;
                    debug!(?wait, %id, "flood wait on probe, retrying");
                    sleep(wait).await;
                }
                Err(e) => return Err(map_err(e)),
            }
        };

        let found = copy_to_message(id, &copy);
        self.discard_copy(copy.id).await;
        Ok(found)
    }
}
