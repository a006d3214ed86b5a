use std::fmt;

use serde::{Deserialize, Serialize};

/// Channel post id (numeric, assigned by Telegram, monotonic with gaps).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl MessageId {
    /// `None` once the id space is exhausted.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(MessageId)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A fetched channel post. Immutable once fetched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    /// Text body (or media caption).
    #[serde(rename = "message")]
    pub text: String,
    /// Origin timestamp, seconds since the Unix epoch.
    pub date: i64,
    #[serde(rename = "url", default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Message {
    pub fn has_body(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Session-bound handle for a resolved channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelHandle {
    pub chat_id: i64,
    pub username: String,
    pub title: Option<String>,
}
