//! In-memory `ChannelClient` used by the unit tests of this crate.

use std::{
    collections::{BTreeMap, HashSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    domain::{ChannelHandle, Message, MessageId},
    ports::ChannelClient,
    Error, Result,
};

#[derive(Clone, Debug)]
enum Slot {
    Post(String, i64),
    Fail,
    Auth,
}

#[derive(Default)]
pub struct FakeChannelClient {
    channels: Mutex<HashSet<String>>,
    slots: Mutex<BTreeMap<(String, u64), Slot>>,
    calls: Mutex<Vec<(String, u64)>>,
    resolves: Mutex<usize>,
    disconnected: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl FakeChannelClient {
    pub fn with_channel(name: &str) -> Self {
        let fake = Self::default();
        fake.add_channel(name);
        fake
    }

    pub fn add_channel(&self, name: &str) {
        self.channels.lock().unwrap().insert(name.to_string());
    }

    /// Post `text` at `id`; the date is derived from the id so ordering is stable.
    pub fn post(&self, channel: &str, id: u64, text: &str) {
        self.post_at(channel, id, text, 1_700_000_000 + id as i64 * 60);
    }

    pub fn post_at(&self, channel: &str, id: u64, text: &str, date: i64) {
        self.slots
            .lock()
            .unwrap()
            .insert((channel.to_string(), id), Slot::Post(text.to_string(), date));
    }

    pub fn fail(&self, channel: &str, id: u64) {
        self.slots
            .lock()
            .unwrap()
            .insert((channel.to_string(), id), Slot::Fail);
    }

    pub fn auth_fail(&self, channel: &str, id: u64) {
        self.slots
            .lock()
            .unwrap()
            .insert((channel.to_string(), id), Slot::Auth);
    }

    /// Sleep this long in every message lookup.
    pub fn slow(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    pub fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }

    /// Ids probed for `channel`, in call order.
    pub fn probed(&self, channel: &str) -> Vec<u64> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, id)| *id)
            .collect()
    }

    pub fn resolve_calls(&self) -> usize {
        *self.resolves.lock().unwrap()
    }
}

#[async_trait]
impl ChannelClient for FakeChannelClient {
    async fn resolve_channel(&self, name: &str) -> Result<ChannelHandle> {
        *self.resolves.lock().unwrap() += 1;
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(Error::Auth("fake session closed".to_string()));
        }
        if !self.channels.lock().unwrap().contains(name) {
            return Err(Error::NotFound(format!("channel {name}")));
        }
        Ok(ChannelHandle {
            chat_id: -100,
            username: name.to_string(),
            title: None,
        })
    }

    async fn fetch_message_by_id(
        &self,
        channel: &ChannelHandle,
        id: MessageId,
    ) -> Result<Option<Message>> {
        let latency = *self.latency.lock().unwrap();
        match latency {
            Some(d) => tokio::time::sleep(d).await,
            // Give concurrent callers a chance to interleave.
            None => tokio::task::yield_now().await,
        }

        self.calls
            .lock()
            .unwrap()
            .push((channel.username.clone(), id.0));

        let slot = self
            .slots
            .lock()
            .unwrap()
            .get(&(channel.username.clone(), id.0))
            .cloned();

        match slot {
            None => Ok(None),
            Some(Slot::Post(text, date)) => Ok(Some(Message {
                id,
                text,
                date,
                link: None,
            })),
            Some(Slot::Fail) => Err(Error::Transient(format!("flaky lookup for {id}"))),
            Some(Slot::Auth) => Err(Error::Auth("session dropped".to_string())),
        }
    }
}
