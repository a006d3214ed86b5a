//! Scan worker: a long-lived task that owns the feed service.
//!
//! Callers talk to it through typed requests over a bounded queue and get the
//! answer back on a oneshot. Each request runs on its own task, so a caller
//! that gives up (HTTP timeout, client disconnect) does not cancel the scan it
//! started. Shutdown does: in-flight requests answer with an error right away
//! and the cache keeps whatever the scan recorded so far.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    domain::{Message, MessageId},
    service::FeedService,
    Error, Result,
};

#[derive(Debug)]
pub enum ScanRequest {
    FetchAll {
        channel: String,
        reply: oneshot::Sender<Result<Vec<Message>>>,
    },
    FetchOne {
        channel: String,
        id: MessageId,
        reply: oneshot::Sender<Result<Message>>,
    },
}

/// Cloneable sender side of the worker queue.
#[derive(Clone, Debug)]
pub struct ScanWorkerHandle {
    tx: mpsc::Sender<ScanRequest>,
}

impl ScanWorkerHandle {
    pub async fn fetch_all_messages(&self, channel: &str) -> Result<Vec<Message>> {
        let (reply, rx) = oneshot::channel();
        self.submit(ScanRequest::FetchAll {
            channel: channel.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| worker_gone())?
    }

    pub async fn fetch_message_by_id(&self, channel: &str, id: MessageId) -> Result<Message> {
        let (reply, rx) = oneshot::channel();
        self.submit(ScanRequest::FetchOne {
            channel: channel.to_string(),
            id,
            reply,
        })
        .await?;
        rx.await.map_err(|_| worker_gone())?
    }

    async fn submit(&self, req: ScanRequest) -> Result<()> {
        self.tx.send(req).await.map_err(|_| worker_gone())
    }
}

fn worker_gone() -> Error {
    Error::External("scan worker stopped".to_string())
}

pub struct ScanWorker;

impl ScanWorker {
    /// Spawn the worker loop. It exits when `shutdown` fires or every handle is dropped.
    pub fn spawn(
        service: Arc<FeedService>,
        queue_depth: usize,
        evict_every: Duration,
        shutdown: CancellationToken,
    ) -> (ScanWorkerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let evict_every = evict_every.max(Duration::from_millis(1));
        let join = tokio::spawn(run(service, rx, evict_every, shutdown));
        (ScanWorkerHandle { tx }, join)
    }
}

async fn run(
    service: Arc<FeedService>,
    mut rx: mpsc::Receiver<ScanRequest>,
    evict_every: Duration,
    shutdown: CancellationToken,
) {
    let mut evict = tokio::time::interval(evict_every);
    evict.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; nothing to evict yet.
    evict.tick().await;

    info!("scan worker started");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = evict.tick() => {
                let removed = service.purge_expired().await;
                debug!(removed, "eviction pass");
            }
            req = rx.recv() => {
                let Some(req) = req else { break };
                dispatch(service.clone(), req, shutdown.clone());
            }
        }
    }
    info!("scan worker stopped");
}

/// Run one request on its own task. A cancelled scan keeps the progress it has
/// already recorded; the caller sees the worker as stopped.
fn dispatch(service: Arc<FeedService>, req: ScanRequest, shutdown: CancellationToken) {
    tokio::spawn(async move {
        match req {
            ScanRequest::FetchAll { channel, reply } => {
                let res = tokio::select! {
                    res = service.fetch_all_messages(&channel) => res,
                    _ = shutdown.cancelled() => {
                        info!(channel, "scan interrupted by shutdown");
                        Err(worker_gone())
                    }
                };
                if reply.send(res).is_err() {
                    debug!(channel, "caller left before the scan finished");
                }
            }
            ScanRequest::FetchOne { channel, id, reply } => {
                let res = tokio::select! {
                    res = service.fetch_message_by_id(&channel, id) => res,
                    _ = shutdown.cancelled() => Err(worker_gone()),
                };
                let _ = reply.send(res);
            }
        }
    });
}
