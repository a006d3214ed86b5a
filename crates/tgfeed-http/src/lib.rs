//! HTTP surface (axum) over the scan worker.
//!
//! Routes:
//! - `GET /` renders the README
//! - `GET /messages/{channel}` lists every cached message
//! - `GET /messages/{channel}/{message_id}` looks one message up directly
//! - `GET /feed/{channel}?format=rss|atom|json` renders a feed

use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use tgfeed_core::worker::ScanWorkerHandle;

pub mod handlers;
pub mod router;

pub use router::router;

#[derive(Clone, Debug)]
pub struct AppState {
    pub worker: ScanWorkerHandle,
    pub readme_path: PathBuf,
}

impl AppState {
    pub fn new(worker: ScanWorkerHandle, readme_path: impl Into<PathBuf>) -> Self {
        Self {
            worker,
            readme_path: readme_path.into(),
        }
    }
}

pub async fn bind(addr: &str) -> anyhow::Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))
}

/// Serve until `shutdown` fires; in-flight requests are allowed to finish.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let local: SocketAddr = listener.local_addr().context("listener has no address")?;
    info!(%local, "http server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("http server error")?;

    info!("http server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use async_trait::async_trait;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpStream,
    };

    use tgfeed_core::{
        config::ScanConfig,
        domain::{ChannelHandle, Message, MessageId},
        ports::ChannelClient,
        service::FeedService,
        worker::ScanWorker,
        Result,
    };

    use super::*;

    /// Every id holds a post and every lookup is slow, so a scan never ends on its own.
    struct EndlessChannel;

    #[async_trait]
    impl ChannelClient for EndlessChannel {
        async fn resolve_channel(&self, name: &str) -> Result<ChannelHandle> {
            Ok(ChannelHandle {
                chat_id: -1,
                username: name.to_string(),
                title: None,
            })
        }

        async fn fetch_message_by_id(
            &self,
            _channel: &ChannelHandle,
            id: MessageId,
        ) -> Result<Option<Message>> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(Some(Message {
                id,
                text: format!("post {id}"),
                date: 1_700_000_000,
                link: None,
            }))
        }
    }

    #[tokio::test]
    async fn shutdown_completes_while_a_scan_is_in_flight() {
        let service = Arc::new(FeedService::new(
            Arc::new(EndlessChannel),
            ScanConfig::default(),
            Duration::from_secs(3600),
        ));
        let token = CancellationToken::new();
        let (worker, worker_join) =
            ScanWorker::spawn(service, 8, Duration::from_secs(60), token.clone());

        let listener = bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve(
            listener,
            AppState::new(worker, "README.md"),
            token.clone(),
        ));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /messages/news HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();

        let served = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server kept waiting on the scan");
        served.unwrap().unwrap();
        worker_join.await.unwrap();

        let mut response = Vec::new();
        let read = stream.read_to_end(&mut response);
        let _ = tokio::time::timeout(Duration::from_secs(2), read).await;
        let response = String::from_utf8_lossy(&response);
        assert!(response.starts_with("HTTP/1.1 500"), "{response}");
    }
}
