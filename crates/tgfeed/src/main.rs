use std::sync::Arc;

use anyhow::Context;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use tgfeed_core::{config::Config, service::FeedService, worker::ScanWorker};
use tgfeed_http::AppState;
use tgfeed_telegram::TelegramChannelClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tgfeed_core::logging::init("tgfeed")?;

    let cfg = Config::load()?;

    let client = TelegramChannelClient::from_token(
        &cfg.telegram_bot_token,
        cfg.telegram_scratch_chat_id,
    );
    client
        .connect()
        .await
        .context("failed to establish telegram session")?;

    let service = Arc::new(FeedService::new(
        Arc::new(client),
        cfg.scan,
        cfg.cache_ttl,
    ));

    let shutdown = CancellationToken::new();
    let (worker, worker_join) = ScanWorker::spawn(
        service,
        cfg.scan_queue_depth,
        cfg.cache_evict_interval,
        shutdown.clone(),
    );

    let listener = tgfeed_http::bind(&cfg.bind_addr()).await?;
    let state = AppState::new(worker, cfg.readme_path.clone());

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown requested");
                signal.cancel();
            }
            Err(e) => error!(error = %e, "failed to listen for ctrl-c"),
        }
    });

    let served = tgfeed_http::serve(listener, state, shutdown.clone()).await;
    shutdown.cancel();
    log_worker_exit(worker_join.await);
    served
}

/// `false` when the worker panicked or was aborted.
fn log_worker_exit(res: Result<(), JoinError>) -> bool {
    match res {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, panicked = e.is_panic(), "scan worker ended abnormally");
            false
        }
    }
}
