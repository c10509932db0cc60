mod config;
mod engine;
mod error;
mod etsy;
mod messages;
mod storage;
mod telegram;
mod types;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, UPDATE_QUEUE_CAPACITY};
use crate::engine::{spawn_update_workers, DispatchEngine, FeedPoller};
use crate::error::Result;
use crate::etsy::EtsyClient;
use crate::storage::SqliteStore;
use crate::telegram::Telegram;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let store = SqliteStore::connect(&cfg.db_path).await?;
    info!("Credential store ready at {}", cfg.db_path);

    let marketplace = EtsyClient::new(&cfg)?;
    let chat = Telegram::new(&cfg)?;

    let engine = Arc::new(DispatchEngine::new(marketplace, chat, store));
    let cancel = CancellationToken::new();

    let (update_tx, update_rx) = mpsc::channel(UPDATE_QUEUE_CAPACITY);

    // Workers first so the eager startup poll has consumers from the start.
    let mut handles = spawn_update_workers(Arc::clone(&engine), update_rx, cancel.clone());

    let poller = FeedPoller::new(Arc::clone(&engine), update_tx, cancel.clone());
    handles.push(tokio::spawn(poller.run()));

    {
        let engine = Arc::clone(&engine);
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move { engine.run_chat_loop(cancel).await }));
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping");
    cancel.cancel();

    // In-flight network calls finish or fail on their own; the loops exit at
    // their next await point.
    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}
