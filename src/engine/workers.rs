use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::UPDATE_WORKER_COUNT;
use crate::types::ListingUpdate;

use super::{ChatGateway, CredentialStore, DispatchEngine, Marketplace};

/// Spawn the fixed pool of worker tasks draining the update queue.
///
/// The receiver sits behind an async mutex so the pool shares one queue;
/// whichever worker holds the lock takes the next item, releases, and the
/// rest compete for the following one. No ordering guarantee across workers.
pub fn spawn_update_workers<M, C, S>(
    engine: Arc<DispatchEngine<M, C, S>>,
    rx: mpsc::Receiver<ListingUpdate>,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>>
where
    M: Marketplace + 'static,
    C: ChatGateway + 'static,
    S: CredentialStore + 'static,
{
    info!("Starting {UPDATE_WORKER_COUNT} update workers");
    let rx = Arc::new(Mutex::new(rx));
    (0..UPDATE_WORKER_COUNT)
        .map(|id| {
            let engine = Arc::clone(&engine);
            let rx = Arc::clone(&rx);
            let cancel = cancel.clone();
            tokio::spawn(worker_loop(id, engine, rx, cancel))
        })
        .collect()
}

async fn worker_loop<M, C, S>(
    id: usize,
    engine: Arc<DispatchEngine<M, C, S>>,
    rx: Arc<Mutex<mpsc::Receiver<ListingUpdate>>>,
    cancel: CancellationToken,
) where
    M: Marketplace,
    C: ChatGateway,
    S: CredentialStore,
{
    loop {
        // Hold the receiver lock only while waiting for one item. On
        // cancellation the holder bails out, releases, and the remaining
        // workers observe the cancelled token as soon as they acquire it.
        let update = {
            let mut rx = rx.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => None,
                update = rx.recv() => update,
            }
        };

        // None: cancelled, or the poller hung up and the queue drained.
        let Some(update) = update else { break };

        if let Err(e) = engine.handle_listing_update(update).await {
            // A per-item failure never takes the worker down.
            warn!(worker = id, "Failed to handle listing update: {e}");
        }
    }
    debug!(worker = id, "Update worker stopped");
}
