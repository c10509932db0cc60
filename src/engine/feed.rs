use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::FEED_POLL_PERIOD_SECS;
use crate::types::ListingUpdate;

use super::{ChatGateway, CredentialStore, DispatchEngine, Marketplace};

/// Periodic feed poller: fetches listing updates on a fixed period, starting
/// with an eager poll, and pushes every update into the bounded queue.
///
/// The time-window offset lives only in memory; a restart re-covers or skips
/// some window. Known gap, deliberately not persisted.
pub struct FeedPoller<M, C, S> {
    engine: Arc<DispatchEngine<M, C, S>>,
    tx: mpsc::Sender<ListingUpdate>,
    cancel: CancellationToken,
}

impl<M, C, S> FeedPoller<M, C, S>
where
    M: Marketplace,
    C: ChatGateway,
    S: CredentialStore,
{
    pub fn new(
        engine: Arc<DispatchEngine<M, C, S>>,
        tx: mpsc::Sender<ListingUpdate>,
        cancel: CancellationToken,
    ) -> Self {
        Self { engine, tx, cancel }
    }

    pub async fn run(self) {
        let mut window_start = now_secs();
        let mut ticker = interval(Duration::from_secs(FEED_POLL_PERIOD_SECS));

        info!("Feed poller started");
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                // The first tick completes immediately — the eager startup poll.
                _ = ticker.tick() => {}
            }

            let fetch_started = now_secs();
            match self.engine.listing_updates(window_start).await {
                Ok(updates) => {
                    if !self.enqueue_batch(updates).await {
                        break;
                    }
                    // Advance only after a successful fetch so a transient
                    // failure re-covers the same window on the next tick.
                    window_start = fetch_started;
                }
                Err(e) => warn!("Failed to fetch listing updates: {e}"),
            }
        }
        info!("Feed poller stopped");
    }

    /// Push a batch into the queue. A full queue blocks us here — that is the
    /// backpressure contract with the workers; nothing is dropped or
    /// rejected. Returns false on cancellation or when every worker is gone.
    async fn enqueue_batch(&self, updates: Vec<ListingUpdate>) -> bool {
        for update in updates {
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                res = self.tx.send(update) => {
                    if res.is_err() {
                        warn!("Update queue closed, stopping feed poller");
                        return false;
                    }
                }
            }
        }
        true
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
