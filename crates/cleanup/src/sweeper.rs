use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};

use stash_storage::StorageBackend;

use crate::sweep::sweep;

/// Runs [`sweep`] on a fixed interval until told to stop.
pub struct Sweeper {
    backend: Arc<dyn StorageBackend>,
    every: Duration,
    shutdown_rx: mpsc::Receiver<()>,
}

impl Sweeper {
    /// Create a sweeper and the sender that stops it. Dropping the sender
    /// also stops it.
    pub fn new(backend: Arc<dyn StorageBackend>, every: Duration) -> (Self, mpsc::Sender<()>) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let sweeper = Self {
            backend,
            every: every.max(Duration::from_millis(1)),
            shutdown_rx,
        };
        (sweeper, shutdown_tx)
    }

    /// Sweep immediately, then once per interval. A sweep is never
    /// interrupted part-way; shutdown is noticed between passes.
    pub async fn run(&mut self) {
        info!(
            backend = self.backend.name(),
            every_secs = self.every.as_secs(),
            "expiry sweeper starting"
        );
        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("expiry sweeper received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    match sweep(self.backend.as_ref()).await {
                        Ok(report) if !report.failed.is_empty() => {
                            error!(failed = report.failed.len(), "expiry sweep left expired objects behind");
                        }
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "expiry sweep failed"),
                    }
                }
            }
        }
    }
}
