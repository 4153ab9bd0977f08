use chrono::{DateTime, Utc};
use futures::StreamExt;
use tracing::{debug, info, warn};

use stash_storage::{StorageBackend, StorageError, StorageKey};

use crate::error::CleanupError;

/// Outcome of one pass over a backend.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Keys examined.
    pub scanned: usize,
    /// Expired keys removed.
    pub deleted: Vec<StorageKey>,
    /// Keys left alone because their metadata could not be read.
    pub skipped: Vec<(StorageKey, StorageError)>,
    /// Expired keys whose deletion failed.
    pub failed: Vec<(StorageKey, StorageError)>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty()
    }

    /// Fail if any expired object survived the sweep.
    pub fn into_result(self) -> Result<Self, CleanupError> {
        if self.failed.is_empty() {
            Ok(self)
        } else {
            Err(CleanupError::Delete {
                failures: self.failed,
            })
        }
    }
}

/// Delete every object that is expired now.
pub async fn sweep(backend: &dyn StorageBackend) -> Result<SweepReport, CleanupError> {
    sweep_at(backend, Utc::now()).await
}

/// Delete every object that is expired at `now`.
///
/// Objects whose metadata is missing or unreadable are skipped, never
/// deleted. Only a failure of the listing itself aborts the pass.
pub async fn sweep_at(
    backend: &dyn StorageBackend,
    now: DateTime<Utc>,
) -> Result<SweepReport, CleanupError> {
    let mut report = SweepReport::default();
    let mut keys = backend.list();

    while let Some(key) = keys.next().await {
        let key = key.map_err(CleanupError::List)?;
        report.scanned += 1;

        let metadata = match backend.head(&key).await {
            Ok(metadata) => metadata,
            Err(e) if e.is_not_found() => {
                // Bytes without metadata are orphans, not a concurrent delete.
                match backend.exists(&key).await {
                    Ok(false) => debug!(key = %key, "object vanished during sweep"),
                    Ok(true) => {
                        warn!(key = %key, "skipping object with missing metadata");
                        report.skipped.push((key, e));
                    }
                    Err(exists_err) => {
                        warn!(key = %key, error = %exists_err, "skipping object with missing metadata");
                        report.skipped.push((key, exists_err));
                    }
                }
                continue;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "skipping object with unreadable metadata");
                report.skipped.push((key, e));
                continue;
            }
        };
        if !metadata.expiry.is_expired_at(now) {
            continue;
        }

        match backend.delete(&key).await {
            Ok(()) => {
                info!(key = %key, "deleted expired object");
                report.deleted.push(key);
            }
            Err(e) if e.is_not_found() => debug!(key = %key, "expired object already gone"),
            Err(e) => {
                warn!(key = %key, error = %e, "failed to delete expired object");
                report.failed.push((key, e));
            }
        }
    }

    info!(
        backend = backend.name(),
        scanned = report.scanned,
        deleted = report.deleted.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "expiry sweep finished"
    );
    Ok(report)
}
