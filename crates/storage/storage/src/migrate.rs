use futures::StreamExt;
use tracing::{info, warn};

use crate::backend::{PutOptions, StorageBackend};
use crate::error::{StorageError, StorageResult};
use crate::key::StorageKey;

/// Outcome of copying one backend's key space into another.
#[derive(Debug, Default)]
pub struct MigrationReport {
    pub copied: Vec<StorageKey>,
    /// Keys left behind because they had already expired.
    pub expired: Vec<StorageKey>,
    pub failed: Vec<(StorageKey, StorageError)>,
}

impl MigrationReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

enum Copied {
    Stored,
    Expired,
}

async fn copy_one(
    src: &dyn StorageBackend,
    dst: &dyn StorageBackend,
    key: &StorageKey,
) -> StorageResult<Copied> {
    let (metadata, body) = src.get(key).await?;
    if metadata.is_expired() {
        return Ok(Copied::Expired);
    }
    dst.put(key, body, PutOptions::from_metadata(&metadata))
        .await?;
    Ok(Copied::Stored)
}

/// Copy every live object from `src` to `dst`, at most `concurrency` at a
/// time. Bytes, original name, expiry and both credentials carry over;
/// checksum, size and MIME type are recomputed by `dst`.
///
/// Per-key failures are collected in the report. A failure to enumerate
/// `src` aborts the migration.
pub async fn migrate(
    src: &dyn StorageBackend,
    dst: &dyn StorageBackend,
    concurrency: usize,
) -> StorageResult<MigrationReport> {
    info!(from = src.name(), to = dst.name(), concurrency, "starting migration");

    let mut outcomes = src
        .list()
        .map(move |item| async move {
            let key = item?;
            let result = copy_one(src, dst, &key).await;
            Ok::<_, StorageError>((key, result))
        })
        .buffer_unordered(concurrency.max(1));

    let mut report = MigrationReport::default();
    while let Some(outcome) = outcomes.next().await {
        let (key, result) = outcome?;
        match result {
            Ok(Copied::Stored) => {
                info!(key = %key, "migrated");
                report.copied.push(key);
            }
            Ok(Copied::Expired) => {
                info!(key = %key, "skipping expired object");
                report.expired.push(key);
            }
            Err(e) => {
                warn!(key = %key, error = %e, "migration failed for key");
                report.failed.push((key, e));
            }
        }
    }

    info!(
        copied = report.copied.len(),
        expired = report.expired.len(),
        failed = report.failed.len(),
        "migration finished"
    );
    Ok(report)
}
