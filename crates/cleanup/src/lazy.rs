//! Read paths that enforce expiry.
//!
//! An expired object is deleted the moment it is read and the read reports
//! `NotFound`, whether or not a periodic sweep is running.

use http::{HeaderMap, Response};
use tracing::{info, warn};

use stash_storage::{Metadata, ObjectReader, StorageBackend, StorageError, StorageKey, StorageResult};

async fn purge(backend: &dyn StorageBackend, key: &StorageKey) -> StorageError {
    match backend.delete(key).await {
        Ok(()) => info!(key = %key, "deleted expired object on read"),
        Err(e) if e.is_not_found() => {}
        Err(e) => warn!(key = %key, error = %e, "failed to delete expired object on read"),
    }
    StorageError::not_found(key)
}

/// [`StorageBackend::head`] that treats expired objects as missing.
pub async fn head_live(backend: &dyn StorageBackend, key: &StorageKey) -> StorageResult<Metadata> {
    let metadata = backend.head(key).await?;
    if metadata.is_expired() {
        return Err(purge(backend, key).await);
    }
    Ok(metadata)
}

/// [`StorageBackend::get`] that treats expired objects as missing.
pub async fn get_live(
    backend: &dyn StorageBackend,
    key: &StorageKey,
) -> StorageResult<(Metadata, ObjectReader)> {
    let (metadata, body) = backend.get(key).await?;
    if metadata.is_expired() {
        drop(body);
        return Err(purge(backend, key).await);
    }
    Ok((metadata, body))
}

/// [`StorageBackend::serve_file`] that treats expired objects as missing.
pub async fn serve_live(
    backend: &dyn StorageBackend,
    key: &StorageKey,
    headers: &HeaderMap,
) -> StorageResult<Response<ObjectReader>> {
    head_live(backend, key).await?;
    backend.serve_file(key, headers).await
}
