use tracing::info;

use stash_storage::{StorageBackend, StorageKey};

use crate::error::UploadError;

/// Delete `key` if `presented` matches its delete key.
///
/// An object with an empty delete key can never be deleted this way.
pub async fn delete_with_key(
    backend: &dyn StorageBackend,
    key: &StorageKey,
    presented: &str,
) -> Result<(), UploadError> {
    let metadata = backend.head(key).await?;
    if !metadata.delete_key_matches(presented) {
        return Err(UploadError::BadDeleteKey);
    }
    backend.delete(key).await?;
    info!(key = %key, backend = backend.name(), "deleted upload");
    Ok(())
}
