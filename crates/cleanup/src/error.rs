use stash_storage::{StorageError, StorageKey};
use thiserror::Error;

/// Errors that can occur during an expiry sweep.
#[derive(Debug, Error)]
pub enum CleanupError {
    /// The key listing failed, so the sweep could not run to completion.
    #[error("failed to list keys: {0}")]
    List(#[source] StorageError),

    /// Some expired objects could not be deleted.
    #[error("{} expired object(s) could not be deleted", failures.len())]
    Delete {
        failures: Vec<(StorageKey, StorageError)>,
    },
}
