use stash_cleanup::CleanupError;
use stash_crypto::KeyHashError;
use stash_storage::StorageError;
use stash_upload::UploadError;
use thiserror::Error;

/// Errors that can occur when running a stash command.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Bad command-line input.
    #[error("invalid input: {0}")]
    Input(String),

    /// An I/O error (e.g. reading the config file or stdin).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("cleanup error: {0}")]
    Cleanup(#[from] CleanupError),

    #[error("key hashing error: {0}")]
    KeyHash(#[from] KeyHashError),

    /// A presented credential was rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}
