use std::fmt::Display;

use http::StatusCode;
use thiserror::Error;

use crate::io::LimitExceeded;

/// Convenience alias for storage operation results.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while talking to a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The key is absent, or was expired and purged on access.
    #[error("not found: {0}")]
    NotFound(String),

    /// A metadata record exists but cannot be decoded.
    #[error("bad metadata for {key}: {reason}")]
    BadMetadata { key: String, reason: String },

    /// The upload stream produced zero bytes.
    #[error("file is empty")]
    FileEmpty,

    /// The caller announced a size that the stream did not deliver.
    #[error("size mismatch: expected {expected} bytes, read {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    /// The stream exceeded the configured size ceiling.
    #[error("file exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },

    /// The key is not a valid single-segment filename.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Filesystem or stream I/O failed.
    #[error("I/O error: {0}")]
    Io(std::io::Error),

    /// The remote storage service returned an error.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Build a [`StorageError::NotFound`] for the given key.
    pub fn not_found(key: impl Display) -> Self {
        Self::NotFound(key.to_string())
    }

    /// Build a [`StorageError::BadMetadata`] for the given key.
    pub fn bad_metadata(key: impl Display, reason: impl Display) -> Self {
        Self::BadMetadata {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Returns `true` if the key was absent or already purged.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` for outcomes caused by the request rather than by the
    /// storage medium.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::FileEmpty
                | Self::SizeMismatch { .. }
                | Self::TooLarge { .. }
                | Self::InvalidKey(_)
        )
    }

    /// HTTP status a request handler should answer with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::FileEmpty | Self::SizeMismatch { .. } | Self::InvalidKey(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::BadMetadata { .. } | Self::Io(_) | Self::Backend(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        // A size-limited reader reports overflow through the I/O channel.
        if let Some(exceeded) = err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<LimitExceeded>())
        {
            return Self::TooLarge {
                limit: exceeded.limit,
            };
        }
        Self::Io(err)
    }
}
