use http::StatusCode;
use stash_storage::StorageError;
use thiserror::Error;

/// Errors that can occur while processing an upload.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The resolved key is reserved.
    #[error("filename is not allowed: {0}")]
    ProhibitedFilename(String),

    /// The body exceeds the instance size limit.
    #[error("upload exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },

    /// A presented delete key does not match the object's.
    #[error("delete key does not match")]
    BadDeleteKey,

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for UploadError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::TooLarge { limit } => Self::TooLarge { limit },
            other => Self::Storage(other),
        }
    }
}

impl UploadError {
    /// Whether the failure was caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }

    /// HTTP status a front end should answer with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::ProhibitedFilename(_) => StatusCode::BAD_REQUEST,
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::BadDeleteKey => StatusCode::UNAUTHORIZED,
            Self::Storage(err) => err.status(),
        }
    }
}
