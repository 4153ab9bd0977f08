use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use tracing::error;

use stash_storage::{StorageError, StorageKey};

/// Whether an SDK error means the object does not exist.
pub(crate) fn is_not_found<E>(err: &SdkError<E, HttpResponse>) -> bool
where
    E: ProvideErrorMetadata,
{
    if let Some(response) = err.raw_response()
        && response.status().as_u16() == 404
    {
        return true;
    }
    matches!(err.code(), Some("NoSuchKey" | "NotFound"))
}

/// Map an SDK error onto the shared error kinds. Any 404-shaped error
/// becomes `NotFound`.
pub(crate) fn storage_error<E>(
    key: &StorageKey,
    operation: &str,
    err: &SdkError<E, HttpResponse>,
) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    if is_not_found(err) {
        return StorageError::not_found(key);
    }
    let message = DisplayErrorContext(err).to_string();
    error!(key = %key, operation, error = %message, "S3 request failed");
    StorageError::Backend(format!("{operation} failed: {message}"))
}
