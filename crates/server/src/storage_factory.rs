use std::sync::Arc;

use stash_storage::StorageBackend;
use stash_storage_local::LocalBackend;
use stash_storage_s3::S3Backend;
use tracing::info;

use crate::config::StorageConfig;
use crate::error::ServerError;

/// Create the configured storage backend.
pub async fn create_storage(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>, ServerError> {
    create_backend(&config.backend, config).await
}

/// Create the backend named `kind` from the settings in `config`,
/// regardless of which backend `config` selects.
pub async fn create_backend(
    kind: &str,
    config: &StorageConfig,
) -> Result<Arc<dyn StorageBackend>, ServerError> {
    let backend: Arc<dyn StorageBackend> = match kind {
        "local" => {
            let backend = LocalBackend::new(&config.local)
                .await
                .map_err(|e| ServerError::Config(format!("local storage: {e}")))?;
            info!(
                files = %config.local.files_path.display(),
                meta = %config.local.meta_path.display(),
                "local storage initialized"
            );
            Arc::new(backend)
        }
        "s3" => {
            let backend = S3Backend::new(config.s3.clone())
                .await
                .map_err(|e| ServerError::Config(format!("s3 storage: {e}")))?;
            info!(bucket = %config.s3.bucket, region = %config.s3.region, "s3 storage initialized");
            Arc::new(backend)
        }
        other => {
            return Err(ServerError::Config(format!(
                "unknown storage backend: {other} (expected \"local\" or \"s3\")"
            )));
        }
    };
    Ok(backend)
}
