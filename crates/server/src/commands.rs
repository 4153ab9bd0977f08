//! Operator commands behind the `stash` binary.

use std::future::Future;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use stash_cleanup::{SweepReport, Sweeper, head_live, sweep};
use stash_crypto::AuthKeys;
use stash_storage::{Metadata, MigrationReport, StorageBackend, StorageKey};
use stash_upload::{Upload, UploadRequest, Uploader, delete_with_key};

use crate::config::{AuthConfig, StorageConfig};
use crate::error::ServerError;
use crate::storage_factory::create_backend;

/// Read a secret from `reader`, dropping one trailing line ending.
pub fn read_secret(mut reader: impl Read) -> Result<String, ServerError> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    let secret = text
        .strip_suffix('\n')
        .map(|s| s.strip_suffix('\r').unwrap_or(s))
        .unwrap_or(&text);
    if secret.is_empty() {
        return Err(ServerError::Input("no key given on stdin".into()));
    }
    Ok(secret.to_owned())
}

/// Verify `plaintext` against the configured auth file.
pub fn check_key(auth: &AuthConfig, plaintext: &str) -> Result<(), ServerError> {
    let path = auth
        .file
        .as_ref()
        .ok_or_else(|| ServerError::Config("check-key requires [auth] file".into()))?;
    let keys = AuthKeys::load(path)?;
    if keys.verify(plaintext)? {
        Ok(())
    } else {
        Err(ServerError::Unauthorized("key not in auth file".into()))
    }
}

/// Options for uploading a local file.
#[derive(Debug, Clone, Default)]
pub struct UploadArgs {
    pub path: PathBuf,
    /// Name to upload under. Defaults to the file's own name.
    pub name: Option<String>,
    pub randomize: bool,
    pub expiry_seconds: Option<u64>,
    pub delete_key: Option<String>,
    pub access_key: Option<String>,
}

/// Run a local file through the upload pipeline.
pub async fn upload_file(uploader: &Uploader, args: UploadArgs) -> Result<Upload, ServerError> {
    let file = tokio::fs::File::open(&args.path).await?;
    let size = file.metadata().await?.len();
    let name = args.name.or_else(|| {
        args.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    });

    let mut request = UploadRequest::new(Box::pin(file))
        .with_size_hint(size)
        .with_randomize(args.randomize);
    request.filename = name;
    request.expiry = args.expiry_seconds.map(Duration::from_secs);
    request.delete_key = args.delete_key;
    request.access_key = args.access_key;

    Ok(uploader.process(request).await?)
}

/// What `upload` prints. The delete key is shown once, here.
#[derive(Debug, Serialize)]
pub struct UploadSummary<'a> {
    pub key: &'a str,
    pub delete_key: &'a str,
    pub size: u64,
    pub sha256sum: &'a str,
    pub mimetype: &'a str,
    pub expiry: Option<String>,
}

impl<'a> From<&'a Upload> for UploadSummary<'a> {
    fn from(upload: &'a Upload) -> Self {
        Self {
            key: upload.key.as_str(),
            delete_key: &upload.metadata.delete_key,
            size: upload.metadata.size,
            sha256sum: &upload.metadata.checksum,
            mimetype: &upload.metadata.mimetype,
            expiry: upload.metadata.expiry.to_rfc3339(),
        }
    }
}

/// What `info` prints. Credentials are never shown.
#[derive(Debug, Serialize)]
pub struct ObjectInfo<'a> {
    pub key: &'a str,
    pub original_name: Option<&'a str>,
    pub size: u64,
    pub sha256sum: &'a str,
    pub mimetype: &'a str,
    pub modified: String,
    pub expiry: Option<String>,
    pub public: bool,
    #[serde(skip_serializing_if = "no_members")]
    pub archive_files: &'a [String],
}

fn no_members(files: &&[String]) -> bool {
    files.is_empty()
}

impl<'a> ObjectInfo<'a> {
    pub fn new(key: &'a StorageKey, metadata: &'a Metadata) -> Self {
        Self {
            key: key.as_str(),
            original_name: metadata.original_name.as_deref(),
            size: metadata.size,
            sha256sum: &metadata.checksum,
            mimetype: &metadata.mimetype,
            modified: metadata.modified.to_rfc3339(),
            expiry: metadata.expiry.to_rfc3339(),
            public: metadata.is_public(),
            archive_files: &metadata.archive_files,
        }
    }
}

/// Metadata of a live object. Expired objects are deleted and reported
/// as missing.
pub async fn object_info(backend: &dyn StorageBackend, key: &str) -> Result<Metadata, ServerError> {
    let key = StorageKey::new(key)?;
    Ok(head_live(backend, &key).await?)
}

/// Delete an object after checking its delete key.
pub async fn delete_object(
    backend: &dyn StorageBackend,
    key: &str,
    delete_key: &str,
) -> Result<(), ServerError> {
    let key = StorageKey::new(key)?;
    delete_with_key(backend, &key, delete_key).await?;
    Ok(())
}

/// One sweep. Fails if an expired object could not be deleted.
pub async fn cleanup_once(backend: &dyn StorageBackend) -> Result<SweepReport, ServerError> {
    let report = sweep(backend).await?;
    for (key, e) in &report.skipped {
        warn!(key = %key, error = %e, "skipped");
    }
    Ok(report.into_result()?)
}

/// Sweep every `every` until `shutdown` resolves.
pub async fn cleanup_every(
    backend: Arc<dyn StorageBackend>,
    every: Duration,
    shutdown: impl Future<Output = ()>,
) -> Result<(), ServerError> {
    let (mut sweeper, shutdown_tx) = Sweeper::new(backend, every);
    let handle = tokio::spawn(async move { sweeper.run().await });

    shutdown.await;
    info!("stopping expiry sweeper");
    // The sweeper may already have stopped; a closed channel is fine.
    let _ = shutdown_tx.send(()).await;
    handle
        .await
        .map_err(|e| ServerError::Io(std::io::Error::other(e)))?;
    Ok(())
}

/// Copy every live object from the `from` backend to the `to` backend.
pub async fn migrate_storage(
    config: &StorageConfig,
    from: &str,
    to: &str,
    concurrency: usize,
) -> Result<MigrationReport, ServerError> {
    if from == to {
        return Err(ServerError::Input(format!(
            "source and destination are both {from}"
        )));
    }
    let src = create_backend(from, config).await?;
    let dst = create_backend(to, config).await?;
    Ok(stash_storage::migrate(src.as_ref(), dst.as_ref(), concurrency).await?)
}
