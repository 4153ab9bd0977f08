use std::io::{ErrorKind, SeekFrom, Write as _};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt, stream};
use http::{HeaderMap, Response};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, warn};

use stash_storage::archive::list_members_blocking;
use stash_storage::fingerprint::spool;
use stash_storage::serve::{self, RangeSelection, ServePlan};
use stash_storage::{
    KeyStream, Metadata, ObjectReader, PutOptions, StorageBackend, StorageError, StorageKey,
    StorageResult,
};

use crate::config::LocalConfig;
use crate::sidecar::Sidecar;

/// Filesystem-backed implementation of [`StorageBackend`].
#[derive(Debug, Clone)]
pub struct LocalBackend {
    files_dir: PathBuf,
    meta_dir: PathBuf,
}

fn not_found_or<T>(key: &StorageKey, result: std::io::Result<T>) -> StorageResult<T> {
    result.map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            StorageError::not_found(key)
        } else {
            StorageError::from(e)
        }
    })
}

fn join_error(e: &tokio::task::JoinError) -> StorageError {
    StorageError::Backend(format!("blocking task failed: {e}"))
}

impl LocalBackend {
    /// Open a backend over the configured directories, creating them if
    /// needed.
    pub async fn new(config: &LocalConfig) -> StorageResult<Self> {
        if config.files_path == config.meta_path {
            return Err(StorageError::Backend(
                "files_path and meta_path must be different directories".into(),
            ));
        }
        tokio::fs::create_dir_all(&config.files_path).await?;
        tokio::fs::create_dir_all(&config.meta_path).await?;
        debug!(
            files = %config.files_path.display(),
            meta = %config.meta_path.display(),
            "local storage ready"
        );
        Ok(Self {
            files_dir: config.files_path.clone(),
            meta_dir: config.meta_path.clone(),
        })
    }

    fn file_path(&self, key: &StorageKey) -> PathBuf {
        self.files_dir.join(key.as_str())
    }

    fn meta_path(&self, key: &StorageKey) -> PathBuf {
        self.meta_dir.join(key.as_str())
    }

    async fn read_sidecar(&self, key: &StorageKey) -> StorageResult<(Sidecar, DateTime<Utc>)> {
        let path = self.meta_path(key);
        let raw = not_found_or(key, tokio::fs::read(&path).await)?;
        let sidecar: Sidecar =
            serde_json::from_slice(&raw).map_err(|e| StorageError::bad_metadata(key, e))?;
        let modified = not_found_or(key, tokio::fs::metadata(&path).await)?.modified()?;
        Ok((sidecar, DateTime::<Utc>::from(modified)))
    }

    /// Atomically replace the sidecar for `key`.
    async fn write_sidecar(&self, key: &StorageKey, sidecar: &Sidecar) -> StorageResult<()> {
        let json = serde_json::to_vec(sidecar).map_err(|e| StorageError::bad_metadata(key, e))?;
        self.write_sidecar_raw(key, json).await
    }

    async fn write_sidecar_raw(&self, key: &StorageKey, json: Vec<u8>) -> StorageResult<()> {
        let meta_dir = self.meta_dir.clone();
        let dest = self.meta_path(key);
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::Builder::new()
                .prefix(".")
                .tempfile_in(&meta_dir)?;
            tmp.write_all(&json)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&dest).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| join_error(&e))??;
        Ok(())
    }

    /// Put back the sidecar that a failed put replaced, or remove the new
    /// one if the key held no object before.
    async fn rollback_sidecar(&self, key: &StorageKey, previous: Option<Vec<u8>>) {
        let restored = match previous {
            Some(raw) => self.write_sidecar_raw(key, raw).await,
            None => remove_if_present(&self.meta_path(key))
                .await
                .map(|_| ())
                .map_err(StorageError::from),
        };
        if let Err(e) = restored {
            warn!(key = %key, error = %e, "failed to roll back metadata");
        }
    }

    async fn open_range(
        &self,
        key: &StorageKey,
        selection: RangeSelection,
    ) -> StorageResult<ObjectReader> {
        let mut file = not_found_or(key, tokio::fs::File::open(self.file_path(key)).await)?;
        match selection {
            RangeSelection::Partial(range) => {
                file.seek(SeekFrom::Start(range.start)).await?;
                Ok(Box::pin(file.take(range.length())))
            }
            RangeSelection::Full | RangeSelection::Unsatisfiable => Ok(Box::pin(file)),
        }
    }
}

async fn remove_if_present(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

async fn key_for_entry(entry: &tokio::fs::DirEntry) -> std::io::Result<Option<StorageKey>> {
    if !entry.file_type().await?.is_file() {
        return Ok(None);
    }
    // Temporary uploads are dotfiles and fail key validation.
    Ok(entry
        .file_name()
        .to_str()
        .and_then(|name| StorageKey::new(name).ok()))
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn exists(&self, key: &StorageKey) -> StorageResult<bool> {
        Ok(tokio::fs::try_exists(self.file_path(key)).await?)
    }

    async fn head(&self, key: &StorageKey) -> StorageResult<Metadata> {
        let (sidecar, modified) = self.read_sidecar(key).await?;
        let size = not_found_or(key, tokio::fs::metadata(self.file_path(key)).await)?.len();
        Ok(sidecar.into_metadata(size, modified))
    }

    async fn get(&self, key: &StorageKey) -> StorageResult<(Metadata, ObjectReader)> {
        let metadata = self.head(key).await?;
        let file = not_found_or(key, tokio::fs::File::open(self.file_path(key)).await)?;
        Ok((metadata, Box::pin(file)))
    }

    async fn put(
        &self,
        key: &StorageKey,
        mut body: ObjectReader,
        options: PutOptions,
    ) -> StorageResult<Metadata> {
        let tmp = tempfile::Builder::new()
            .prefix(".")
            .suffix(".upload")
            .tempfile_in(&self.files_dir)?;
        // Dropping `tmp_path` on any early return removes the partial file.
        let (std_file, tmp_path) = tmp.into_parts();
        let mut file = tokio::fs::File::from_std(std_file);

        let digest = spool(&mut body, &mut file).await?;
        file.sync_all().await?;
        drop(file);

        if digest.size == 0 {
            return Err(StorageError::FileEmpty);
        }
        if let Some(expected) = options.expected_size()
            && expected != digest.size
        {
            return Err(StorageError::SizeMismatch {
                expected,
                actual: digest.size,
            });
        }

        let archive_files =
            list_members_blocking(tmp_path.to_path_buf(), digest.mimetype.clone()).await;

        let sidecar = Sidecar {
            original_name: options.original_name,
            delete_key: options.delete_key,
            access_key: options.access_key.unwrap_or_default(),
            sha256sum: digest.checksum,
            mimetype: digest.mimetype,
            size: i64::try_from(digest.size).unwrap_or(i64::MAX),
            expiry: options.expiry,
            archive_files,
        };
        let previous = match tokio::fs::read(self.meta_path(key)).await {
            Ok(raw) => Some(raw),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        self.write_sidecar(key, &sidecar).await?;

        let dest = self.file_path(key);
        let persisted = tokio::task::spawn_blocking(move || tmp_path.persist(dest))
            .await
            .map_err(|e| join_error(&e))?;
        if let Err(e) = persisted {
            warn!(key = %key, error = %e.error, "failed to move upload into place");
            self.rollback_sidecar(key, previous).await;
            return Err(e.error.into());
        }

        debug!(key = %key, size = digest.size, "stored object");
        self.head(key).await
    }

    async fn put_metadata(&self, key: &StorageKey, metadata: &Metadata) -> StorageResult<()> {
        if !self.exists(key).await? {
            return Err(StorageError::not_found(key));
        }
        self.write_sidecar(key, &Sidecar::from_metadata(metadata))
            .await
    }

    async fn delete(&self, key: &StorageKey) -> StorageResult<()> {
        let removed_file = remove_if_present(&self.file_path(key)).await?;
        let removed_meta = remove_if_present(&self.meta_path(key)).await?;
        if !removed_file && !removed_meta {
            return Err(StorageError::not_found(key));
        }
        debug!(key = %key, "deleted object");
        Ok(())
    }

    async fn size(&self, key: &StorageKey) -> StorageResult<u64> {
        Ok(not_found_or(key, tokio::fs::metadata(self.file_path(key)).await)?.len())
    }

    async fn serve_file(
        &self,
        key: &StorageKey,
        headers: &HeaderMap,
    ) -> StorageResult<Response<ObjectReader>> {
        let metadata = self.head(key).await?;
        match serve::plan(&metadata, headers) {
            ServePlan::NotModified => serve::not_modified(&metadata),
            ServePlan::Body(RangeSelection::Unsatisfiable) => serve::unsatisfiable(&metadata),
            ServePlan::Body(selection) => {
                let body = self.open_range(key, selection).await?;
                let range = match selection {
                    RangeSelection::Partial(range) => Some(range),
                    _ => None,
                };
                serve::content(&metadata, range, body)
            }
        }
    }

    fn list(&self) -> KeyStream<'_> {
        let dir = self.files_dir.clone();
        stream::once(tokio::fs::read_dir(dir))
            .map_ok(|entries| {
                stream::try_unfold(entries, |mut entries| async move {
                    while let Some(entry) = entries.next_entry().await? {
                        if let Some(key) = key_for_entry(&entry).await? {
                            return Ok(Some((key, entries)));
                        }
                    }
                    Ok::<_, std::io::Error>(None)
                })
            })
            .try_flatten()
            .map_err(StorageError::from)
            .boxed()
    }
}
