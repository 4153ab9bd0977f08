use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use chrono::{SubsecRound, Utc};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use stash_storage::fingerprint::{SNIFF_LEN, sniff_extension};
use stash_storage::{
    LimitedReader, Metadata, ObjectReader, PutOptions, StorageBackend, StorageError, StorageKey,
};

use crate::error::UploadError;
use crate::expiry::resolve_expiry;
use crate::naming::{FALLBACK_EXTENSION, generate_delete_key, random_barename, split_name};
use crate::policy::UploadPolicy;

/// One inbound upload.
pub struct UploadRequest {
    pub body: ObjectReader,
    /// Announced body length. `None` or `0` when unknown.
    pub size_hint: Option<u64>,
    pub filename: Option<String>,
    /// Ask for a random barename instead of one derived from `filename`.
    pub randomize: bool,
    /// Requested lifetime. `None` or zero falls back to the instance maximum.
    pub expiry: Option<Duration>,
    /// Client-chosen delete key. Presenting the key of an existing object
    /// under the same name overwrites it.
    pub delete_key: Option<String>,
    pub access_key: Option<String>,
}

impl std::fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadRequest")
            .field("size_hint", &self.size_hint)
            .field("filename", &self.filename)
            .field("randomize", &self.randomize)
            .field("expiry", &self.expiry)
            .field("delete_key", &self.delete_key.as_ref().map(|_| "[REDACTED]"))
            .field("access_key", &self.access_key.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl UploadRequest {
    pub fn new(body: ObjectReader) -> Self {
        Self {
            body,
            size_hint: None,
            filename: None,
            randomize: false,
            expiry: None,
            delete_key: None,
            access_key: None,
        }
    }

    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    #[must_use]
    pub fn with_size_hint(mut self, size: u64) -> Self {
        self.size_hint = Some(size);
        self
    }

    #[must_use]
    pub fn with_randomize(mut self, randomize: bool) -> Self {
        self.randomize = randomize;
        self
    }

    #[must_use]
    pub fn with_expiry(mut self, ttl: Duration) -> Self {
        self.expiry = Some(ttl);
        self
    }

    #[must_use]
    pub fn with_delete_key(mut self, key: impl Into<String>) -> Self {
        self.delete_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_access_key(mut self, key: impl Into<String>) -> Self {
        self.access_key = Some(key.into());
        self
    }
}

/// A stored upload.
#[derive(Debug, Clone)]
pub struct Upload {
    pub key: StorageKey,
    pub original_name: Option<String>,
    pub metadata: Metadata,
}

/// Applies an [`UploadPolicy`] to inbound uploads against one backend.
#[derive(Clone)]
pub struct Uploader {
    backend: Arc<dyn StorageBackend>,
    policy: UploadPolicy,
}

impl std::fmt::Debug for Uploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uploader")
            .field("backend", &self.backend.name())
            .field("policy", &self.policy)
            .finish()
    }
}

impl Uploader {
    pub fn new(backend: Arc<dyn StorageBackend>, policy: UploadPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Name, deduplicate and store one upload.
    pub async fn process(&self, request: UploadRequest) -> Result<Upload, UploadError> {
        let UploadRequest {
            body,
            size_hint,
            filename,
            randomize,
            expiry,
            delete_key,
            access_key,
        } = request;

        let limit = self.policy.size_limit();
        if let (Some(limit), Some(hint)) = (limit, size_hint)
            && hint > limit
        {
            return Err(UploadError::TooLarge { limit });
        }
        let mut body: ObjectReader = match limit {
            Some(limit) => Box::pin(LimitedReader::new(body, limit)),
            None => body,
        };

        let filename = filename
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty());
        let (mut barename, mut extension) = filename.as_deref().map(split_name).unwrap_or_default();

        if extension.is_empty() {
            let (prefix, rest) = read_prefix(body).await?;
            if prefix.is_empty() {
                return Err(StorageError::FileEmpty.into());
            }
            extension = sniff_extension(&prefix)
                .unwrap_or(FALLBACK_EXTENSION)
                .to_owned();
            body = Box::pin(Cursor::new(prefix).chain(rest));
        }

        let mut randomize = randomize || barename.is_empty();
        if randomize {
            barename = random_barename();
        }
        let delete_key = delete_key
            .filter(|key| !key.is_empty())
            .unwrap_or_else(generate_delete_key);

        let key = self
            .resolve_key(barename, &extension, &delete_key, &mut randomize)
            .await?;

        if self.policy.is_prohibited(key.as_str()) {
            return Err(UploadError::ProhibitedFilename(key.to_string()));
        }

        let now = Utc::now().trunc_subsecs(0);
        let mut options = PutOptions::new(delete_key)
            .with_expiry(resolve_expiry(now, expiry, self.policy.max_expiry_seconds));
        options.size_hint = size_hint;
        options.access_key = access_key.filter(|key| !key.is_empty());
        if self.policy.keep_original_name {
            options.original_name = filename;
        }

        let metadata = self.backend.put(&key, body, options).await?;
        info!(
            key = %key,
            size = metadata.size,
            mimetype = %metadata.mimetype,
            backend = self.backend.name(),
            "stored upload"
        );

        Ok(Upload {
            key,
            original_name: metadata.original_name.clone(),
            metadata,
        })
    }

    /// Pick a free key for `barename.extension`.
    ///
    /// An existing object is replaced only when the caller presented its
    /// delete key. Otherwise the name is retried until it is free, either
    /// with fresh random barenames or with an increasing numeric suffix.
    async fn resolve_key(
        &self,
        barename: String,
        extension: &str,
        delete_key: &str,
        randomize: &mut bool,
    ) -> Result<StorageKey, UploadError> {
        let mut key = StorageKey::from_parts(&barename, extension)?;
        let mut taken = self.backend.exists(&key).await?;

        if taken {
            match self.backend.head(&key).await {
                Ok(existing) if existing.delete_key_matches(delete_key) => {
                    debug!(key = %key, "delete key matches, overwriting");
                    taken = false;
                }
                Ok(_) => {
                    if self.policy.force_random_filename {
                        *randomize = true;
                    }
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "cannot read existing metadata, treating name as taken");
                    if self.policy.force_random_filename {
                        *randomize = true;
                    }
                }
            }
        } else if self.policy.force_random_filename {
            *randomize = true;
            taken = true;
        }

        let mut counter: u64 = 0;
        while taken {
            let candidate = if *randomize {
                random_barename()
            } else {
                counter += 1;
                format!("{barename}{counter}")
            };
            key = StorageKey::from_parts(&candidate, extension)?;
            taken = self.backend.exists(&key).await?;
        }
        Ok(key)
    }
}

/// Read up to [`SNIFF_LEN`] bytes off the front of `body`.
async fn read_prefix(mut body: ObjectReader) -> Result<(Vec<u8>, ObjectReader), UploadError> {
    let mut prefix = Vec::with_capacity(SNIFF_LEN);
    (&mut body)
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut prefix)
        .await
        .map_err(StorageError::from)?;
    Ok((prefix, body))
}
