use async_trait::async_trait;
use futures::stream::BoxStream;
use http::{HeaderMap, Response};

use crate::error::StorageResult;
use crate::io::ObjectReader;
use crate::key::StorageKey;
use crate::metadata::{Expiry, Metadata};

/// Single-pass enumeration of every key in a backend.
pub type KeyStream<'a> = BoxStream<'a, StorageResult<StorageKey>>;

/// Caller-supplied attributes for a new object. Checksum, size and MIME type
/// are never taken from the caller; backends compute them from the bytes.
#[derive(Clone, Default)]
pub struct PutOptions {
    pub original_name: Option<String>,
    /// Announced length. May be wrong for streamed sources; a non-zero hint
    /// that disagrees with the bytes read fails the put.
    pub size_hint: Option<u64>,
    pub expiry: Expiry,
    pub delete_key: String,
    pub access_key: Option<String>,
}

impl std::fmt::Debug for PutOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PutOptions")
            .field("original_name", &self.original_name)
            .field("size_hint", &self.size_hint)
            .field("expiry", &self.expiry)
            .field("delete_key", &"[REDACTED]")
            .field("access_key", &self.access_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl PutOptions {
    pub fn new(delete_key: impl Into<String>) -> Self {
        Self {
            delete_key: delete_key.into(),
            ..Self::default()
        }
    }

    /// Options that reproduce an existing object's caller-supplied fields.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            original_name: metadata.original_name.clone(),
            size_hint: Some(metadata.size),
            expiry: metadata.expiry,
            delete_key: metadata.delete_key.clone(),
            access_key: metadata.access_key.clone(),
        }
    }

    #[must_use]
    pub fn with_original_name(mut self, name: impl Into<String>) -> Self {
        self.original_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_size_hint(mut self, size: u64) -> Self {
        self.size_hint = Some(size);
        self
    }

    #[must_use]
    pub fn with_expiry(mut self, expiry: Expiry) -> Self {
        self.expiry = expiry;
        self
    }

    #[must_use]
    pub fn with_access_key(mut self, access_key: impl Into<String>) -> Self {
        self.access_key = Some(access_key.into());
        self
    }

    /// The hint, if one was given and is non-zero.
    pub fn expected_size(&self) -> Option<u64> {
        self.size_hint.filter(|&n| n > 0)
    }
}

/// Operations every blob store implements.
///
/// Implementations are shared across concurrent requests and provide no
/// per-key locking; uniqueness of new keys is the upload pipeline's job.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short backend identifier used in logs.
    fn name(&self) -> &'static str;

    /// Whether the key is present. Absence is not an error.
    async fn exists(&self, key: &StorageKey) -> StorageResult<bool>;

    /// Load metadata. Fails with `NotFound` or `BadMetadata`.
    async fn head(&self, key: &StorageKey) -> StorageResult<Metadata>;

    /// Load metadata and open the bytes.
    async fn get(&self, key: &StorageKey) -> StorageResult<(Metadata, ObjectReader)>;

    /// Consume `body` exactly once and store it with freshly computed
    /// checksum, size and MIME type.
    ///
    /// All-or-nothing: on any error no object is visible under `key`, and a
    /// previous object at `key` (if any) is left as it was.
    async fn put(
        &self,
        key: &StorageKey,
        body: ObjectReader,
        options: PutOptions,
    ) -> StorageResult<Metadata>;

    /// Replace metadata without touching the bytes.
    async fn put_metadata(&self, key: &StorageKey, metadata: &Metadata) -> StorageResult<()>;

    /// Remove bytes and metadata. Deleting a missing key may fail with
    /// `NotFound`; callers must tolerate it.
    async fn delete(&self, key: &StorageKey) -> StorageResult<()>;

    /// Stored byte length.
    async fn size(&self, key: &StorageKey) -> StorageResult<u64>;

    /// Build an HTTP response for the object, honouring a single `Range`
    /// and `If-None-Match` from the request headers.
    async fn serve_file(
        &self,
        key: &StorageKey,
        headers: &HeaderMap,
    ) -> StorageResult<Response<ObjectReader>>;

    /// Enumerate every key once. Meant for cleanup and migration, not for
    /// request paths.
    fn list(&self) -> KeyStream<'_>;
}
