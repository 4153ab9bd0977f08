use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::MetadataDirective;
use futures::StreamExt;
use http::{HeaderMap, Response};
use tracing::{debug, instrument};

use stash_storage::fingerprint::spool;
use stash_storage::serve::{self, ByteRange, RangeSelection, ServePlan};
use stash_storage::{
    KeyStream, Metadata, ObjectReader, PutOptions, StorageBackend, StorageError, StorageKey,
    StorageResult,
};

use crate::auth::build_client;
use crate::config::S3Config;
use crate::error::{is_not_found, storage_error};
use crate::mapping::{self, ObjectAttributes};

/// Object-store implementation of [`StorageBackend`] over the S3 API.
pub struct S3Backend {
    client: aws_sdk_s3::Client,
    config: S3Config,
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl S3Backend {
    /// Create a backend, resolving credentials from the environment.
    pub async fn new(config: S3Config) -> StorageResult<Self> {
        if config.bucket.is_empty() {
            return Err(StorageError::Backend("S3 bucket must be set".into()));
        }
        let client = build_client(&config).await;
        Ok(Self::with_client(config, client))
    }

    /// Create a backend with a pre-built client (useful for testing).
    pub fn with_client(config: S3Config, client: aws_sdk_s3::Client) -> Self {
        Self { client, config }
    }

    fn object_key(&self, key: &StorageKey) -> String {
        self.config.object_key(key.as_str())
    }

    async fn open(
        &self,
        key: &StorageKey,
        range: Option<ByteRange>,
    ) -> StorageResult<aws_sdk_s3::operation::get_object::GetObjectOutput> {
        self.client
            .get_object()
            .bucket(&self.config.bucket)
            .key(self.object_key(key))
            .set_range(range.map(|r| r.to_header()))
            .send()
            .await
            .map_err(|e| storage_error(key, "GetObject", &e))
    }

    fn scratch_file(&self) -> std::io::Result<tempfile::NamedTempFile> {
        let builder = tempfile::Builder::new();
        match &self.config.scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
    }
}

fn into_reader(body: ByteStream) -> ObjectReader {
    Box::pin(body.into_async_read())
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &'static str {
        "s3"
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn exists(&self, key: &StorageKey) -> StorageResult<bool> {
        let result = self
            .client
            .head_object()
            .bucket(&self.config.bucket)
            .key(self.object_key(key))
            .send()
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(storage_error(key, "HeadObject", &e)),
        }
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn head(&self, key: &StorageKey) -> StorageResult<Metadata> {
        let output = self
            .client
            .head_object()
            .bucket(&self.config.bucket)
            .key(self.object_key(key))
            .send()
            .await
            .map_err(|e| storage_error(key, "HeadObject", &e))?;
        mapping::from_object(
            key,
            &ObjectAttributes {
                user_metadata: output.metadata(),
                content_type: output.content_type(),
                e_tag: output.e_tag(),
                content_length: output.content_length(),
                last_modified: output.last_modified().and_then(mapping::smithy_to_chrono),
            },
        )
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn get(&self, key: &StorageKey) -> StorageResult<(Metadata, ObjectReader)> {
        let output = self.open(key, None).await?;
        let metadata = mapping::from_object(
            key,
            &ObjectAttributes {
                user_metadata: output.metadata(),
                content_type: output.content_type(),
                e_tag: output.e_tag(),
                content_length: output.content_length(),
                last_modified: output.last_modified().and_then(mapping::smithy_to_chrono),
            },
        )?;
        Ok((metadata, into_reader(output.body)))
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn put(
        &self,
        key: &StorageKey,
        mut body: ObjectReader,
        options: PutOptions,
    ) -> StorageResult<Metadata> {
        // The upload needs a known length and the metadata up front, so the
        // stream is spooled locally first. The scratch file is removed when
        // `scratch` drops.
        let (std_file, scratch) = self.scratch_file()?.into_parts();
        let mut file = tokio::fs::File::from_std(std_file);
        let digest = spool(&mut body, &mut file).await?;
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

        let metadata = Metadata {
            original_name: options.original_name,
            delete_key: options.delete_key,
            access_key: options.access_key.filter(|k| !k.is_empty()),
            checksum: digest.checksum,
            mimetype: digest.mimetype,
            size: digest.size,
            modified: chrono::Utc::now(),
            expiry: options.expiry,
            archive_files: Vec::new(),
        };

        let stream = ByteStream::from_path(&scratch)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to read scratch file: {e}")))?;
        let output = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(self.object_key(key))
            .body(stream)
            .content_length(i64::try_from(metadata.size).unwrap_or(i64::MAX))
            .content_type(&metadata.mimetype)
            .content_disposition(mapping::content_disposition(key))
            .set_metadata(Some(mapping::to_object_metadata(&metadata)))
            .send()
            .await
            .map_err(|e| storage_error(key, "PutObject", &e))?;
        debug!(key = %key, size = metadata.size, e_tag = ?output.e_tag(), "stored object");

        // `modified` must come from S3's LastModified so the returned ETag
        // matches the one `serve_file` sends.
        self.head(key).await
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn put_metadata(&self, key: &StorageKey, metadata: &Metadata) -> StorageResult<()> {
        let object_key = self.object_key(key);
        self.client
            .copy_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .copy_source(mapping::copy_source(&self.config.bucket, &object_key))
            .metadata_directive(MetadataDirective::Replace)
            .content_type(&metadata.mimetype)
            .content_disposition(mapping::content_disposition(key))
            .set_metadata(Some(mapping::to_object_metadata(metadata)))
            .send()
            .await
            .map_err(|e| storage_error(key, "CopyObject", &e))?;
        Ok(())
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn delete(&self, key: &StorageKey) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(self.object_key(key))
            .send()
            .await
            .map_err(|e| storage_error(key, "DeleteObject", &e))?;
        debug!(key = %key, "deleted object");
        Ok(())
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn size(&self, key: &StorageKey) -> StorageResult<u64> {
        let output = self
            .client
            .head_object()
            .bucket(&self.config.bucket)
            .key(self.object_key(key))
            .send()
            .await
            .map_err(|e| storage_error(key, "HeadObject", &e))?;
        Ok(output
            .content_length()
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0))
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn serve_file(
        &self,
        key: &StorageKey,
        headers: &HeaderMap,
    ) -> StorageResult<Response<ObjectReader>> {
        let metadata = self.head(key).await?;
        match serve::plan(&metadata, headers) {
            ServePlan::NotModified => serve::not_modified(&metadata),
            ServePlan::Body(RangeSelection::Unsatisfiable) => serve::unsatisfiable(&metadata),
            ServePlan::Body(RangeSelection::Full) => {
                let output = self.open(key, None).await?;
                serve::content(&metadata, None, into_reader(output.body))
            }
            ServePlan::Body(RangeSelection::Partial(range)) => {
                let output = self.open(key, Some(range)).await?;
                serve::content(&metadata, Some(range), into_reader(output.body))
            }
        }
    }

    fn list(&self) -> KeyStream<'_> {
        let pages = self
            .client
            .list_objects_v2()
            .bucket(&self.config.bucket)
            .prefix(&self.config.prefix)
            .into_paginator()
            .items()
            .send();

        futures::stream::unfold(pages, |mut pages| async move {
            let item = pages.next().await?;
            Some((item, pages))
        })
        .filter_map(move |item| async move {
            match item {
                Ok(object) => {
                    let name = self.config.strip_prefix(object.key()?)?;
                    StorageKey::new(name).ok().map(Ok)
                }
                Err(e) => {
                    let message = aws_sdk_s3::error::DisplayErrorContext(&e).to_string();
                    Some(Err(StorageError::Backend(format!(
                        "ListObjectsV2 failed: {message}"
                    ))))
                }
            }
        })
        .boxed()
    }
}
