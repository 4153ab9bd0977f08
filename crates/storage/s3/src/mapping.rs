//! Translation between [`Metadata`] and S3 user-metadata.
//!
//! Credentials and the original name are percent-encoded, since user
//! metadata values must be plain ASCII.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use stash_storage::{Expiry, Metadata, StorageError, StorageKey, StorageResult};

pub(crate) const DELETE_KEY: &str = "deletekey";
pub(crate) const ACCESS_KEY: &str = "accesskey";
pub(crate) const EXPIRY: &str = "expiry";
pub(crate) const ORIGINAL_NAME: &str = "originalname";
pub(crate) const SHA256SUM: &str = "sha256sum";
pub(crate) const LEGACY_CHECKSUM: &str = "checksum";
pub(crate) const MIMETYPE: &str = "mimetype";

const OCTET_STREAM: &str = "application/octet-stream";

/// Characters kept verbatim in a `CopySource` header: unreserved plus `/`.
const COPY_SOURCE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn encode(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

fn decode(key: &StorageKey, field: &str, value: &str) -> StorageResult<String> {
    percent_decode_str(value)
        .decode_utf8()
        .map(|v| v.into_owned())
        .map_err(|e| StorageError::bad_metadata(key, format!("{field}: {e}")))
}

/// `bucket/object-key` for a copy-in-place request.
pub(crate) fn copy_source(bucket: &str, object_key: &str) -> String {
    utf8_percent_encode(&format!("{bucket}/{object_key}"), COPY_SOURCE).to_string()
}

/// `Content-Disposition` value so browsers download rather than render.
pub(crate) fn content_disposition(key: &StorageKey) -> String {
    format!("attachment; filename=\"{}\"", key.as_str().replace('"', ""))
}

/// User-metadata for an object. Size, mtime and archive members are not
/// stored here: S3 tracks the first two itself and the last is always empty.
pub(crate) fn to_object_metadata(metadata: &Metadata) -> HashMap<String, String> {
    let mut map = HashMap::new();
    map.insert(DELETE_KEY.to_owned(), encode(&metadata.delete_key));
    if let Some(access_key) = metadata.access_key.as_deref().filter(|k| !k.is_empty()) {
        map.insert(ACCESS_KEY.to_owned(), encode(access_key));
    }
    map.insert(
        EXPIRY.to_owned(),
        metadata
            .expiry
            .to_rfc3339()
            .unwrap_or_else(|| "0".to_owned()),
    );
    if let Some(name) = &metadata.original_name {
        map.insert(ORIGINAL_NAME.to_owned(), encode(name));
    }
    map.insert(SHA256SUM.to_owned(), metadata.checksum.clone());
    map.insert(MIMETYPE.to_owned(), metadata.mimetype.clone());
    map
}

/// Attributes common to `HeadObject` and `GetObject` responses.
#[derive(Debug, Default)]
pub(crate) struct ObjectAttributes<'a> {
    pub user_metadata: Option<&'a HashMap<String, String>>,
    pub content_type: Option<&'a str>,
    pub e_tag: Option<&'a str>,
    pub content_length: Option<i64>,
    pub last_modified: Option<DateTime<Utc>>,
}

pub(crate) fn smithy_to_chrono(ts: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())
}

/// Rebuild [`Metadata`] from an object's attributes.
pub(crate) fn from_object(key: &StorageKey, attrs: &ObjectAttributes<'_>) -> StorageResult<Metadata> {
    let empty = HashMap::new();
    let user = attrs.user_metadata.unwrap_or(&empty);
    let field = |name: &str| user.get(name).map(String::as_str);

    let delete_key = field(DELETE_KEY)
        .ok_or_else(|| StorageError::bad_metadata(key, "missing deletekey"))
        .and_then(|v| decode(key, DELETE_KEY, v))?;
    let access_key = field(ACCESS_KEY)
        .map(|v| decode(key, ACCESS_KEY, v))
        .transpose()?
        .filter(|k| !k.is_empty());
    let original_name = field(ORIGINAL_NAME)
        .map(|v| decode(key, ORIGINAL_NAME, v))
        .transpose()?;
    let expiry = match field(EXPIRY) {
        Some(raw) => Expiry::parse(raw).map_err(|e| StorageError::bad_metadata(key, e))?,
        None => Expiry::Never,
    };
    let checksum = field(SHA256SUM)
        .or_else(|| field(LEGACY_CHECKSUM))
        .or(attrs.e_tag)
        .unwrap_or_default()
        .trim_matches('"')
        .to_owned();
    let mimetype = field(MIMETYPE)
        .or(attrs.content_type)
        .unwrap_or(OCTET_STREAM)
        .to_owned();
    let size = attrs
        .content_length
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or(0);

    Ok(Metadata {
        original_name,
        delete_key,
        access_key,
        checksum,
        mimetype,
        size,
        modified: attrs.last_modified.unwrap_or_else(Utc::now),
        expiry,
        archive_files: Vec::new(),
    })
}
