use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stash_storage::metadata::unix_seconds;
use stash_storage::{Expiry, Metadata};

/// On-disk JSON metadata record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Sidecar {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    pub delete_key: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(alias = "checksum")]
    pub sha256sum: String,
    pub mimetype: String,
    pub size: i64,
    #[serde(with = "unix_seconds", default)]
    pub expiry: Expiry,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub archive_files: Vec<String>,
}

impl Sidecar {
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            original_name: metadata.original_name.clone(),
            delete_key: metadata.delete_key.clone(),
            access_key: metadata.access_key.clone().unwrap_or_default(),
            sha256sum: metadata.checksum.clone(),
            mimetype: metadata.mimetype.clone(),
            size: i64::try_from(metadata.size).unwrap_or(i64::MAX),
            expiry: metadata.expiry,
            archive_files: metadata.archive_files.clone(),
        }
    }

    /// Combine with the attributes only the filesystem knows.
    pub fn into_metadata(self, size: u64, modified: DateTime<Utc>) -> Metadata {
        Metadata {
            original_name: self.original_name,
            delete_key: self.delete_key,
            access_key: Some(self.access_key).filter(|k| !k.is_empty()),
            checksum: self.sha256sum,
            mimetype: self.mimetype,
            size,
            modified,
            expiry: self.expiry,
            archive_files: self.archive_files,
        }
    }
}
