use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Connection and layout settings for the S3 backend.
///
/// Works against AWS itself or any S3-compatible endpoint (`MinIO`,
/// `LocalStack`, R2) through `endpoint_url` and `force_path_style`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    /// Bucket holding every object.
    pub bucket: String,

    /// AWS region (e.g. `"us-east-1"`).
    pub region: String,

    /// Optional endpoint URL override for S3-compatible services.
    pub endpoint_url: Option<String>,

    /// Prefix prepended to every object key (e.g. `"uploads/"`).
    pub prefix: String,

    /// Address buckets as `endpoint/bucket` instead of `bucket.endpoint`.
    pub force_path_style: bool,

    /// Optional IAM role ARN to assume via STS.
    pub role_arn: Option<String>,

    /// Optional STS session name (defaults to `"stash-storage"`).
    pub session_name: Option<String>,

    /// Optional external ID for cross-account trust policies.
    pub external_id: Option<String>,

    /// Directory for upload scratch files. Defaults to the system temp dir.
    pub scratch_dir: Option<PathBuf>,
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("prefix", &self.prefix)
            .field("force_path_style", &self.force_path_style)
            .field("role_arn", &self.role_arn.as_ref().map(|_| "[REDACTED]"))
            .field("session_name", &self.session_name)
            .field("external_id", &self.external_id.as_ref().map(|_| "[REDACTED]"))
            .field("scratch_dir", &self.scratch_dir)
            .finish()
    }
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: "us-east-1".to_owned(),
            endpoint_url: None,
            prefix: String::new(),
            force_path_style: false,
            role_arn: None,
            session_name: None,
            external_id: None,
            scratch_dir: None,
        }
    }
}

impl S3Config {
    /// Create a config for `bucket` in `region`.
    pub fn new(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_force_path_style(mut self, enabled: bool) -> Self {
        self.force_path_style = enabled;
        self
    }

    #[must_use]
    pub fn with_role_arn(mut self, role_arn: impl Into<String>) -> Self {
        self.role_arn = Some(role_arn.into());
        self
    }

    #[must_use]
    pub fn with_session_name(mut self, session_name: impl Into<String>) -> Self {
        self.session_name = Some(session_name.into());
        self
    }

    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Full object key for a storage key.
    pub(crate) fn object_key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    /// Storage key for a full object key, if it lives under the prefix.
    pub(crate) fn strip_prefix<'a>(&self, object_key: &'a str) -> Option<&'a str> {
        object_key.strip_prefix(self.prefix.as_str())
    }
}
