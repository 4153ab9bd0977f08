use serde::Deserialize;
use stash_storage_local::LocalConfig;
use stash_storage_s3::S3Config;

/// Configuration for the storage backend.
///
/// Settings for both backends share the `[storage]` table, so a migration
/// between them can build either one from the same config.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Which backend to use: `"local"` or `"s3"`.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// `files_path` and `meta_path` for the local backend.
    #[serde(flatten)]
    pub local: LocalConfig,

    /// `bucket`, `region`, `endpoint_url`, `prefix` and the rest of the
    /// S3 settings.
    #[serde(flatten)]
    pub s3: S3Config,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            local: LocalConfig::default(),
            s3: S3Config::default(),
        }
    }
}

fn default_backend() -> String {
    "local".to_owned()
}
