use serde::{Deserialize, Serialize};

/// Names that would shadow well-known paths served by the front end.
const DENYLIST: &[&str] = &["favicon.ico", "crossdomain.xml"];

/// Instance-wide upload limits and naming rules.
///
/// Deserialized from the `[upload]` section of the server config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadPolicy {
    /// Maximum accepted body size in bytes. `0` means unlimited.
    pub max_size: u64,
    /// Maximum lifetime in seconds. `0` means objects may live forever.
    pub max_expiry_seconds: u64,
    /// Treat every inbound name as colliding so each upload gets a random
    /// barename.
    pub force_random_filename: bool,
    /// Record the client's filename in the object metadata.
    pub keep_original_name: bool,
    /// Keys reserved for static assets.
    pub reserved_names: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_size: 4 * 1024 * 1024 * 1024,
            max_expiry_seconds: 0,
            force_random_filename: false,
            keep_original_name: true,
            reserved_names: vec!["robots.txt".to_owned()],
        }
    }
}

impl UploadPolicy {
    #[must_use]
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_size = bytes;
        self
    }

    #[must_use]
    pub fn with_max_expiry_seconds(mut self, secs: u64) -> Self {
        self.max_expiry_seconds = secs;
        self
    }

    #[must_use]
    pub fn with_force_random_filename(mut self, force: bool) -> Self {
        self.force_random_filename = force;
        self
    }

    #[must_use]
    pub fn with_keep_original_name(mut self, keep: bool) -> Self {
        self.keep_original_name = keep;
        self
    }

    #[must_use]
    pub fn with_reserved_names(mut self, names: Vec<String>) -> Self {
        self.reserved_names = names;
        self
    }

    /// Size ceiling for the body, if any.
    pub fn size_limit(&self) -> Option<u64> {
        (self.max_size > 0).then_some(self.max_size)
    }

    /// Whether `key` may not be used for an upload.
    pub fn is_prohibited(&self, key: &str) -> bool {
        key.starts_with("index.")
            || DENYLIST.contains(&key)
            || self.reserved_names.iter().any(|name| name == key)
    }
}
