mod auth;
mod cleanup;
mod logging;
mod storage;

#[cfg(test)]
mod tests;

pub use auth::*;
pub use cleanup::*;
pub use logging::*;
pub use storage::*;

use std::path::Path;

use serde::Deserialize;
use stash_upload::UploadPolicy;

use crate::error::ServerError;

/// Top-level configuration for stash, loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct StashConfig {
    /// Storage backend selection and settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Upload limits and naming rules.
    #[serde(default)]
    pub upload: UploadPolicy,
    /// Expiry sweep schedule.
    #[serde(default)]
    pub cleanup: CleanupConfig,
    /// Admin key file.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Log filter defaults.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StashConfig {
    /// Parse a config document.
    pub fn parse(text: &str) -> Result<Self, ServerError> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Load `path`, or the defaults if it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let path = path.as_ref();
        if !path.exists() {
            return Self::parse("");
        }
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents).map_err(|e| match e {
            ServerError::Config(msg) => ServerError::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }
}
