use std::path::PathBuf;

use serde::Deserialize;

/// Location of the hashed admin keys.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Newline-separated list of `argon2id$...` hashes.
    pub file: Option<PathBuf>,
}
