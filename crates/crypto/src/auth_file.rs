use std::path::Path;

use tracing::debug;

use crate::{KeyHashError, check_list, is_valid_hash};

/// Hashed admin keys loaded from a newline-separated auth file.
#[derive(Clone, Default)]
pub struct AuthKeys {
    hashes: Vec<String>,
}

impl std::fmt::Debug for AuthKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthKeys")
            .field("count", &self.hashes.len())
            .finish()
    }
}

impl AuthKeys {
    /// Read one hash per line, ignoring blank lines.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, KeyHashError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| KeyHashError::AuthFile {
            path: path.display().to_string(),
            source,
        })?;
        let keys = Self::parse(&text)?;
        debug!(path = %path.display(), count = keys.len(), "loaded auth keys");
        Ok(keys)
    }

    /// Parse auth file contents. Every non-blank line must be a valid hash.
    pub fn parse(text: &str) -> Result<Self, KeyHashError> {
        let mut hashes = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if !is_valid_hash(line) {
                return Err(KeyHashError::InvalidAuthEntry { line: idx + 1 });
            }
            hashes.push(line.to_owned());
        }
        Ok(Self { hashes })
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Whether `presented` matches any loaded key.
    pub fn verify(&self, presented: &str) -> Result<bool, KeyHashError> {
        check_list(&self.hashes, presented)
    }
}
