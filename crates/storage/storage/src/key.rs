use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Externally visible name of a stored object (`barename.extension`).
///
/// Keys are single path segments: no separators, no NUL, and no leading
/// dot, since both backends reserve dotfiles for temporary data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorageKey(String);

impl StorageKey {
    /// Validate and wrap a key.
    pub fn new(key: impl Into<String>) -> Result<Self, StorageError> {
        let key = key.into();
        if key.is_empty() {
            return Err(StorageError::InvalidKey("key is empty".into()));
        }
        if key.starts_with('.') {
            return Err(StorageError::InvalidKey(format!(
                "key '{key}' starts with a dot"
            )));
        }
        if key.contains(['/', '\\', '\0']) {
            return Err(StorageError::InvalidKey(format!(
                "key '{key}' contains a path separator or NUL"
            )));
        }
        Ok(Self(key))
    }

    /// Build a key from its two halves.
    pub fn from_parts(barename: &str, extension: &str) -> Result<Self, StorageError> {
        Self::new(format!("{barename}.{extension}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Everything after the first dot, if any.
    pub fn extension(&self) -> Option<&str> {
        self.0.split_once('.').map(|(_, ext)| ext)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for StorageKey {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for StorageKey {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StorageKey> for String {
    fn from(key: StorageKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        let key = StorageKey::new("report.tar.gz").unwrap();
        assert_eq!(key.as_str(), "report.tar.gz");
        assert_eq!(key.extension(), Some("tar.gz"));
        assert_eq!(key.to_string(), "report.tar.gz");
    }

    #[test]
    fn rejects_traversal_and_hidden_names() {
        for bad in ["", ".", "..", ".hidden", "a/b", "..\\x", "nul\0.txt"] {
            assert!(
                matches!(StorageKey::new(bad), Err(StorageError::InvalidKey(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn from_parts_joins_with_dot() {
        let key = StorageKey::from_parts("abc123", "png").unwrap();
        assert_eq!(key.as_str(), "abc123.png");
    }

    #[test]
    fn serde_validates() {
        let ok: StorageKey = serde_json::from_str("\"x.txt\"").unwrap();
        assert_eq!(ok.as_str(), "x.txt");
        assert!(serde_json::from_str::<StorageKey>("\"../x\"").is_err());
    }
}
