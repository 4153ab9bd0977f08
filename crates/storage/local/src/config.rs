use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Directories used by the local backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Where object bytes live.
    pub files_path: PathBuf,
    /// Where JSON metadata sidecars live. Must differ from `files_path`.
    pub meta_path: PathBuf,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            files_path: PathBuf::from("data/files"),
            meta_path: PathBuf::from("data/meta"),
        }
    }
}

impl LocalConfig {
    pub fn new(files_path: impl Into<PathBuf>, meta_path: impl Into<PathBuf>) -> Self {
        Self {
            files_path: files_path.into(),
            meta_path: meta_path.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let cfg = LocalConfig::default();
        assert_eq!(cfg.files_path, PathBuf::from("data/files"));
        assert_eq!(cfg.meta_path, PathBuf::from("data/meta"));
    }
}
