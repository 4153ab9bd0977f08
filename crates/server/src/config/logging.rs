use serde::Deserialize;

/// Log output defaults. `RUST_LOG` takes precedence when set.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (e.g. `"info"` or `"stash_upload=debug,info"`).
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_owned()
}
