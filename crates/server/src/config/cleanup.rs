use std::time::Duration;

use serde::Deserialize;

/// Schedule for the periodic expiry sweep.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Seconds between sweeps in daemon mode. `0` leaves expiry to reads.
    #[serde(default = "default_every_seconds")]
    pub every_seconds: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            every_seconds: default_every_seconds(),
        }
    }
}

impl CleanupConfig {
    /// Sweep interval, if periodic sweeping is enabled.
    pub fn interval(&self) -> Option<Duration> {
        (self.every_seconds > 0).then(|| Duration::from_secs(self.every_seconds))
    }
}

fn default_every_seconds() -> u64 {
    3600
}
