use std::time::Duration;

use chrono::{DateTime, Utc};
use stash_storage::Expiry;

/// Lifetime to apply to an upload, or `None` for no expiry.
///
/// A zero or missing request falls back to the instance maximum. A request
/// longer than a configured maximum is clamped to it. `max_secs == 0` means
/// no maximum.
pub fn resolve_ttl(requested: Option<Duration>, max_secs: u64) -> Option<Duration> {
    let requested = requested.filter(|ttl| !ttl.is_zero());
    let max = (max_secs > 0).then(|| Duration::from_secs(max_secs));
    match (requested, max) {
        (Some(ttl), Some(max)) if ttl > max => Some(max),
        (Some(ttl), _) => Some(ttl),
        (None, max) => max,
    }
}

/// Absolute expiry for an upload stored at `now`.
pub fn resolve_expiry(now: DateTime<Utc>, requested: Option<Duration>, max_secs: u64) -> Expiry {
    resolve_ttl(requested, max_secs).map_or(Expiry::Never, |ttl| Expiry::after(now, ttl))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn unlimited_instance() {
        assert_eq!(resolve_ttl(None, 0), None);
        assert_eq!(resolve_ttl(Some(Duration::ZERO), 0), None);
        assert_eq!(resolve_ttl(Some(HOUR), 0), Some(HOUR));
    }

    #[test]
    fn capped_instance() {
        assert_eq!(resolve_ttl(None, 3600), Some(HOUR));
        assert_eq!(resolve_ttl(Some(Duration::ZERO), 3600), Some(HOUR));
        assert_eq!(resolve_ttl(Some(HOUR * 2), 3600), Some(HOUR));
        assert_eq!(resolve_ttl(Some(Duration::from_secs(60)), 3600), Some(Duration::from_secs(60)));
    }

    #[test]
    fn absolute_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(resolve_expiry(now, None, 0), Expiry::Never);
        assert_eq!(
            resolve_expiry(now, Some(HOUR * 5), 3600),
            Expiry::At(Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap())
        );
    }
}
