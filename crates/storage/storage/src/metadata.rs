use std::time::Duration;

use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// When a stored object stops being served.
///
/// `Never` is an explicit variant rather than a magic timestamp, so an
/// object that expired at the epoch is still distinguishable from one that
/// never expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<DateTime<Utc>>", into = "Option<DateTime<Utc>>")]
pub enum Expiry {
    #[default]
    Never,
    At(DateTime<Utc>),
}

impl Expiry {
    /// Expiry `ttl` after `now`. Saturates to `Never` if the instant would
    /// not be representable.
    pub fn after(now: DateTime<Utc>, ttl: Duration) -> Self {
        chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .map_or(Self::Never, Self::At)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// `true` once `now` is strictly past a set expiry.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self {
            Self::Never => false,
            Self::At(ts) => now > *ts,
        }
    }

    /// Decode the Unix-seconds encoding, where `0` means never.
    pub fn from_unix(secs: i64) -> Option<Self> {
        if secs == 0 {
            return Some(Self::Never);
        }
        DateTime::from_timestamp(secs, 0).map(Self::At)
    }

    /// Unix-seconds encoding, `0` for never.
    pub fn unix(&self) -> i64 {
        match self {
            Self::Never => 0,
            Self::At(ts) => ts.timestamp(),
        }
    }

    /// RFC3339 encoding, `None` for never.
    pub fn to_rfc3339(&self) -> Option<String> {
        match self {
            Self::Never => None,
            Self::At(ts) => Some(ts.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }

    /// Parse either encoding: an integer number of Unix seconds or an
    /// RFC3339 timestamp. Empty input and the year-one zero timestamp some
    /// writers emit both mean never.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Self::Never);
        }
        if let Ok(secs) = raw.parse::<i64>() {
            return Self::from_unix(secs).ok_or_else(|| format!("expiry {secs} is out of range"));
        }
        let ts = DateTime::parse_from_rfc3339(raw)
            .map_err(|e| format!("invalid expiry '{raw}': {e}"))?
            .with_timezone(&Utc);
        if ts.year() <= 1 {
            return Ok(Self::Never);
        }
        Ok(Self::At(ts))
    }
}

impl From<Option<DateTime<Utc>>> for Expiry {
    fn from(value: Option<DateTime<Utc>>) -> Self {
        value.map_or(Self::Never, Self::At)
    }
}

impl From<Expiry> for Option<DateTime<Utc>> {
    fn from(value: Expiry) -> Self {
        match value {
            Expiry::Never => None,
            Expiry::At(ts) => Some(ts),
        }
    }
}

/// Serde adapter writing an [`Expiry`] as Unix seconds and reading either
/// Unix seconds or an RFC3339 string.
pub mod unix_seconds {
    use serde::{Deserialize, Deserializer, Serializer, de};

    use super::Expiry;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(i64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(expiry: &Expiry, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(expiry.unix())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Expiry, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Secs(secs) => Expiry::from_unix(secs)
                .ok_or_else(|| de::Error::custom(format!("expiry {secs} is out of range"))),
            Raw::Text(text) => Expiry::parse(&text).map_err(de::Error::custom),
        }
    }
}

/// Everything known about a stored object besides its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    /// Filename the client supplied, when retained by policy.
    pub original_name: Option<String>,
    /// Bearer token required to delete or overwrite the object.
    pub delete_key: String,
    /// Bearer token required to read the object; `None` means public.
    pub access_key: Option<String>,
    /// Hex SHA-256 of the stored bytes.
    pub checksum: String,
    pub mimetype: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub expiry: Expiry,
    /// Member paths for recognized archive types, sorted.
    pub archive_files: Vec<String>,
}

impl Metadata {
    pub fn is_expired(&self) -> bool {
        self.expiry.is_expired()
    }

    pub fn is_public(&self) -> bool {
        self.access_key.as_deref().is_none_or(str::is_empty)
    }

    /// Whether `presented` authorizes deleting or overwriting this object.
    /// Per-object credentials are plaintext bearer tokens.
    pub fn delete_key_matches(&self, presented: &str) -> bool {
        !presented.is_empty() && self.delete_key == presented
    }

    /// Whether `presented` authorizes reading this object.
    pub fn access_key_matches(&self, presented: Option<&str>) -> bool {
        match self.access_key.as_deref() {
            None | Some("") => true,
            Some(required) => presented == Some(required),
        }
    }

    /// Strong validator: `"<checksum>-<mtime base36>"`.
    pub fn etag(&self) -> String {
        let secs = u64::try_from(self.modified.timestamp()).unwrap_or(0);
        format!("\"{}-{}\"", self.checksum, base36(secs))
    }
}

fn base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_owned();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn sample() -> Metadata {
        Metadata {
            original_name: Some("Holiday Photo.JPG".into()),
            delete_key: "del".into(),
            access_key: None,
            checksum: "abc".into(),
            mimetype: "image/jpeg".into(),
            size: 3,
            modified: ts(1_700_000_000),
            expiry: Expiry::Never,
            archive_files: Vec::new(),
        }
    }

    #[test]
    fn never_does_not_expire() {
        assert!(!Expiry::Never.is_expired_at(ts(i64::from(i32::MAX))));
    }

    #[test]
    fn expires_strictly_after_deadline() {
        let start = ts(1_000_000);
        let expiry = Expiry::after(start, Duration::from_secs(60));
        assert!(!expiry.is_expired_at(ts(1_000_059)));
        assert!(!expiry.is_expired_at(ts(1_000_060)));
        assert!(expiry.is_expired_at(ts(1_000_061)));
    }

    #[test]
    fn epoch_expiry_is_not_never() {
        let epoch = Expiry::At(ts(0));
        assert!(epoch.is_expired_at(ts(1)));
        assert_ne!(epoch, Expiry::Never);
    }

    #[test]
    fn unix_zero_is_never() {
        assert_eq!(Expiry::from_unix(0), Some(Expiry::Never));
        assert_eq!(Expiry::Never.unix(), 0);
        assert_eq!(Expiry::from_unix(1_700_000_000).unwrap().unix(), 1_700_000_000);
    }

    #[test]
    fn parse_accepts_both_encodings() {
        assert_eq!(Expiry::parse("1700000000").unwrap(), Expiry::At(ts(1_700_000_000)));
        assert_eq!(
            Expiry::parse("2023-11-14T22:13:20Z").unwrap(),
            Expiry::At(ts(1_700_000_000))
        );
        assert_eq!(Expiry::parse("0").unwrap(), Expiry::Never);
        assert_eq!(Expiry::parse("").unwrap(), Expiry::Never);
        assert_eq!(Expiry::parse("0001-01-01T00:00:00Z").unwrap(), Expiry::Never);
        assert!(Expiry::parse("tomorrow").is_err());
    }

    #[test]
    fn rfc3339_roundtrip() {
        let expiry = Expiry::At(ts(1_700_000_000));
        let text = expiry.to_rfc3339().unwrap();
        assert_eq!(text, "2023-11-14T22:13:20Z");
        assert_eq!(Expiry::parse(&text).unwrap(), expiry);
        assert_eq!(Expiry::Never.to_rfc3339(), None);
    }

    #[test]
    fn unix_seconds_adapter_is_lenient() {
        #[derive(Deserialize, Serialize)]
        struct Wrapper {
            #[serde(with = "unix_seconds")]
            expiry: Expiry,
        }

        let w: Wrapper = serde_json::from_str(r#"{"expiry":1700000000}"#).unwrap();
        assert_eq!(w.expiry, Expiry::At(ts(1_700_000_000)));
        let w: Wrapper = serde_json::from_str(r#"{"expiry":"2023-11-14T22:13:20Z"}"#).unwrap();
        assert_eq!(w.expiry, Expiry::At(ts(1_700_000_000)));
        let w: Wrapper = serde_json::from_str(r#"{"expiry":0}"#).unwrap();
        assert_eq!(w.expiry, Expiry::Never);
        assert_eq!(serde_json::to_string(&w).unwrap(), r#"{"expiry":0}"#);
    }

    #[test]
    fn etag_uses_checksum_and_base36_mtime() {
        let meta = sample();
        assert_eq!(meta.etag(), format!("\"abc-{}\"", base36(1_700_000_000)));
        assert_eq!(base36(0), "0");
        assert_eq!(base36(35), "z");
        assert_eq!(base36(36), "10");
    }

    #[test]
    fn credential_checks() {
        let mut meta = sample();
        assert!(meta.is_public());
        assert!(meta.access_key_matches(None));
        assert!(meta.delete_key_matches("del"));
        assert!(!meta.delete_key_matches(""));
        assert!(!meta.delete_key_matches("nope"));

        meta.access_key = Some("secret".into());
        assert!(!meta.is_public());
        assert!(!meta.access_key_matches(None));
        assert!(!meta.access_key_matches(Some("guess")));
        assert!(meta.access_key_matches(Some("secret")));
    }
}
