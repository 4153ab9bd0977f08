use std::path::PathBuf;
use std::time::Duration;

use super::*;

#[test]
fn empty_config_uses_defaults() {
    let config = StashConfig::parse("").unwrap();
    assert_eq!(config.storage.backend, "local");
    assert_eq!(config.storage.local.files_path, PathBuf::from("data/files"));
    assert_eq!(config.storage.local.meta_path, PathBuf::from("data/meta"));
    assert_eq!(config.storage.s3.region, "us-east-1");
    assert_eq!(config.upload, UploadPolicy::default());
    assert_eq!(config.cleanup.every_seconds, 3600);
    assert!(config.auth.file.is_none());
    assert_eq!(config.logging.level, "info");
}

#[test]
fn full_config() {
    let toml = r#"
        [storage]
        backend = "s3"
        files_path = "/srv/stash/files"
        meta_path = "/srv/stash/meta"
        bucket = "uploads"
        region = "eu-west-1"
        endpoint_url = "http://localhost:9000"
        prefix = "stash/"
        force_path_style = true

        [upload]
        max_size = 1048576
        max_expiry_seconds = 86400
        force_random_filename = true
        keep_original_name = false
        reserved_names = ["style.css"]

        [cleanup]
        every_seconds = 0

        [auth]
        file = "/etc/stash/authfile"

        [logging]
        level = "debug"
    "#;

    let config = StashConfig::parse(toml).unwrap();
    assert_eq!(config.storage.backend, "s3");
    assert_eq!(config.storage.local.files_path, PathBuf::from("/srv/stash/files"));
    assert_eq!(config.storage.s3.bucket, "uploads");
    assert_eq!(config.storage.s3.region, "eu-west-1");
    assert_eq!(config.storage.s3.endpoint_url.as_deref(), Some("http://localhost:9000"));
    assert_eq!(config.storage.s3.prefix, "stash/");
    assert!(config.storage.s3.force_path_style);

    assert_eq!(config.upload.max_size, 1_048_576);
    assert_eq!(config.upload.max_expiry_seconds, 86_400);
    assert!(config.upload.force_random_filename);
    assert!(!config.upload.keep_original_name);
    assert_eq!(config.upload.reserved_names, vec!["style.css"]);

    assert_eq!(config.cleanup.interval(), None);
    assert_eq!(config.auth.file, Some(PathBuf::from("/etc/stash/authfile")));
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn cleanup_interval() {
    let config: CleanupConfig = toml::from_str("every_seconds = 90").unwrap();
    assert_eq!(config.interval(), Some(Duration::from_secs(90)));
}

#[test]
fn invalid_config_is_a_config_error() {
    let err = StashConfig::parse("[storage]\nbackend = 3").unwrap_err();
    assert!(matches!(err, crate::error::ServerError::Config(_)));
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = StashConfig::load(dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.storage.backend, "local");
}

#[test]
fn load_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stash.toml");
    std::fs::write(&path, "[upload]\nmax_size = 10\n").unwrap();
    let config = StashConfig::load(&path).unwrap();
    assert_eq!(config.upload.max_size, 10);
}
