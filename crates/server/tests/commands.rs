use std::sync::Arc;
use std::time::Duration;

use stash_server::commands::{
    self, ObjectInfo, UploadArgs, cleanup_every, cleanup_once, delete_object, object_info,
};
use stash_server::config::StashConfig;
use stash_server::error::ServerError;
use stash_server::storage_factory::create_storage;
use stash_storage::io::reader_from_bytes;
use stash_storage::{Expiry, PutOptions, StorageBackend, StorageKey};
use stash_upload::{UploadError, Uploader};

fn config_for(dir: &tempfile::TempDir) -> StashConfig {
    let toml = format!(
        "[storage]\nfiles_path = {:?}\nmeta_path = {:?}\n\n[upload]\nmax_expiry_seconds = 3600\n",
        dir.path().join("files"),
        dir.path().join("meta"),
    );
    StashConfig::parse(&toml).unwrap()
}

async fn backend_for(dir: &tempfile::TempDir) -> (StashConfig, Arc<dyn StorageBackend>) {
    let config = config_for(dir);
    let backend = create_storage(&config.storage).await.unwrap();
    (config, backend)
}

#[tokio::test]
async fn upload_info_delete() {
    let dir = tempfile::tempdir().unwrap();
    let (config, backend) = backend_for(&dir).await;
    let uploader = Uploader::new(Arc::clone(&backend), config.upload);

    let source = dir.path().join("Quarterly Report.txt");
    std::fs::write(&source, b"numbers go up").unwrap();

    let upload = commands::upload_file(
        &uploader,
        UploadArgs {
            path: source,
            delete_key: Some("owner-key".into()),
            ..UploadArgs::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(upload.key.as_str(), "quarterly-report.txt");
    assert_eq!(upload.metadata.size, 13);
    assert!(matches!(upload.metadata.expiry, Expiry::At(_)));

    let metadata = object_info(backend.as_ref(), "quarterly-report.txt").await.unwrap();
    assert_eq!(metadata.original_name.as_deref(), Some("Quarterly Report.txt"));
    let shown = serde_json::to_value(ObjectInfo::new(&upload.key, &metadata)).unwrap();
    assert_eq!(shown["key"], "quarterly-report.txt");
    assert_eq!(shown["public"], true);
    assert!(shown.get("delete_key").is_none());
    assert!(shown.get("archive_files").is_none());

    let err = delete_object(backend.as_ref(), "quarterly-report.txt", "guess")
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::Upload(UploadError::BadDeleteKey)));

    delete_object(backend.as_ref(), "quarterly-report.txt", "owner-key")
        .await
        .unwrap();
    let err = object_info(backend.as_ref(), "quarterly-report.txt")
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::Storage(ref e) if e.is_not_found()));
}

#[tokio::test]
async fn upload_with_explicit_name() {
    let dir = tempfile::tempdir().unwrap();
    let (config, backend) = backend_for(&dir).await;
    let uploader = Uploader::new(backend, config.upload);

    let source = dir.path().join("scratch.bin");
    std::fs::write(&source, b"hello there").unwrap();
    let upload = commands::upload_file(
        &uploader,
        UploadArgs {
            path: source,
            name: Some("greeting.txt".into()),
            ..UploadArgs::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(upload.key.as_str(), "greeting.txt");
}

#[tokio::test]
async fn info_rejects_invalid_key() {
    let dir = tempfile::tempdir().unwrap();
    let (_, backend) = backend_for(&dir).await;
    let err = object_info(backend.as_ref(), "../etc/passwd").await.unwrap_err();
    assert!(matches!(err, ServerError::Storage(_)));
}

async fn put_expired(backend: &dyn StorageBackend, name: &str) {
    backend
        .put(
            &StorageKey::new(name).unwrap(),
            reader_from_bytes(b"stale".to_vec()),
            PutOptions::new("del")
                .with_expiry(Expiry::At(chrono::Utc::now() - chrono::Duration::hours(1))),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn cleanup_once_reports_deletions() {
    let dir = tempfile::tempdir().unwrap();
    let (_, backend) = backend_for(&dir).await;
    put_expired(backend.as_ref(), "old.txt").await;

    let report = cleanup_once(backend.as_ref()).await.unwrap();
    assert_eq!(report.deleted, vec![StorageKey::new("old.txt").unwrap()]);
    assert!(!backend.exists(&StorageKey::new("old.txt").unwrap()).await.unwrap());
}

#[tokio::test]
async fn cleanup_every_stops_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let (_, backend) = backend_for(&dir).await;
    put_expired(backend.as_ref(), "old.txt").await;

    cleanup_every(
        Arc::clone(&backend),
        Duration::from_millis(10),
        tokio::time::sleep(Duration::from_millis(200)),
    )
    .await
    .unwrap();
    assert!(!backend.exists(&StorageKey::new("old.txt").unwrap()).await.unwrap());
}
