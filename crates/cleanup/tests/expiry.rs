use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use http::{HeaderMap, StatusCode};

use stash_cleanup::{CleanupError, SweepReport, Sweeper, get_live, head_live, serve_live, sweep, sweep_at};
use stash_storage::io::{read_to_vec, reader_from_bytes};
use stash_storage::{Expiry, PutOptions, StorageBackend, StorageKey};
use stash_storage_local::{LocalBackend, LocalConfig};

async fn backend(dir: &tempfile::TempDir) -> LocalBackend {
    let config = LocalConfig::new(dir.path().join("files"), dir.path().join("meta"));
    LocalBackend::new(&config).await.unwrap()
}

fn key(name: &str) -> StorageKey {
    StorageKey::new(name).unwrap()
}

async fn put(backend: &dyn StorageBackend, name: &str, expiry: Expiry) {
    backend
        .put(
            &key(name),
            reader_from_bytes(format!("contents of {name}").into_bytes()),
            PutOptions::new("del").with_expiry(expiry),
        )
        .await
        .unwrap();
}

fn hours(n: i64) -> Expiry {
    let at = Utc::now() + chrono::Duration::hours(n);
    Expiry::At(chrono::DateTime::from_timestamp(at.timestamp(), 0).unwrap())
}

fn deleted(report: &SweepReport) -> Vec<String> {
    let mut keys: Vec<String> = report.deleted.iter().map(ToString::to_string).collect();
    keys.sort();
    keys
}

#[tokio::test]
async fn sweep_deletes_only_expired_objects() {
    let dir = tempfile::tempdir().unwrap();
    let backend = backend(&dir).await;
    put(&backend, "old.txt", hours(-1)).await;
    put(&backend, "later.txt", hours(1)).await;
    put(&backend, "forever.txt", Expiry::Never).await;
    let live_before = backend.head(&key("later.txt")).await.unwrap();

    let report = sweep(&backend).await.unwrap();
    assert_eq!(report.scanned, 3);
    assert_eq!(deleted(&report), vec!["old.txt"]);
    assert!(report.is_clean());

    assert!(!backend.exists(&key("old.txt")).await.unwrap());
    assert!(backend.head(&key("old.txt")).await.unwrap_err().is_not_found());
    assert_eq!(backend.head(&key("later.txt")).await.unwrap(), live_before);
    assert!(backend.exists(&key("forever.txt")).await.unwrap());
}

#[tokio::test]
async fn sweep_at_a_later_instant() {
    let dir = tempfile::tempdir().unwrap();
    let backend = backend(&dir).await;
    put(&backend, "later.txt", hours(1)).await;
    put(&backend, "forever.txt", Expiry::Never).await;

    let report = sweep_at(&backend, Utc::now() + chrono::Duration::hours(2))
        .await
        .unwrap();
    assert_eq!(deleted(&report), vec!["later.txt"]);
    assert!(backend.exists(&key("forever.txt")).await.unwrap());
}

#[tokio::test]
async fn sweep_skips_unreadable_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let backend = backend(&dir).await;
    put(&backend, "broken.txt", hours(-1)).await;
    put(&backend, "old.txt", hours(-1)).await;
    std::fs::write(dir.path().join("meta").join("broken.txt"), b"{ not json").unwrap();

    let report = sweep(&backend).await.unwrap();
    assert_eq!(deleted(&report), vec!["old.txt"]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].0, key("broken.txt"));
    assert!(!report.is_clean());
    assert!(backend.exists(&key("broken.txt")).await.unwrap());

    let report = report.into_result().unwrap();
    assert_eq!(report.skipped.len(), 1);
}

#[tokio::test]
async fn sweep_reports_objects_missing_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let backend = backend(&dir).await;
    put(&backend, "orphan.txt", hours(-1)).await;
    std::fs::remove_file(dir.path().join("meta").join("orphan.txt")).unwrap();

    let report = sweep(&backend).await.unwrap();
    assert_eq!(report.scanned, 1);
    assert!(report.deleted.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].0, key("orphan.txt"));
    assert!(report.skipped[0].1.is_not_found());
    assert!(!report.is_clean());
    assert!(backend.exists(&key("orphan.txt")).await.unwrap());
}

#[test]
fn delete_failures_fail_the_report() {
    let report = SweepReport {
        failed: vec![(key("stuck.txt"), stash_storage::StorageError::Backend("denied".into()))],
        ..SweepReport::default()
    };
    let err = report.into_result().unwrap_err();
    assert!(matches!(err, CleanupError::Delete { ref failures } if failures.len() == 1));
    assert_eq!(err.to_string(), "1 expired object(s) could not be deleted");
}

#[tokio::test]
async fn reads_purge_expired_objects() {
    let dir = tempfile::tempdir().unwrap();
    let backend = backend(&dir).await;
    put(&backend, "old.txt", hours(-1)).await;
    put(&backend, "stale.txt", hours(-1)).await;
    put(&backend, "fresh.txt", hours(1)).await;

    assert!(head_live(&backend, &key("old.txt")).await.unwrap_err().is_not_found());
    assert!(!backend.exists(&key("old.txt")).await.unwrap());

    let err = get_live(&backend, &key("stale.txt")).await.err().unwrap();
    assert!(err.is_not_found());
    assert!(!backend.exists(&key("stale.txt")).await.unwrap());

    let (meta, body) = get_live(&backend, &key("fresh.txt")).await.unwrap();
    assert!(!meta.is_expired());
    assert_eq!(read_to_vec(body).await.unwrap(), b"contents of fresh.txt");
    assert!(head_live(&backend, &key("fresh.txt")).await.is_ok());
}

#[tokio::test]
async fn serving_purges_expired_objects() {
    let dir = tempfile::tempdir().unwrap();
    let backend = backend(&dir).await;
    put(&backend, "old.txt", hours(-1)).await;
    put(&backend, "fresh.txt", Expiry::Never).await;

    let err = serve_live(&backend, &key("old.txt"), &HeaderMap::new())
        .await
        .err()
        .unwrap();
    assert!(err.is_not_found());
    assert!(!backend.exists(&key("old.txt")).await.unwrap());

    let response = serve_live(&backend, &key("fresh.txt"), &HeaderMap::new())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn sweeper_runs_until_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let backend: Arc<dyn StorageBackend> = Arc::new(backend(&dir).await);
    put(backend.as_ref(), "old.txt", hours(-1)).await;
    put(backend.as_ref(), "forever.txt", Expiry::Never).await;

    let (mut sweeper, shutdown_tx) = Sweeper::new(Arc::clone(&backend), Duration::from_millis(20));
    let handle = tokio::spawn(async move { sweeper.run().await });

    let mut gone = false;
    for _ in 0..200 {
        if !backend.exists(&key("old.txt")).await.unwrap() {
            gone = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(gone, "sweeper should delete the expired object");

    shutdown_tx.send(()).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("sweeper should stop")
        .unwrap();
    assert!(backend.exists(&key("forever.txt")).await.unwrap());
}
