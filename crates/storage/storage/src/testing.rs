use chrono::{DateTime, Duration, Utc};
use futures::TryStreamExt;
use http::header::{CONTENT_RANGE, RANGE};
use http::{HeaderMap, HeaderValue, StatusCode};

use crate::backend::{PutOptions, StorageBackend};
use crate::error::{StorageError, StorageResult};
use crate::fingerprint::checksum;
use crate::io::{read_to_vec, reader_from_bytes};
use crate::key::StorageKey;
use crate::metadata::Expiry;

fn test_key(name: &str) -> StorageKey {
    StorageKey::new(format!("conformance-{name}")).expect("test keys are valid")
}

fn whole_second_from_now(offset: Duration) -> DateTime<Utc> {
    let ts = (Utc::now() + offset).timestamp();
    DateTime::from_timestamp(ts, 0).expect("timestamp in range")
}

/// Run the full storage backend conformance test suite.
///
/// Call this from your backend's test module with a fresh, empty backend.
///
/// # Errors
///
/// Returns an error if a backend operation fails unexpectedly. Contract
/// violations panic through assertions.
pub async fn run_backend_conformance_tests(backend: &dyn StorageBackend) -> StorageResult<()> {
    test_head_missing(backend).await?;
    test_put_get_roundtrip(backend).await?;
    test_put_empty(backend).await?;
    test_put_size_mismatch(backend).await?;
    test_overwrite(backend).await?;
    test_delete(backend).await?;
    test_put_metadata(backend).await?;
    test_expiry_roundtrip(backend).await?;
    test_size(backend).await?;
    test_serve_file(backend).await?;
    test_list(backend).await?;
    Ok(())
}

async fn test_head_missing(backend: &dyn StorageBackend) -> StorageResult<()> {
    let key = test_key("missing.txt");
    assert!(!backend.exists(&key).await?, "missing key should not exist");
    let err = backend.head(&key).await.expect_err("head on missing key");
    assert!(err.is_not_found(), "head on missing key: {err}");
    let err = backend.get(&key).await.err().expect("get on missing key");
    assert!(err.is_not_found(), "get on missing key: {err}");
    Ok(())
}

async fn test_put_get_roundtrip(backend: &dyn StorageBackend) -> StorageResult<()> {
    let key = test_key("roundtrip.txt");
    let payload = b"the quick brown fox".to_vec();
    let options = PutOptions::new("del-roundtrip")
        .with_size_hint(payload.len() as u64)
        .with_original_name("Round Trip.txt");

    let stored = backend
        .put(&key, reader_from_bytes(payload.clone()), options)
        .await?;
    assert_eq!(stored.checksum, checksum(&payload));
    assert_eq!(stored.size, payload.len() as u64);
    assert_eq!(stored.delete_key, "del-roundtrip");
    assert!(stored.access_key.is_none());
    assert!(stored.archive_files.is_empty());
    assert_eq!(
        backend.head(&key).await?.etag(),
        stored.etag(),
        "put should return the etag later reads report"
    );

    assert!(backend.exists(&key).await?);
    let (meta, body) = backend.get(&key).await?;
    let bytes = read_to_vec(body).await?;
    assert_eq!(bytes, payload, "get should return the stored bytes");
    assert_eq!(meta.checksum, checksum(&payload));
    assert_eq!(meta.size, payload.len() as u64);
    assert_eq!(meta.original_name.as_deref(), Some("Round Trip.txt"));
    assert!(meta.mimetype.starts_with("text/plain"), "{}", meta.mimetype);
    Ok(())
}

async fn test_put_empty(backend: &dyn StorageBackend) -> StorageResult<()> {
    let key = test_key("empty.bin");
    let err = backend
        .put(&key, reader_from_bytes(Vec::new()), PutOptions::new("d"))
        .await
        .expect_err("empty put should fail");
    assert!(matches!(err, StorageError::FileEmpty), "empty put: {err}");
    assert!(!backend.exists(&key).await?, "empty put left an object");
    Ok(())
}

async fn test_put_size_mismatch(backend: &dyn StorageBackend) -> StorageResult<()> {
    let key = test_key("short.bin");
    let err = backend
        .put(
            &key,
            reader_from_bytes(b"12345".to_vec()),
            PutOptions::new("d").with_size_hint(10),
        )
        .await
        .expect_err("short put should fail");
    assert!(
        matches!(
            err,
            StorageError::SizeMismatch {
                expected: 10,
                actual: 5
            }
        ),
        "short put: {err}"
    );
    assert!(!backend.exists(&key).await?, "short put left an object");
    Ok(())
}

async fn test_overwrite(backend: &dyn StorageBackend) -> StorageResult<()> {
    let key = test_key("overwrite.txt");
    backend
        .put(&key, reader_from_bytes(b"first".to_vec()), PutOptions::new("d1"))
        .await?;
    let second = b"second payload".to_vec();
    backend
        .put(&key, reader_from_bytes(second.clone()), PutOptions::new("d2"))
        .await?;

    let (meta, body) = backend.get(&key).await?;
    assert_eq!(read_to_vec(body).await?, second);
    assert_eq!(meta.checksum, checksum(&second));
    assert_eq!(meta.size, second.len() as u64);
    assert_eq!(meta.delete_key, "d2");
    Ok(())
}

async fn test_delete(backend: &dyn StorageBackend) -> StorageResult<()> {
    let key = test_key("delete.txt");
    backend
        .put(&key, reader_from_bytes(b"bye".to_vec()), PutOptions::new("d"))
        .await?;
    backend.delete(&key).await?;
    assert!(!backend.exists(&key).await?);
    let err = backend.head(&key).await.expect_err("head after delete");
    assert!(err.is_not_found(), "head after delete: {err}");

    match backend.delete(&key).await {
        Ok(()) => {}
        Err(e) => assert!(e.is_not_found(), "second delete: {e}"),
    }
    Ok(())
}

async fn test_put_metadata(backend: &dyn StorageBackend) -> StorageResult<()> {
    let key = test_key("rotate.txt");
    let payload = b"credentials rotate".to_vec();
    let mut meta = backend
        .put(&key, reader_from_bytes(payload.clone()), PutOptions::new("old"))
        .await?;

    meta.delete_key = "new".into();
    meta.access_key = Some("reader".into());
    meta.expiry = Expiry::At(whole_second_from_now(Duration::hours(2)));
    backend.put_metadata(&key, &meta).await?;

    let (reloaded, body) = backend.get(&key).await?;
    assert_eq!(read_to_vec(body).await?, payload, "bytes must be untouched");
    assert_eq!(reloaded.delete_key, "new");
    assert_eq!(reloaded.access_key.as_deref(), Some("reader"));
    assert_eq!(reloaded.expiry, meta.expiry);
    assert_eq!(reloaded.checksum, checksum(&payload));
    Ok(())
}

async fn test_expiry_roundtrip(backend: &dyn StorageBackend) -> StorageResult<()> {
    let live = test_key("live.txt");
    let at = whole_second_from_now(Duration::hours(1));
    backend
        .put(
            &live,
            reader_from_bytes(b"live".to_vec()),
            PutOptions::new("d").with_expiry(Expiry::At(at)),
        )
        .await?;
    let meta = backend.head(&live).await?;
    assert_eq!(meta.expiry, Expiry::At(at));
    assert!(!meta.is_expired());

    let stale = test_key("stale.txt");
    let past = whole_second_from_now(-Duration::hours(1));
    backend
        .put(
            &stale,
            reader_from_bytes(b"stale".to_vec()),
            PutOptions::new("d").with_expiry(Expiry::At(past)),
        )
        .await?;
    let meta = backend.head(&stale).await?;
    assert!(meta.is_expired(), "past expiry should read back as expired");

    let forever = test_key("forever.txt");
    backend
        .put(&forever, reader_from_bytes(b"forever".to_vec()), PutOptions::new("d"))
        .await?;
    assert_eq!(backend.head(&forever).await?.expiry, Expiry::Never);
    Ok(())
}

async fn test_size(backend: &dyn StorageBackend) -> StorageResult<()> {
    let key = test_key("size.bin");
    backend
        .put(&key, reader_from_bytes(vec![7u8; 1234]), PutOptions::new("d"))
        .await?;
    assert_eq!(backend.size(&key).await?, 1234);
    let err = backend
        .size(&test_key("size-missing.bin"))
        .await
        .expect_err("size of missing key");
    assert!(err.is_not_found());
    Ok(())
}

async fn test_serve_file(backend: &dyn StorageBackend) -> StorageResult<()> {
    let key = test_key("serve.txt");
    backend
        .put(&key, reader_from_bytes(b"0123456789".to_vec()), PutOptions::new("d"))
        .await?;

    let full = backend.serve_file(&key, &HeaderMap::new()).await?;
    assert_eq!(full.status(), StatusCode::OK);
    assert_eq!(read_to_vec(full.into_body()).await?, b"0123456789");

    let mut headers = HeaderMap::new();
    headers.insert(RANGE, HeaderValue::from_static("bytes=2-5"));
    let partial = backend.serve_file(&key, &headers).await?;
    assert_eq!(partial.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(partial.headers()[CONTENT_RANGE], "bytes 2-5/10");
    assert_eq!(read_to_vec(partial.into_body()).await?, b"2345");

    headers.insert(RANGE, HeaderValue::from_static("bytes=-3"));
    let suffix = backend.serve_file(&key, &headers).await?;
    assert_eq!(read_to_vec(suffix.into_body()).await?, b"789");

    headers.insert(RANGE, HeaderValue::from_static("bytes=50-"));
    let bad = backend.serve_file(&key, &headers).await?;
    assert_eq!(bad.status(), StatusCode::RANGE_NOT_SATISFIABLE);

    let err = backend
        .serve_file(&test_key("serve-missing.txt"), &HeaderMap::new())
        .await
        .err()
        .expect("serve missing key");
    assert!(err.is_not_found());
    Ok(())
}

async fn test_list(backend: &dyn StorageBackend) -> StorageResult<()> {
    let a = test_key("list-a.txt");
    let b = test_key("list-b.txt");
    for key in [&a, &b] {
        backend
            .put(key, reader_from_bytes(b"listed".to_vec()), PutOptions::new("d"))
            .await?;
    }
    let keys: Vec<StorageKey> = backend.list().try_collect().await?;
    assert!(keys.contains(&a), "list should contain {a}");
    assert!(keys.contains(&b), "list should contain {b}");
    assert!(
        !keys.contains(&test_key("empty.bin")),
        "failed puts must not be listed"
    );
    Ok(())
}
