//! Runs against a live S3-compatible endpoint:
//!
//! ```sh
//! STASH_S3_BUCKET=stash-test STASH_S3_ENDPOINT=http://localhost:9000 \
//!     cargo test -p stash-storage-s3 --features integration
//! ```
#![cfg(feature = "integration")]

use stash_storage::testing::run_backend_conformance_tests;
use stash_storage_s3::{S3Backend, S3Config};

fn test_config() -> S3Config {
    let bucket = std::env::var("STASH_S3_BUCKET").unwrap_or_else(|_| "stash-test".to_owned());
    let region = std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_owned());
    let mut config = S3Config::new(bucket, region)
        .with_prefix(format!("test-{}/", uuid::Uuid::new_v4().simple()))
        .with_force_path_style(true);
    if let Ok(endpoint) = std::env::var("STASH_S3_ENDPOINT") {
        config = config.with_endpoint_url(endpoint);
    }
    config
}

#[tokio::test]
async fn backend_conformance() {
    let backend = S3Backend::new(test_config())
        .await
        .expect("client creation should succeed");
    run_backend_conformance_tests(&backend)
        .await
        .expect("conformance tests should pass");
}
