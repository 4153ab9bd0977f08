use tracing::{debug, info};

use crate::config::S3Config;

const DEFAULT_SESSION_NAME: &str = "stash-storage";

/// Build an AWS SDK configuration for the S3 backend.
///
/// Uses the standard AWS environment credential chain, optionally pointed
/// at a custom endpoint, and assumes `role_arn` via STS when one is set.
/// The assume-role provider refreshes its credentials before they expire.
pub async fn build_sdk_config(config: &S3Config) -> aws_config::SdkConfig {
    let region = aws_config::Region::new(config.region.clone());
    let mut loader = aws_config::from_env().region(region.clone());

    if let Some(endpoint) = &config.endpoint_url {
        debug!(endpoint = %endpoint, "using custom S3 endpoint");
        loader = loader.endpoint_url(endpoint);
    }

    let Some(role_arn) = &config.role_arn else {
        return loader.load().await;
    };

    let session_name = config
        .session_name
        .as_deref()
        .unwrap_or(DEFAULT_SESSION_NAME);
    info!(role_arn = %role_arn, session_name = %session_name, "assuming IAM role via STS");

    // The base config carries the endpoint override and base credentials
    // used for the STS call itself.
    let base_config = loader.load().await;
    let mut provider = aws_config::sts::AssumeRoleProvider::builder(role_arn)
        .session_name(session_name)
        .region(region.clone());
    if let Some(external_id) = &config.external_id {
        provider = provider.external_id(external_id);
    }
    let provider = provider.configure(&base_config).build().await;

    let mut final_loader = aws_config::from_env()
        .region(region)
        .credentials_provider(provider);
    if let Some(endpoint) = &config.endpoint_url {
        final_loader = final_loader.endpoint_url(endpoint);
    }
    final_loader.load().await
}

/// S3 client for `config`, honouring path-style addressing.
pub async fn build_client(config: &S3Config) -> aws_sdk_s3::Client {
    let sdk_config = build_sdk_config(config).await;
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(config.force_path_style)
        .build();
    aws_sdk_s3::Client::from_conf(s3_config)
}

#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use super::*;

    #[tokio::test]
    async fn build_sdk_config_sets_region() {
        let config = S3Config::new("bucket", "ap-northeast-1");
        let sdk_config = build_sdk_config(&config).await;
        assert_eq!(
            sdk_config.region().map(|r| r.as_ref()),
            Some("ap-northeast-1")
        );
    }
}
