use crate::services::storage::S3ObjectStorage;
use aws_sdk_s3::config::{Credentials, Region};
use std::env;
use std::sync::Arc;
use tracing::info;

fn required(name: &str) -> anyhow::Result<String> {
    env::var(name).map_err(|_| anyhow::anyhow!("{} must be set", name))
}

pub async fn setup_storage() -> anyhow::Result<Arc<S3ObjectStorage>> {
    let endpoint_url = required("S3_ENDPOINT")?;
    let access_key = required("S3_ACCESS_KEY")?;
    let secret_key = required("S3_SECRET_KEY")?;
    let bucket = required("S3_BUCKET")?;
    let region = env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string());
    let access_start_url = env::var("ACCESS_START_URL")
        .unwrap_or_else(|_| format!("{}/{}/", endpoint_url.trim_end_matches('/'), bucket));

    info!("☁️  S3 Storage: {} (Bucket: {})", endpoint_url, bucket);
    info!("🔗 Access start url: {}", access_start_url);

    let aws_config = aws_config::from_env()
        .endpoint_url(&endpoint_url)
        .region(Region::new(region))
        .credentials_provider(Credentials::new(
            access_key, secret_key, None, None, "static",
        ))
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(true)
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

    match s3_client.head_bucket().bucket(&bucket).send().await {
        Ok(_) => info!("✅ Bucket '{}' is ready", bucket),
        Err(_) => {
            info!("🪣 Bucket '{}' not found, creating...", bucket);
            if let Err(e) = s3_client.create_bucket().bucket(&bucket).send().await {
                tracing::error!("❌ Failed to create bucket '{}': {}", bucket, e);
            } else {
                info!("✅ Bucket '{}' created successfully", bucket);
            }
        }
    }

    Ok(Arc::new(S3ObjectStorage::new(
        s3_client,
        bucket,
        access_start_url,
    )))
}
