use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Blob storage holding the uploaded images, addressed by reservation key.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn store_file(&self, key: &str, data: Vec<u8>) -> Result<()>;
    async fn copy_file(&self, source_key: &str, dest_key: &str) -> Result<()>;
    /// A URL authorizing a direct PUT of `key` until `expiry`.
    async fn generate_presigned_upload_url(&self, key: &str, expiry: DateTime<Utc>)
    -> Result<String>;
    async fn file_exists(&self, key: &str) -> Result<bool>;
    /// Removes the blob. Absent blobs are not an error.
    async fn delete_file(&self, key: &str) -> Result<()>;
    /// Base URL that confirmed images are read from.
    fn access_start_url(&self) -> &str;
}

pub struct S3ObjectStorage {
    client: Client,
    bucket: String,
    access_start_url: String,
}

impl S3ObjectStorage {
    pub fn new(client: Client, bucket: String, access_start_url: String) -> Self {
        Self {
            client,
            bucket,
            access_start_url,
        }
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    async fn store_file(&self, key: &str, data: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await?;
        Ok(())
    }

    async fn copy_file(&self, source_key: &str, dest_key: &str) -> Result<()> {
        let res = self
            .client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(format!("{}/{}", self.bucket, source_key))
            .key(dest_key)
            .send()
            .await;

        if let Err(e) = res {
            tracing::error!(
                "S3 copy_object failed: source={}/{}, dest={}, error={:?}",
                self.bucket,
                source_key,
                dest_key,
                e
            );
            return Err(e.into());
        }
        Ok(())
    }

    async fn generate_presigned_upload_url(
        &self,
        key: &str,
        expiry: DateTime<Utc>,
    ) -> Result<String> {
        // S3 refuses a zero-length validity window
        let expires_in = (expiry - Utc::now())
            .to_std()
            .unwrap_or_default()
            .max(Duration::from_secs(1));

        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(PresigningConfig::expires_in(expires_in)?)
            .await?;

        Ok(request.uri().to_string())
    }

    async fn file_exists(&self, key: &str) -> Result<bool> {
        let res = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match res {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(anyhow::anyhow!(service_error))
                }
            }
        }
    }

    async fn delete_file(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        Ok(())
    }

    fn access_start_url(&self) -> &str {
        &self.access_start_url
    }
}
