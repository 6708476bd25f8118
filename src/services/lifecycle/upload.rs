use crate::models::ImageStatus;
use crate::services::error::{LifecycleError, LifecycleResult};
use crate::services::fan_out;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::LifecycleManager;

impl LifecycleManager {
    /// Reserves a fresh key for `owner_id` and returns a presigned PUT URL for it.
    ///
    /// If signing fails the `Pending` row stays behind; the next clean-up of
    /// the owner invalidates it.
    pub async fn generate_upload_url(&self, owner_id: &str) -> LifecycleResult<String> {
        let expiry = self.expiration_since_now();
        let url = self.allocate_and_sign(owner_id, expiry).await?;
        tracing::info!("Issued upload url for owner {} (expires {})", owner_id, expiry);
        Ok(url)
    }

    /// Issues `count` upload URLs sharing one expiry, in request order.
    pub async fn generate_upload_urls(
        &self,
        owner_id: &str,
        count: usize,
    ) -> LifecycleResult<Vec<String>> {
        match count {
            0 => return Ok(Vec::new()),
            1 => return Ok(vec![self.generate_upload_url(owner_id).await?]),
            _ => {}
        }
        if count > self.max_bulk_count {
            tracing::warn!(
                "Owner {} requested {} upload urls (max {})",
                owner_id,
                count,
                self.max_bulk_count
            );
            return Err(LifecycleError::CountTooLarge {
                requested: count,
                max: self.max_bulk_count,
            });
        }

        let expiry = self.expiration_since_now();
        let owner: Arc<str> = Arc::from(owner_id);
        let urls = fan_out::collect_indexed(count, |_| {
            let manager = self.clone();
            let owner = owner.clone();
            async move { manager.allocate_and_sign(&owner, expiry).await }
        })
        .await?;

        tracing::info!(
            "Issued {} upload urls for owner {} (expires {})",
            urls.len(),
            owner_id,
            expiry
        );
        Ok(urls)
    }

    /// Copies the blob behind `key` to a new reservation owned by the same
    /// owner and marks it `Using`. Returns `None` when `key` is unknown.
    pub async fn duplicate_image(&self, key: &str) -> LifecycleResult<Option<String>> {
        let Some(source) = self.records.find_by_key(key).await? else {
            tracing::warn!("Cannot duplicate unknown image {}", key);
            return Ok(None);
        };

        let now = self.clock.now();
        let mut copy = self
            .keys
            .allocate(self.records.as_ref(), &source.owner_id, now, now)
            .await?;
        self.storage.copy_file(key, &copy.key).await?;

        // the copied blob is known to exist, so no upload check is needed
        copy.transition(ImageStatus::Using)
            .map_err(LifecycleError::Internal)?;
        self.records.save(&copy, &[ImageStatus::Pending]).await?;

        tracing::info!("Duplicated image {} -> {}", key, copy.key);
        Ok(Some(copy.key))
    }

    async fn allocate_and_sign(
        &self,
        owner_id: &str,
        expiry: DateTime<Utc>,
    ) -> LifecycleResult<String> {
        let record = self
            .keys
            .allocate(self.records.as_ref(), owner_id, expiry, self.clock.now())
            .await?;
        let url = self
            .storage
            .generate_presigned_upload_url(&record.key, expiry)
            .await?;
        tracing::debug!("Reserved {} for owner {}", record.key, owner_id);
        Ok(url)
    }
}
