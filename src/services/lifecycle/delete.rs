use crate::models::{ImageRecord, ImageStatus};
use crate::services::error::{LifecycleError, LifecycleResult};
use crate::services::fan_out;
use crate::services::record_store::StoreError;

use super::LifecycleManager;

/// Statuses a delete request may discard.
const LIVE: &[ImageStatus] = &[ImageStatus::Pending, ImageStatus::Using];

impl LifecycleManager {
    /// Discards the reservation behind `key` and reconciles. Unknown keys are ignored.
    pub async fn delete_image(&self, key: &str) -> LifecycleResult<()> {
        match self.records.find_by_key(key).await? {
            Some(record) => {
                self.invalidate(vec![record], LIVE).await?;
            }
            None => tracing::debug!("Delete of unknown image {} ignored", key),
        }
        self.reconcile().await?;
        Ok(())
    }

    pub async fn delete_images(&self, keys: &[String]) -> LifecycleResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let records = self.records.find_by_keys(keys).await?;
        let invalidated = self.invalidate(records, LIVE).await?;
        tracing::info!("Discarded {} of {} requested images", invalidated, keys.len());
        self.reconcile().await?;
        Ok(())
    }

    /// Discards every `Pending` reservation of `owner_id`, leaving `Using`
    /// ones alone, then reconciles. Returns how many were discarded.
    pub async fn clean_up(&self, owner_id: &str) -> LifecycleResult<usize> {
        let pending = self
            .records
            .find_by_owner_and_status(owner_id, ImageStatus::Pending)
            .await?;
        let invalidated = self.invalidate(pending, &[ImageStatus::Pending]).await?;
        if invalidated > 0 {
            tracing::info!(
                "Discarded {} pending reservations of owner {}",
                invalidated,
                owner_id
            );
        }
        self.reconcile().await?;
        Ok(invalidated)
    }

    /// Permanently removes `Invalid` reservations whose upload window has
    /// closed: the blob first, then the row. Returns the number purged.
    ///
    /// Rows invalidated while their presigned URL is still live are left for
    /// a later pass, so an in-flight PUT can never recreate a purged blob.
    pub async fn reconcile(&self) -> LifecycleResult<usize> {
        let now = self.clock.now();
        let expired = self
            .records
            .find_by_status_and_expiry_before(ImageStatus::Invalid, now)
            .await?;
        if expired.is_empty() {
            return Ok(0);
        }

        let keys: Vec<String> = expired
            .into_iter()
            .filter(|record| record.is_purgeable(now))
            .map(|record| record.key)
            .collect();
        let purged = keys.len();
        fan_out::for_each(keys, |key| {
            let records = self.records.clone();
            let storage = self.storage.clone();
            async move {
                storage.delete_file(&key).await?;
                records.delete_by_key(&key).await?;
                tracing::debug!("Purged {}", key);
                Ok::<(), LifecycleError>(())
            }
        })
        .await?;

        tracing::info!("Reconciled {} discarded reservations", purged);
        Ok(purged)
    }

    /// Marks records `Invalid`, each only while its stored status is still
    /// one of `expected`. Records already invalid, or changed concurrently
    /// to a status outside `expected`, are skipped. Returns the number changed.
    async fn invalidate(
        &self,
        records: Vec<ImageRecord>,
        expected: &[ImageStatus],
    ) -> LifecycleResult<usize> {
        let mut changed = 0;
        for mut record in records {
            if record.status == ImageStatus::Invalid {
                continue;
            }
            record
                .transition(ImageStatus::Invalid)
                .map_err(LifecycleError::Internal)?;
            match self.records.save(&record, expected).await {
                Ok(()) => changed += 1,
                Err(StoreError::Stale(key)) => {
                    tracing::debug!("Skipped invalidating {}, it changed concurrently", key)
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(changed)
    }
}
