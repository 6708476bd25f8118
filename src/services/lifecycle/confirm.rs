use crate::models::{ImageRecord, ImageStatus};
use crate::services::error::{LifecycleError, LifecycleResult};
use crate::services::fan_out;
use crate::services::record_store::StoreError;

use super::{LifecycleManager, distinct};

impl LifecycleManager {
    /// Promotes a `Pending` reservation to `Using` once its blob exists.
    pub async fn confirm_upload(&self, key: &str) -> LifecycleResult<()> {
        let mut record = self
            .records
            .find_by_key_and_status(key, ImageStatus::Pending)
            .await?
            .ok_or_else(|| {
                tracing::warn!("Confirm rejected, no pending reservation for {}", key);
                LifecycleError::NotUploaded(format!("no pending reservation for {}", key))
            })?;

        if !self.storage.file_exists(key).await? {
            tracing::warn!("Confirm rejected, blob {} is missing", key);
            return Err(LifecycleError::NotUploaded(format!(
                "no uploaded blob for {}",
                key
            )));
        }

        record
            .transition(ImageStatus::Using)
            .map_err(LifecycleError::Internal)?;
        self.records
            .save(&record, &[ImageStatus::Pending])
            .await
            .map_err(superseded)?;

        tracing::info!("Confirmed upload {}", key);
        Ok(())
    }

    /// Promotes every key or none of them.
    ///
    /// All reservations are checked before any blob, all blobs are checked in
    /// one fan-out pass, and the status change is written as one batch.
    pub async fn confirm_uploads(&self, keys: &[String]) -> LifecycleResult<()> {
        let keys = distinct(keys);
        if keys.is_empty() {
            return Ok(());
        }

        let mut records = self.pending_records(&keys).await?;
        self.ensure_blobs_exist(&keys).await?;

        for record in &mut records {
            record
                .transition(ImageStatus::Using)
                .map_err(LifecycleError::Internal)?;
        }
        self.records
            .save_all(&records, &[ImageStatus::Pending])
            .await
            .map_err(superseded)?;

        tracing::info!("Confirmed {} uploads", records.len());
        Ok(())
    }

    /// Same checks as `confirm_upload` without changing anything.
    pub async fn assert_uploaded(&self, key: &str) -> LifecycleResult<()> {
        let reserved = self
            .records
            .exists_by_key_and_status(key, ImageStatus::Pending)
            .await?;
        if !reserved || !self.storage.file_exists(key).await? {
            tracing::warn!("Upload assertion failed for {}", key);
            return Err(LifecycleError::NotUploaded(key.to_string()));
        }
        Ok(())
    }

    /// Same checks as `confirm_uploads` without changing anything.
    pub async fn assert_uploaded_batch(&self, keys: &[String]) -> LifecycleResult<()> {
        let keys = distinct(keys);
        if keys.is_empty() {
            return Ok(());
        }

        for key in &keys {
            if !self
                .records
                .exists_by_key_and_status(key, ImageStatus::Pending)
                .await?
            {
                tracing::warn!("Upload assertion failed, no pending reservation for {}", key);
                return Err(LifecycleError::NotUploaded(format!(
                    "no pending reservation for {}",
                    key
                )));
            }
        }
        self.ensure_blobs_exist(&keys).await
    }

    async fn pending_records(&self, keys: &[String]) -> LifecycleResult<Vec<ImageRecord>> {
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            let record = self
                .records
                .find_by_key_and_status(key, ImageStatus::Pending)
                .await?
                .ok_or_else(|| {
                    tracing::warn!("Batch rejected, no pending reservation for {}", key);
                    LifecycleError::NotUploaded(format!("no pending reservation for {}", key))
                })?;
            records.push(record);
        }
        Ok(records)
    }

    async fn ensure_blobs_exist(&self, keys: &[String]) -> LifecycleResult<()> {
        let present = fan_out::collect_indexed(keys.len(), |index| {
            let storage = self.storage.clone();
            let key = keys[index].clone();
            async move { storage.file_exists(&key).await.map_err(LifecycleError::from) }
        })
        .await?;

        let missing: Vec<&str> = keys
            .iter()
            .zip(present)
            .filter(|(_, exists)| !exists)
            .map(|(key, _)| key.as_str())
            .collect();

        if !missing.is_empty() {
            tracing::warn!("Batch rejected, blobs missing: {:?}", missing);
            return Err(LifecycleError::NotUploaded(format!(
                "no uploaded blob for {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }
}

/// A reservation discarded while its confirm was in flight is no longer
/// confirmable.
fn superseded(e: StoreError) -> LifecycleError {
    match e {
        StoreError::Stale(key) => {
            tracing::warn!("Confirm rejected, reservation {} changed concurrently", key);
            LifecycleError::NotUploaded(format!("no pending reservation for {}", key))
        }
        other => other.into(),
    }
}
