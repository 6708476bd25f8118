use crate::models::ImageRecord;
use crate::services::error::{LifecycleError, LifecycleResult};
use crate::services::record_store::{RecordStore, StoreError};
use crate::utils::keyed_mutex::KeyedMutex;
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;

const MAX_ATTEMPTS: usize = 64;

/// Draws random keys and reserves them in the record store.
///
/// The existence check and the insert for a candidate run under that
/// candidate's lock, and a unique-constraint conflict from the store is
/// treated like a collision, so concurrent callers never share a key.
pub struct KeyAllocator {
    prefix: String,
    salt_length: usize,
    locks: KeyedMutex,
}

impl KeyAllocator {
    pub fn new(prefix: impl Into<String>, salt_length: usize) -> Self {
        Self {
            prefix: prefix.into(),
            salt_length,
            locks: KeyedMutex::new(),
        }
    }

    pub fn next_candidate(&self) -> String {
        let salt: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.salt_length)
            .map(char::from)
            .collect();
        format!("{}{}", self.prefix, salt)
    }

    /// Inserts a `Pending` reservation for `owner_id` under a fresh key.
    pub async fn allocate(
        &self,
        store: &dyn RecordStore,
        owner_id: &str,
        expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> LifecycleResult<ImageRecord> {
        for attempt in 1..=MAX_ATTEMPTS {
            let candidate = self.next_candidate();

            let guard = self.locks.lock(&candidate).await;
            let outcome = Self::try_reserve(store, &candidate, owner_id, expiry, now).await;
            drop(guard);
            self.locks.cleanup();

            if let Some(record) = outcome? {
                return Ok(record);
            }
            tracing::debug!("Key collision on attempt {}: {}", attempt, candidate);
        }

        tracing::error!(
            "Gave up allocating a key after {} attempts (prefix {:?}, salt length {})",
            MAX_ATTEMPTS,
            self.prefix,
            self.salt_length
        );
        Err(LifecycleError::Internal(
            "could not allocate a unique image key".to_string(),
        ))
    }

    async fn try_reserve(
        store: &dyn RecordStore,
        candidate: &str,
        owner_id: &str,
        expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> LifecycleResult<Option<ImageRecord>> {
        if store.exists_by_key(candidate).await? {
            return Ok(None);
        }
        match store
            .insert(ImageRecord::pending(owner_id, candidate, expiry, now))
            .await
        {
            Ok(record) => Ok(Some(record)),
            Err(StoreError::Conflict(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
