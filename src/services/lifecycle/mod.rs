//! Reservation lifecycle: issuing presigned upload slots, promoting them once
//! the blob is verifiably present, and purging discarded ones after their
//! upload window has closed.
//!
//! ```text
//! Pending --confirm--> Using
//! Pending --cleanup/delete--> Invalid
//! Using   --delete--> Invalid
//! Invalid (expiry < now) --reconcile--> purged
//! ```

use crate::config::ServiceConfig;
use crate::services::clock::Clock;
use crate::services::key_allocator::KeyAllocator;
use crate::services::record_store::RecordStore;
use crate::services::storage::ObjectStorage;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub mod confirm;
pub mod delete;
pub mod upload;

/// Cheap to clone; bulk operations hand clones to their fan-out units.
#[derive(Clone)]
pub struct LifecycleManager {
    records: Arc<dyn RecordStore>,
    storage: Arc<dyn ObjectStorage>,
    keys: Arc<KeyAllocator>,
    clock: Arc<dyn Clock>,
    upload_window: chrono::Duration,
    max_bulk_count: usize,
}

impl LifecycleManager {
    pub fn new(
        records: Arc<dyn RecordStore>,
        storage: Arc<dyn ObjectStorage>,
        clock: Arc<dyn Clock>,
        config: &ServiceConfig,
    ) -> Self {
        Self {
            records,
            storage,
            keys: Arc::new(KeyAllocator::new(
                config.key_prefix.clone(),
                config.key_salt_length,
            )),
            clock,
            upload_window: config.upload_window(),
            max_bulk_count: config.max_bulk_count,
        }
    }

    pub fn access_start_url(&self) -> &str {
        self.storage.access_start_url()
    }

    fn expiration_since_now(&self) -> DateTime<Utc> {
        self.clock.now() + self.upload_window
    }
}

/// Keeps the first occurrence of every key, preserving order.
fn distinct(keys: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::with_capacity(keys.len());
    keys.iter()
        .filter(|key| seen.insert(key.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_preserves_first_occurrence_order() {
        let keys: Vec<String> = ["b", "a", "b", "c", "a"].iter().map(|s| s.to_string()).collect();
        assert_eq!(distinct(&keys), vec!["b", "a", "c"]);
    }
}
