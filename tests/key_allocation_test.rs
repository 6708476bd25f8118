mod common;

use chrono::Utc;
use common::MemoryRecordStore;
use image_upload_service::services::error::LifecycleError;
use image_upload_service::services::key_allocator::KeyAllocator;
use image_upload_service::services::record_store::RecordStore;
use std::collections::HashSet;
use std::sync::Arc;

#[tokio::test]
async fn test_concurrent_allocations_never_share_a_key() {
    common::init_tracing();
    // 62 possible keys, so collisions are frequent
    let allocator = Arc::new(KeyAllocator::new("v2_", 1));
    let store = Arc::new(MemoryRecordStore::new());
    let now = Utc::now();

    let handles: Vec<_> = (0..30)
        .map(|i| {
            let allocator = allocator.clone();
            let store = store.clone();
            tokio::spawn(async move {
                allocator
                    .allocate(store.as_ref(), &format!("owner-{}", i), now, now)
                    .await
            })
        })
        .collect();

    let mut keys = HashSet::new();
    for handle in handles {
        let record = handle.await.unwrap().unwrap();
        assert_eq!(record.key.len(), 4);
        assert!(keys.insert(record.key));
    }
    assert_eq!(store.len(), 30);
}

#[tokio::test]
async fn test_exhausted_key_space_is_internal_error() {
    common::init_tracing();
    let allocator = KeyAllocator::new("v2_", 0);
    let store = MemoryRecordStore::new();
    let now = Utc::now();

    allocator.allocate(&store, "alice", now, now).await.unwrap();
    let err = allocator.allocate(&store, "alice", now, now).await.unwrap_err();

    assert!(matches!(err, LifecycleError::Internal(_)));
    assert!(store.exists_by_key("v2_").await.unwrap());
}
