#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use image_upload_service::config::ServiceConfig;
use image_upload_service::models::{ImageRecord, ImageStatus};
use image_upload_service::services::clock::Clock;
use image_upload_service::services::lifecycle::LifecycleManager;
use image_upload_service::services::record_store::{RecordStore, StoreError, StoreResult};
use image_upload_service::services::storage::ObjectStorage;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use tokio::sync::Notify;

pub const MOCK_START_URL: &str = "http://localhost:9000/mock-bucket/";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("image_upload_service=debug")
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
pub struct MemoryRecordStore {
    rows: Mutex<HashMap<String, ImageRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<ImageRecord> {
        self.rows.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn with_status(&self, status: ImageStatus) -> Vec<ImageRecord> {
        self.rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, record: ImageRecord) -> StoreResult<ImageRecord> {
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(&record.key) {
            return Err(StoreError::Conflict(record.key));
        }
        rows.insert(record.key.clone(), record.clone());
        Ok(record)
    }

    async fn save(&self, record: &ImageRecord, expected: &[ImageStatus]) -> StoreResult<()> {
        self.save_all(std::slice::from_ref(record), expected).await
    }

    async fn save_all(&self, records: &[ImageRecord], expected: &[ImageStatus]) -> StoreResult<()> {
        let mut rows = self.rows.lock().unwrap();
        for record in records {
            let current = rows.get(&record.key).map(|r| r.status);
            if !current.is_some_and(|status| expected.contains(&status)) {
                return Err(StoreError::Stale(record.key.clone()));
            }
        }
        for record in records {
            rows.insert(record.key.clone(), record.clone());
        }
        Ok(())
    }

    async fn exists_by_key(&self, key: &str) -> StoreResult<bool> {
        Ok(self.rows.lock().unwrap().contains_key(key))
    }

    async fn exists_by_key_and_status(&self, key: &str, status: ImageStatus) -> StoreResult<bool> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(key)
            .is_some_and(|r| r.status == status))
    }

    async fn find_by_key(&self, key: &str) -> StoreResult<Option<ImageRecord>> {
        Ok(self.get(key))
    }

    async fn find_by_keys(&self, keys: &[String]) -> StoreResult<Vec<ImageRecord>> {
        let rows = self.rows.lock().unwrap();
        Ok(keys.iter().filter_map(|k| rows.get(k).cloned()).collect())
    }

    async fn find_by_owner_and_status(
        &self,
        owner_id: &str,
        status: ImageStatus,
    ) -> StoreResult<Vec<ImageRecord>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.owner_id == owner_id && r.status == status)
            .cloned()
            .collect())
    }

    async fn find_by_key_and_status(
        &self,
        key: &str,
        status: ImageStatus,
    ) -> StoreResult<Option<ImageRecord>> {
        Ok(self.get(key).filter(|r| r.status == status))
    }

    async fn find_by_status_and_expiry_before(
        &self,
        status: ImageStatus,
        before: DateTime<Utc>,
    ) -> StoreResult<Vec<ImageRecord>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.status == status && r.expiry < before)
            .cloned()
            .collect())
    }

    async fn delete_by_key(&self, key: &str) -> StoreResult<()> {
        self.rows.lock().unwrap().remove(key);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryObjectStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
    unreachable: Mutex<HashSet<String>>,
    gate: Mutex<Option<ExistsGate>>,
}

/// Holds the next `file_exists` call until released.
#[derive(Clone, Default)]
pub struct ExistsGate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl MemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the client PUT against a presigned URL.
    pub fn upload(&self, key: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(key.to_string(), b"image-bytes".to_vec());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.files.lock().unwrap().contains_key(key)
    }

    /// Parks the next existence check until `release` is notified.
    pub fn hold_next_exists(&self) -> ExistsGate {
        let gate = ExistsGate::default();
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Makes every existence check for `key` fail with a storage error.
    pub fn break_key(&self, key: &str) {
        self.unreachable.lock().unwrap().insert(key.to_string());
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn store_file(&self, key: &str, data: Vec<u8>) -> anyhow::Result<()> {
        self.files.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn copy_file(&self, source_key: &str, dest_key: &str) -> anyhow::Result<()> {
        let data = self.files.lock().unwrap().get(source_key).cloned();
        match data {
            Some(data) => {
                self.files
                    .lock()
                    .unwrap()
                    .insert(dest_key.to_string(), data);
                Ok(())
            }
            None => Err(anyhow::anyhow!("Source key not found")),
        }
    }

    async fn generate_presigned_upload_url(
        &self,
        key: &str,
        expiry: DateTime<Utc>,
    ) -> anyhow::Result<String> {
        Ok(format!(
            "/obj/mock-bucket/{}?expires={}",
            key,
            expiry.timestamp()
        ))
    }

    async fn file_exists(&self, key: &str) -> anyhow::Result<bool> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if self.unreachable.lock().unwrap().contains(key) {
            return Err(anyhow::anyhow!("storage unreachable for {}", key));
        }
        Ok(self.files.lock().unwrap().contains_key(key))
    }

    async fn delete_file(&self, key: &str) -> anyhow::Result<()> {
        self.files.lock().unwrap().remove(key);
        Ok(())
    }

    fn access_start_url(&self) -> &str {
        MOCK_START_URL
    }
}

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()),
        }
    }

    pub fn advance(&self, secs: i64) {
        *self.now.lock().unwrap() += Duration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Extracts the reservation key from a URL issued by `MemoryObjectStorage`.
pub fn key_of(url: &str) -> String {
    url.trim_start_matches("/obj/mock-bucket/")
        .split('?')
        .next()
        .unwrap()
        .to_string()
}

pub struct Harness {
    pub manager: Arc<LifecycleManager>,
    pub records: Arc<MemoryRecordStore>,
    pub storage: Arc<MemoryObjectStorage>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ServiceConfig::default())
    }

    pub fn with_config(config: ServiceConfig) -> Self {
        init_tracing();
        let records = Arc::new(MemoryRecordStore::new());
        let storage = Arc::new(MemoryObjectStorage::new());
        let clock = Arc::new(ManualClock::new());
        let manager = Arc::new(LifecycleManager::new(
            records.clone(),
            storage.clone(),
            clock.clone(),
            &config,
        ));
        Self {
            manager,
            records,
            storage,
            clock,
        }
    }

    /// Issues `count` reservations for `owner` and returns their keys.
    pub async fn reserve(&self, owner: &str, count: usize) -> Vec<String> {
        self.manager
            .generate_upload_urls(owner, count)
            .await
            .unwrap()
            .iter()
            .map(|url| key_of(url))
            .collect()
    }
}
