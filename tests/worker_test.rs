mod common;

use common::Harness;
use image_upload_service::services::worker::ReconcileWorker;
use std::time::Duration;
use tokio::sync::watch;

#[tokio::test]
async fn test_tick_purges_expired_discards() {
    let h = Harness::new();
    let keys = h.reserve("alice", 3).await;
    h.storage.upload(&keys[0]);
    h.manager.clean_up("alice").await.unwrap();

    let (_tx, rx) = watch::channel(false);
    let worker = ReconcileWorker::new(h.manager.clone(), Duration::from_secs(60), rx);

    assert_eq!(worker.tick().await, 0);
    h.clock.advance(31);
    assert_eq!(worker.tick().await, 3);
    assert_eq!(h.records.len(), 0);
    assert!(!h.storage.contains(&keys[0]));
}

#[tokio::test]
async fn test_worker_stops_on_shutdown() {
    let h = Harness::new();
    let (tx, rx) = watch::channel(false);
    let worker = ReconcileWorker::new(h.manager.clone(), Duration::from_millis(10), rx);
    let handle = tokio::spawn(worker.run());

    tokio::time::sleep(Duration::from_millis(35)).await;
    tx.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("worker did not stop")
        .unwrap();
}
