use crate::services::lifecycle::LifecycleManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

/// Periodically purges discarded reservations whose upload window has closed.
pub struct ReconcileWorker {
    lifecycle: Arc<LifecycleManager>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl ReconcileWorker {
    pub fn new(
        lifecycle: Arc<LifecycleManager>,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            lifecycle,
            interval,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("🚀 Reconcile worker started (every {:?})", self.interval);

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Reconcile worker shutting down");
                    break;
                }
                _ = sleep(self.interval) => {
                    self.tick().await;
                }
            }
        }
    }

    /// One sweep. Failures are logged and retried on the next tick.
    pub async fn tick(&self) -> usize {
        match self.lifecycle.reconcile().await {
            Ok(0) => {
                tracing::debug!("🧹 Nothing to reconcile");
                0
            }
            Ok(purged) => {
                tracing::info!("🧹 Purged {} expired reservations", purged);
                purged
            }
            Err(e) => {
                tracing::error!("❌ Reconcile sweep failed: {}", e);
                0
            }
        }
    }
}
