//! Worker-per-unit fan-out with a join barrier.
//!
//! Every unit runs as its own tokio task and every unit runs to completion,
//! even after a sibling has failed. When several units fail, the failure of
//! the lowest unit index is the one reported.

use crate::services::error::{LifecycleError, LifecycleResult};
use futures::future::join_all;
use std::future::Future;

/// Runs `unit(0..count)` concurrently and returns the outputs in index order.
pub async fn collect_indexed<T, F, Fut>(count: usize, unit: F) -> LifecycleResult<Vec<T>>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = LifecycleResult<T>> + Send + 'static,
    T: Send + 'static,
{
    let handles: Vec<_> = (0..count).map(|index| tokio::spawn(unit(index))).collect();
    join(handles).await
}

/// Runs `unit(item)` for every item, one task per item.
pub async fn for_each<I, F, Fut>(items: Vec<I>, unit: F) -> LifecycleResult<()>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = LifecycleResult<()>> + Send + 'static,
{
    let handles: Vec<_> = items
        .into_iter()
        .map(|item| tokio::spawn(unit(item)))
        .collect();
    join::<()>(handles).await.map(|_| ())
}

async fn join<T>(
    handles: Vec<tokio::task::JoinHandle<LifecycleResult<T>>>,
) -> LifecycleResult<Vec<T>> {
    let total = handles.len();
    let mut outputs = Vec::with_capacity(total);
    let mut first_failure: Option<LifecycleError> = None;
    let mut failed = 0usize;

    for (index, joined) in join_all(handles).await.into_iter().enumerate() {
        let outcome = joined.unwrap_or_else(|e| {
            Err(LifecycleError::Internal(format!(
                "fan-out unit {} interrupted: {}",
                index, e
            )))
        });
        match outcome {
            Ok(value) => outputs.push(value),
            Err(e) => {
                failed += 1;
                tracing::debug!("fan-out unit {} failed: {}", index, e);
                first_failure.get_or_insert(e);
            }
        }
    }

    match first_failure {
        Some(e) => {
            tracing::warn!("{} of {} fan-out units failed", failed, total);
            Err(e)
        }
        None => Ok(outputs),
    }
}
