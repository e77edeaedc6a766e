//! Fan-out of one task per game, fan-in of one [`TaskResult`] per task.

use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::limiter::ConcurrencyLimiter;
use crate::error::TaskError;
use crate::models::{DownloadItem, ScheduledItem, TaskResult};
use crate::providers::ItemFetcher;
use crate::storage::Persister;

/// Per-batch knobs for dispatched tasks.
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    /// Upper bound on the fetch of one item; `None` waits forever. The save
    /// that follows a successful fetch is not bounded.
    pub task_timeout: Option<Duration>,
    /// Cancels tasks that are still waiting for a permit or fetching
    pub cancel: CancellationToken,
}

/// Keep only the games whose provider status marks them ready.
pub fn filter_ready(items: Vec<ScheduledItem>, ready_status: &str) -> Vec<DownloadItem> {
    items
        .into_iter()
        .filter(|s| s.status == ready_status)
        .map(|s| s.item)
        .collect()
}

/// Spawn one task per item and return the stream of their results.
///
/// All tasks are spawned immediately; the limiter throttles how many run.
/// Every task owns a clone of the sender, so the stream closes exactly when
/// the last task has published its result.
pub fn dispatch(
    items: Vec<DownloadItem>,
    fetcher: Arc<dyn ItemFetcher>,
    persister: Arc<dyn Persister>,
    limiter: ConcurrencyLimiter,
    options: DispatchOptions,
) -> mpsc::UnboundedReceiver<TaskResult> {
    let (tx, rx) = mpsc::unbounded_channel();

    debug!(
        "Dispatching {} tasks (concurrency={})",
        items.len(),
        limiter.capacity()
    );

    for item in items {
        let tx = tx.clone();
        let fetcher = Arc::clone(&fetcher);
        let persister = Arc::clone(&persister);
        let limiter = limiter.clone();
        let options = options.clone();

        tokio::spawn(async move {
            let error = run_task(&item, fetcher.as_ref(), persister.as_ref(), &limiter, &options)
                .await
                .err();
            let result = TaskResult {
                id: item.id,
                year: item.year,
                error,
            };
            if tx.send(result).is_err() {
                warn!("Result stream closed before task reported");
            }
        });
    }

    rx
}

async fn run_task(
    item: &DownloadItem,
    fetcher: &dyn ItemFetcher,
    persister: &dyn Persister,
    limiter: &ConcurrencyLimiter,
    options: &DispatchOptions,
) -> Result<(), TaskError> {
    let _permit = tokio::select! {
        biased;
        _ = options.cancel.cancelled() => return Err(TaskError::Cancelled),
        permit = limiter.acquire() => permit.map_err(|_| TaskError::LimiterClosed)?,
    };

    let fetch = catch_panics(fetcher.fetch(item));
    let bounded = async {
        match options.task_timeout {
            Some(limit) => tokio::time::timeout(limit, fetch)
                .await
                .unwrap_or(Err(TaskError::Timeout(limit))),
            None => fetch.await,
        }
    };
    let raw = tokio::select! {
        biased;
        _ = options.cancel.cancelled() => return Err(TaskError::Cancelled),
        outcome = bounded => outcome?,
    };

    // A started save always runs to completion, so a game reported as timed
    // out or cancelled is never on disk.
    catch_panics(persister.save(item.competition, item.year, &item.id, &raw)).await
}

async fn catch_panics<T, E>(work: impl Future<Output = Result<T, E>>) -> Result<T, TaskError>
where
    E: Into<TaskError>,
{
    match AssertUnwindSafe(work).catch_unwind().await {
        Ok(result) => result.map_err(Into::into),
        Err(payload) => Err(TaskError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
