//! Fixed-size permit pool bounding how many download tasks run at once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::DownloadError;

/// Concurrency ceiling shared by every task of a batch.
///
/// Permits are RAII guards: dropping a [`LimiterPermit`] returns it to the
/// pool, so a task releases its permit on every exit path, including errors,
/// timeouts and panics.
#[derive(Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    stats: Arc<InFlight>,
}

#[derive(Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

/// One acquired unit of the concurrency ceiling.
pub struct LimiterPermit {
    _permit: OwnedSemaphorePermit,
    stats: Arc<InFlight>,
}

impl Drop for LimiterPermit {
    fn drop(&mut self) {
        self.stats.current.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConcurrencyLimiter {
    pub fn new(concurrency: usize) -> Result<Self, DownloadError> {
        if concurrency == 0 {
            return Err(DownloadError::InvalidConcurrency(concurrency));
        }
        Ok(ConcurrencyLimiter {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            capacity: concurrency,
            stats: Arc::new(InFlight::default()),
        })
    }

    /// Wait until a permit is free.
    pub async fn acquire(&self) -> Result<LimiterPermit, DownloadError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DownloadError::LimiterClosed)?;

        let now = self.stats.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.peak.fetch_max(now, Ordering::SeqCst);

        Ok(LimiterPermit {
            _permit: permit,
            stats: Arc::clone(&self.stats),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Permits currently held by tasks.
    pub fn in_flight(&self) -> usize {
        self.stats.current.load(Ordering::SeqCst)
    }

    /// Stop handing out permits; pending and future `acquire` calls fail.
    #[cfg(test)]
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Highest number of permits held at the same time since construction.
    pub fn peak_in_flight(&self) -> usize {
        self.stats.peak.load(Ordering::SeqCst)
    }
}
