//! Stub collaborators shared by the download tests.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{FetchError, PersistError};
use crate::models::{Competition, DownloadItem};
use crate::providers::ItemFetcher;
use crate::storage::Persister;

pub fn item(id: &str) -> DownloadItem {
    DownloadItem {
        id: id.to_string(),
        year: 2024,
        competition: Competition::Ncaab,
    }
}

/// Fetcher that sleeps, then returns `{"id": "<id>"}` unless told otherwise.
/// Records how many fetches overlapped and when each one ran.
pub struct StubFetcher {
    delay: Duration,
    fail_ids: HashSet<String>,
    panic_ids: HashSet<String>,
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: Mutex<Vec<(Instant, Instant)>>,
}

impl StubFetcher {
    pub fn new(delay: Duration) -> Self {
        StubFetcher {
            delay,
            fail_ids: HashSet::new(),
            panic_ids: HashSet::new(),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_on(mut self, id: &str) -> Self {
        self.fail_ids.insert(id.to_string());
        self
    }

    pub fn panic_on(mut self, id: &str) -> Self {
        self.panic_ids.insert(id.to_string());
        self
    }

    pub fn peak_concurrent(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// (start, end) of every completed call, in completion order.
    pub fn call_windows(&self) -> Vec<(Instant, Instant)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ItemFetcher for StubFetcher {
    async fn fetch(&self, item: &DownloadItem) -> Result<Vec<u8>, FetchError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let started = Instant::now();

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push((started, Instant::now()));

        if self.panic_ids.contains(&item.id) {
            panic!("stub panic for {}", item.id);
        }
        if self.fail_ids.contains(&item.id) {
            return Err(FetchError::Stub("stub failure".into()));
        }
        Ok(format!("{{\"id\":\"{}\"}}", item.id).into_bytes())
    }
}

/// Fetcher that fails every item.
pub struct FailingFetcher;

#[async_trait]
impl ItemFetcher for FailingFetcher {
    async fn fetch(&self, _item: &DownloadItem) -> Result<Vec<u8>, FetchError> {
        Err(FetchError::Stub("stub failure".into()))
    }
}

/// Persister that keeps saved payloads in memory, optionally after a delay.
#[derive(Default)]
pub struct MemoryPersister {
    delay: Duration,
    saved: Mutex<Vec<(Competition, i32, String)>>,
}

impl MemoryPersister {
    pub fn with_delay(delay: Duration) -> Self {
        MemoryPersister {
            delay,
            ..Default::default()
        }
    }

    pub fn saved(&self) -> Vec<(Competition, i32, String)> {
        self.saved.lock().unwrap().clone()
    }

    pub fn saved_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.saved().into_iter().map(|(_, _, id)| id).collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl Persister for MemoryPersister {
    async fn save(
        &self,
        competition: Competition,
        year: i32,
        id: &str,
        _raw: &[u8],
    ) -> Result<(), PersistError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.saved
            .lock()
            .unwrap()
            .push((competition, year, id.to_string()));
        Ok(())
    }
}
