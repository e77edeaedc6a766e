pub mod aggregator;
pub mod dispatcher;
pub mod limiter;
#[cfg(test)]
pub(crate) mod test_support;

pub use aggregator::Aggregator;
pub use dispatcher::{dispatch, filter_ready, DispatchOptions};
pub use limiter::ConcurrencyLimiter;

use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::DownloadError;
use crate::models::{BatchReport, Competition, DownloadItem, ScheduledItem};
use crate::providers::{ItemFetcher, ScheduleSource};
use crate::storage::{JsonFilePersister, Persister};

/// Download every item under a concurrency ceiling and report per-item
/// outcomes.
///
/// Returns an error only when the batch cannot start (invalid concurrency).
/// Once tasks are dispatched every failure lands in
/// [`BatchReport::failures`].
pub async fn run_batch<W: Write>(
    items: Vec<DownloadItem>,
    concurrency: usize,
    fetcher: Arc<dyn ItemFetcher>,
    persister: Arc<dyn Persister>,
    options: DispatchOptions,
    progress: W,
) -> Result<BatchReport, DownloadError> {
    let limiter = ConcurrencyLimiter::new(concurrency)?;
    let total = items.len();

    let rx = dispatch(items, fetcher, persister, limiter.clone(), options);
    let report = Aggregator::new(total, progress).drain(rx).await;

    info!(
        "Peak concurrent downloads: {}/{}",
        limiter.peak_in_flight(),
        limiter.capacity()
    );
    debug!(
        "Limiter after batch: {} permits free, {} held",
        limiter.available(),
        limiter.in_flight()
    );
    Ok(report)
}

/// What to download and how.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub competition: Competition,
    /// Provider status that marks a game ready, e.g. "closed"
    pub ready_status: String,
    /// Years to include; empty means all seasons
    pub years: Vec<i32>,
    pub concurrency: usize,
    pub options: DispatchOptions,
}

/// Enumerates a provider schedule, prepares the output tree and runs the
/// batch.
pub struct Downloader {
    schedule: Arc<dyn ScheduleSource>,
    fetcher: Arc<dyn ItemFetcher>,
    persister: Arc<JsonFilePersister>,
}

impl Downloader {
    pub fn new(
        schedule: Arc<dyn ScheduleSource>,
        fetcher: Arc<dyn ItemFetcher>,
        persister: JsonFilePersister,
    ) -> Self {
        Downloader {
            schedule,
            fetcher,
            persister: Arc::new(persister),
        }
    }

    pub async fn run<W: Write>(&self, request: DownloadRequest, progress: W) -> Result<BatchReport> {
        // Reject a bad ceiling before talking to the provider.
        ConcurrencyLimiter::new(request.concurrency)?;

        info!(
            "Getting {} game ids from {} for seasons {}...",
            request.competition,
            self.schedule.name(),
            describe_years(&request.years)
        );
        let scheduled = self
            .schedule
            .list_items(&request.years)
            .await
            .context("getting games")?;

        log_status_counts(&scheduled);
        let items = filter_ready(scheduled, &request.ready_status);
        if items.is_empty() {
            info!("No {} games found", request.ready_status);
            return Ok(BatchReport::default());
        }

        let years: BTreeSet<i32> = items.iter().map(|i| i.year).collect();
        for year in years {
            self.persister
                .create_year_dir(request.competition, year)
                .await
                .with_context(|| format!("creating directory for year {}", year))?;
        }

        info!(
            "Downloading {} {} games to {} (concurrency={})",
            items.len(),
            request.competition,
            self.persister.root().display(),
            request.concurrency
        );

        let persister: Arc<dyn Persister> = self.persister.clone();
        let report = run_batch(
            items,
            request.concurrency,
            Arc::clone(&self.fetcher),
            persister,
            request.options,
            progress,
        )
        .await?;
        Ok(report)
    }
}

fn describe_years(years: &[i32]) -> String {
    if years.is_empty() {
        "all available".to_string()
    } else {
        format!("{:?}", years)
    }
}

fn log_status_counts(scheduled: &[ScheduledItem]) {
    let mut per_year: BTreeMap<i32, BTreeMap<&str, usize>> = BTreeMap::new();
    for s in scheduled {
        *per_year
            .entry(s.item.year)
            .or_default()
            .entry(s.status.as_str())
            .or_default() += 1;
    }
    for (year, statuses) in per_year {
        let games: usize = statuses.values().sum();
        info!("Year: {}, Games: {}", year, games);
        for (status, count) in statuses {
            info!("  Status: {}, Count: {}", status, count);
        }
    }
}
