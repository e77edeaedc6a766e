pub mod betgenius;
pub mod sportradar;
pub mod token_cache;

pub use betgenius::{BetGeniusClient, BetGeniusCredentials};
pub use sportradar::{SportradarClient, SportradarCredentials};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use std::time::Duration;

use crate::error::FetchError;
use crate::models::{DownloadItem, ScheduledItem};

/// Fetches the raw payload of one game.
#[async_trait]
pub trait ItemFetcher: Send + Sync {
    /// Issue one authenticated read for the item and return the body unmodified.
    async fn fetch(&self, item: &DownloadItem) -> Result<Vec<u8>, FetchError>;
}

/// Lists the games a provider knows about.
#[async_trait]
pub trait ScheduleSource: Send + Sync {
    /// Every game of the requested years, with its provider status.
    /// An empty `years` slice means all seasons the provider lists.
    async fn list_items(&self, years: &[i32]) -> Result<Vec<ScheduledItem>>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// Build the shared HTTP client used by provider clients.
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("gamedl/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

/// Send a request and return the body, mapping non-2xx replies to
/// [`FetchError::Status`].
pub(crate) async fn read_body(request: RequestBuilder) -> Result<Vec<u8>, FetchError> {
    let resp = request.send().await?;
    let status = resp.status();
    let body = resp.bytes().await?;

    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }

    Ok(body.to_vec())
}

/// Keep only the requested years; an empty filter keeps everything.
pub(crate) fn year_requested(years: &[i32], year: i32) -> bool {
    years.is_empty() || years.contains(&year)
}
