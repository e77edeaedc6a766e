use std::time::Duration;
use thiserror::Error;

/// Failure while obtaining a provider access token.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("could not reach auth endpoint for {scope}: {source}")]
    Transport {
        scope: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("auth endpoint for {scope} returned {status}: {body}")]
    Rejected {
        scope: String,
        status: u16,
        body: String,
    },

    #[error("could not decode auth reply for {scope}: {reason}")]
    Malformed { scope: String, reason: String },
}

/// Failure while fetching one item from a provider.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("could not get authed request: {0}")]
    Auth(#[from] AuthError),

    /// Always stored without its URL: Sportradar keys ride in the query string.
    #[error("request failed: {0}")]
    Transport(reqwest::Error),

    #[error("bad status code: {status}, body: {body}")]
    Status { status: u16, body: String },

    #[error("invalid request url: {0}")]
    Url(#[from] url::ParseError),

    #[cfg(test)]
    #[error("{0}")]
    Stub(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Transport(err.without_url())
    }
}

/// Failure while writing a downloaded payload to disk.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("indenting game pbp: {0}")]
    Indent(#[from] serde_json::Error),

    #[error("saving game pbp to {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of a single download task that did not succeed.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("cancelled before completion")]
    Cancelled,

    #[error("concurrency limiter closed")]
    LimiterClosed,

    #[error("task panicked: {0}")]
    Panicked(String),
}

/// Errors that abort a batch before any task is dispatched.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("concurrency must be at least 1, got {0}")]
    InvalidConcurrency(usize),

    #[error("concurrency limiter closed")]
    LimiterClosed,

    #[error("creating directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
