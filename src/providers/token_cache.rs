//! Shared, lazily refreshed access-token cache.
//!
//! One `TokenCache` exists per credential scope (e.g. the BetGenius fixtures
//! login and the BetGenius statistics OAuth flow each get their own). Every
//! download task clones the same cache and calls [`TokenCache::get_token`].
//!
//! Reads go through a shared lock. A refresh is single-flight: the first
//! caller that sees an expired token takes the refresh mutex and authenticates,
//! and callers queued behind it re-check the cache and reuse the new token
//! instead of logging in again.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::AuthError;

/// A token as issued by an authentication endpoint.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub value: String,
    /// Lifetime reported by the endpoint, relative to issue time
    pub expires_in: Duration,
}

/// One authentication flow. Implementations perform exactly one network call
/// per `authenticate` and never retry.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn authenticate(&self) -> Result<IssuedToken, AuthError>;

    /// Scope name for logging.
    fn scope(&self) -> &str;
}

#[derive(Debug, Clone, Default)]
struct CachedToken {
    value: String,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn valid_at(&self, now: Instant) -> Option<&str> {
        match self.expires_at {
            Some(expires_at) if now < expires_at => Some(&self.value),
            _ => None,
        }
    }
}

/// Thread-safe cache holding one token for one credential scope.
#[derive(Clone)]
pub struct TokenCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    source: Arc<dyn TokenSource>,
    token: RwLock<CachedToken>,
    /// Serialises refreshes so concurrent callers trigger one login
    refresh: Mutex<()>,
}

impl TokenCache {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        TokenCache {
            inner: Arc::new(CacheInner {
                source,
                token: RwLock::new(CachedToken::default()),
                refresh: Mutex::new(()),
            }),
        }
    }

    pub fn scope(&self) -> &str {
        self.inner.source.scope()
    }

    /// Return a non-expired token, authenticating first if the cache is empty
    /// or the cached token has expired.
    pub async fn get_token(&self) -> Result<String, AuthError> {
        if let Some(value) = self.cached().await {
            return Ok(value);
        }

        let _refresh = self.inner.refresh.lock().await;

        // Another caller may have refreshed while we waited for the mutex.
        if let Some(value) = self.cached().await {
            debug!("Reusing token refreshed concurrently for {}", self.scope());
            return Ok(value);
        }

        let requested_at = Instant::now();
        let issued = self.inner.source.authenticate().await?;
        if issued.expires_in.is_zero() {
            return Err(AuthError::Malformed {
                scope: self.scope().to_string(),
                reason: "token has no lifetime".into(),
            });
        }
        // Anchoring at request time shortens the lifetime by the round trip.
        let expires_at = requested_at + issued.expires_in;
        if expires_at <= Instant::now() {
            warn!(
                "{} token lifetime {:?} is shorter than the login round trip",
                self.scope(),
                issued.expires_in
            );
        }

        let mut token = self.inner.token.write().await;
        *token = CachedToken {
            value: issued.value.clone(),
            expires_at: Some(expires_at),
        };
        info!(
            "Refreshed {} token (valid for {:?})",
            self.scope(),
            issued.expires_in.saturating_sub(requested_at.elapsed())
        );

        Ok(issued.value)
    }

    async fn cached(&self) -> Option<String> {
        let token = self.inner.token.read().await;
        token.valid_at(Instant::now()).map(str::to_string)
    }
}
