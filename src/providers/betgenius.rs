//! BetGenius client.
//!
//! BetGenius needs two credential scopes with separate tokens:
//! - **fixtures** (v1 login, JSON user/password) for season and fixture listings
//! - **statistics** (OAuth client credentials, basic auth) for match state
//!   payloads
//!
//! Each scope is backed by its own [`TokenCache`] shared by every task.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDateTime};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::token_cache::{IssuedToken, TokenCache, TokenSource};
use super::{read_body, year_requested, ItemFetcher, ScheduleSource};
use crate::error::{AuthError, FetchError};
use crate::models::{Competition, DownloadItem, ScheduledItem};

/// BetGenius competition id for the NFL
const NFL_COMPETITION_ID: &str = "296";
const SEASON_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Fixtures and statistics credentials.
#[derive(Debug, Clone, Default)]
pub struct BetGeniusCredentials {
    pub fixture_key: Option<String>,
    pub fixture_user: Option<String>,
    pub fixture_password: Option<String>,
    pub stats_key: Option<String>,
    pub stats_user: Option<String>,
    pub stats_password: Option<String>,
}

impl BetGeniusCredentials {
    /// Fail with the name of the first missing variable.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            (&self.fixture_key, "BG_FIXTURE_KEY"),
            (&self.fixture_user, "BG_FIXTURE_USER"),
            (&self.fixture_password, "BG_FIXTURE_PASSWORD"),
            (&self.stats_key, "BG_STATS_KEY"),
            (&self.stats_user, "BG_STATS_USER"),
            (&self.stats_password, "BG_STATS_PASSWORD"),
        ];
        for (value, var) in fields {
            if value.as_deref().map_or(true, str::is_empty) {
                anyhow::bail!("{} is not set", var);
            }
        }
        Ok(())
    }
}

/// API roots. Overridable for tests.
#[derive(Debug, Clone)]
pub struct BetGeniusEndpoints {
    pub auth_v1: String,
    pub auth_oauth: String,
    pub fixtures_v1: String,
    pub fixtures_v2: String,
}

impl Default for BetGeniusEndpoints {
    fn default() -> Self {
        BetGeniusEndpoints {
            auth_v1: "https://api.geniussports.com/Auth-v1/PROD/login".into(),
            auth_oauth: "https://auth.api.geniussports.com/oauth2/token?grant_type=client_credentials&scope=statistics-api%2Fstatistics%3Aread%20statistics-api%2Fliveaccess%3Aread%20matchstateapi%2Fmatchstate%3Aread%20matchstateapi%2Fgranularity%3Aread".into(),
            fixtures_v1: "https://api.geniussports.com/Fixtures-v1/PRODPRM".into(),
            fixtures_v2: "https://platform.matchstate.api.geniussports.com/api/v2/sources/GeniusPremium/sports/17".into(),
        }
    }
}

impl BetGeniusEndpoints {
    /// Every endpoint under one root; used against a mock server.
    pub fn rooted_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        BetGeniusEndpoints {
            auth_v1: format!("{}/auth/v1/login", base),
            auth_oauth: format!("{}/oauth2/token", base),
            fixtures_v1: format!("{}/fixtures/v1", base),
            fixtures_v2: format!("{}/matchstate/v2", base),
        }
    }
}

// ── Token sources ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct LoginRequest<'a> {
    user: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginReply {
    #[serde(rename = "IdToken", default)]
    id_token: String,
    #[serde(rename = "ExpiresIn", default)]
    expires_in: u64,
}

#[derive(Deserialize)]
struct OAuthReply {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

/// Fixtures scope: POST JSON credentials, cache the returned id token.
struct LoginTokenSource {
    http: Client,
    url: String,
    user: String,
    password: String,
}

/// Statistics scope: OAuth client-credentials grant with basic auth.
struct OAuthTokenSource {
    http: Client,
    url: String,
    user: String,
    password: String,
}

async fn request_token<T: DeserializeOwned>(
    scope: &str,
    request: RequestBuilder,
) -> Result<T, AuthError> {
    let resp = request.send().await.map_err(|source| AuthError::Transport {
        scope: scope.to_string(),
        source,
    })?;
    let status = resp.status();
    let body = resp.bytes().await.map_err(|source| AuthError::Transport {
        scope: scope.to_string(),
        source,
    })?;

    if !status.is_success() {
        return Err(AuthError::Rejected {
            scope: scope.to_string(),
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }

    serde_json::from_slice(&body).map_err(|e| AuthError::Malformed {
        scope: scope.to_string(),
        reason: e.to_string(),
    })
}

fn issued(scope: &str, value: String, expires_in: u64) -> Result<IssuedToken, AuthError> {
    if value.is_empty() {
        return Err(AuthError::Malformed {
            scope: scope.to_string(),
            reason: "reply carried no token".into(),
        });
    }
    Ok(IssuedToken {
        value,
        expires_in: Duration::from_secs(expires_in),
    })
}

#[async_trait]
impl TokenSource for LoginTokenSource {
    async fn authenticate(&self) -> Result<IssuedToken, AuthError> {
        let request = self.http.post(&self.url).json(&LoginRequest {
            user: &self.user,
            password: &self.password,
        });
        let reply: LoginReply = request_token(self.scope(), request).await?;
        issued(self.scope(), reply.id_token, reply.expires_in)
    }

    fn scope(&self) -> &str {
        "betgenius-fixtures"
    }
}

#[async_trait]
impl TokenSource for OAuthTokenSource {
    async fn authenticate(&self) -> Result<IssuedToken, AuthError> {
        let request = self
            .http
            .post(&self.url)
            .basic_auth(&self.user, Some(&self.password));
        let reply: OAuthReply = request_token(self.scope(), request).await?;
        issued(self.scope(), reply.access_token, reply.expires_in)
    }

    fn scope(&self) -> &str {
        "betgenius-stats"
    }
}

// ── Client ─────────────────────────────────────────────────────────────────────

/// BetGenius NFL client. Cloning shares both token caches.
#[derive(Clone)]
pub struct BetGeniusClient {
    http: Client,
    competition: Competition,
    competition_id: &'static str,
    endpoints: Arc<BetGeniusEndpoints>,
    fixture_key: String,
    stats_key: String,
    fixtures_token: TokenCache,
    stats_token: TokenCache,
}

impl BetGeniusClient {
    pub fn new(
        http: Client,
        competition: Competition,
        credentials: &BetGeniusCredentials,
        endpoints: BetGeniusEndpoints,
    ) -> Result<Self> {
        let competition_id = match competition {
            Competition::Nfl => NFL_COMPETITION_ID,
            other => anyhow::bail!("unsupported competition for BetGenius: {}", other),
        };
        credentials.validate()?;
        let owned = |v: &Option<String>| v.clone().unwrap_or_default();

        let fixtures_token = TokenCache::new(Arc::new(LoginTokenSource {
            http: http.clone(),
            url: endpoints.auth_v1.clone(),
            user: owned(&credentials.fixture_user),
            password: owned(&credentials.fixture_password),
        }));
        let stats_token = TokenCache::new(Arc::new(OAuthTokenSource {
            http: http.clone(),
            url: endpoints.auth_oauth.clone(),
            user: owned(&credentials.stats_user),
            password: owned(&credentials.stats_password),
        }));

        Ok(BetGeniusClient {
            http,
            competition,
            competition_id,
            endpoints: Arc::new(endpoints),
            fixture_key: owned(&credentials.fixture_key),
            stats_key: owned(&credentials.stats_key),
            fixtures_token,
            stats_token,
        })
    }

    async fn fixtures_request(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let token = self.fixtures_token.get_token().await?;
        let request = self
            .http
            .get(url)
            .bearer_auth(token)
            .header("X-Api-Key", &self.fixture_key);
        read_body(request).await
    }

    async fn fixtures_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("GET {}", url);
        let body = self
            .fixtures_request(url)
            .await
            .with_context(|| format!("BetGenius request {} failed", url))?;
        serde_json::from_slice(&body).with_context(|| format!("could not decode {}", url))
    }
}

#[async_trait]
impl ScheduleSource for BetGeniusClient {
    async fn list_items(&self, years: &[i32]) -> Result<Vec<ScheduledItem>> {
        let seasons_url = format!(
            "{}/competitions/{}/seasons",
            self.endpoints.fixtures_v1, self.competition_id
        );
        let seasons: SeasonsReply = self
            .fixtures_json(&seasons_url)
            .await
            .context("getting seasons")?;

        let mut items = Vec::new();
        for season in seasons.embedded.seasons {
            let Some(year) = season.year() else {
                warn!(
                    "Skipping season {} with unparseable start date {:?}",
                    season.id, season.properties.start_date
                );
                continue;
            };
            if !year_requested(years, year) {
                continue;
            }

            let fixtures_url = format!("{}/seasons/{}/fixtures", self.endpoints.fixtures_v1, season.id);
            let fixtures: FixturesReply = self
                .fixtures_json(&fixtures_url)
                .await
                .with_context(|| format!("getting game schedule for year {}", year))?;

            for fixture in fixtures.embedded.fixtures {
                items.push(ScheduledItem {
                    item: DownloadItem {
                        id: fixture.id.to_string(),
                        year,
                        competition: self.competition,
                    },
                    status: fixture.status_type,
                });
            }
        }

        Ok(items)
    }

    fn name(&self) -> &str {
        "BetGenius"
    }
}

#[async_trait]
impl ItemFetcher for BetGeniusClient {
    async fn fetch(&self, item: &DownloadItem) -> Result<Vec<u8>, FetchError> {
        let token = self.stats_token.get_token().await?;
        let url = format!("{}/fixtures/{}", self.endpoints.fixtures_v2, item.id);
        let request = self
            .http
            .get(url)
            .bearer_auth(token)
            .header("X-Api-Key", &self.stats_key);
        read_body(request).await
    }
}

// ── Wire models ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SeasonsReply {
    #[serde(rename = "_embedded", default)]
    embedded: EmbeddedSeasons,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddedSeasons {
    #[serde(default)]
    seasons: Vec<Season>,
}

#[derive(Debug, Deserialize)]
struct Season {
    id: i64,
    #[serde(rename = "seasonproperty", default)]
    properties: SeasonProperties,
}

#[derive(Debug, Default, Deserialize)]
struct SeasonProperties {
    #[serde(rename = "startDate", default)]
    start_date: String,
}

impl Season {
    fn year(&self) -> Option<i32> {
        NaiveDateTime::parse_from_str(&self.properties.start_date, SEASON_DATE_FORMAT)
            .ok()
            .map(|d| d.year())
    }
}

#[derive(Debug, Deserialize)]
struct FixturesReply {
    #[serde(rename = "_embedded", default)]
    embedded: EmbeddedFixtures,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddedFixtures {
    #[serde(default)]
    fixtures: Vec<Fixture>,
}

#[derive(Debug, Deserialize)]
struct Fixture {
    id: i64,
    #[serde(rename = "statusType", default)]
    status_type: String,
}
