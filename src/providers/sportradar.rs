use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::debug;
use url::Url;

use super::{read_body, year_requested, ItemFetcher, ScheduleSource};
use crate::error::FetchError;
use crate::models::{Competition, DownloadItem, ScheduledItem};

const NBA_BASE_URL: &str = "https://api.sportradar.com/nba/trial/v8";
const NCAAB_BASE_URL: &str = "https://api.sportradar.com/ncaamb/trial/v8";
const NCAAF_BASE_URL: &str = "https://api.sportradar.com/ncaafb/trial/v7";

/// Per-competition Sportradar API keys.
#[derive(Debug, Clone, Default)]
pub struct SportradarCredentials {
    pub nba_key: Option<String>,
    pub ncaab_key: Option<String>,
    pub ncaaf_key: Option<String>,
}

impl SportradarCredentials {
    pub fn key_for(&self, competition: Competition) -> Result<&str> {
        let (key, var) = match competition {
            Competition::Nba => (&self.nba_key, "SPORTRADAR_NBA_KEY"),
            Competition::Ncaab => (&self.ncaab_key, "SPORTRADAR_NCAAB_KEY"),
            Competition::Ncaaf => (&self.ncaaf_key, "SPORTRADAR_NCAAF_KEY"),
            Competition::Nfl => anyhow::bail!("unsupported competition for Sportradar: nfl"),
        };
        key.as_deref()
            .filter(|k| !k.is_empty())
            .with_context(|| format!("{} is not set", var))
    }
}

/// Sportradar client bound to one competition. Authenticates with an
/// `api_key` query parameter, so no token cache is involved.
#[derive(Clone)]
pub struct SportradarClient {
    http: Client,
    competition: Competition,
    api_key: String,
    base_url: String,
}

impl SportradarClient {
    pub fn new(http: Client, competition: Competition, credentials: &SportradarCredentials) -> Result<Self> {
        let api_key = credentials.key_for(competition)?.to_string();
        let base_url = match competition {
            Competition::Nba => NBA_BASE_URL,
            Competition::Ncaab => NCAAB_BASE_URL,
            Competition::Ncaaf => NCAAF_BASE_URL,
            Competition::Nfl => anyhow::bail!("unsupported competition for Sportradar: nfl"),
        };
        Ok(SportradarClient {
            http,
            competition,
            api_key,
            base_url: base_url.to_string(),
        })
    }

    /// Point the client at a different API root (trial vs production, or tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))?;
        url.query_pairs_mut().append_pair("api_key", &self.api_key);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        debug!("GET {}{}", self.base_url, path);
        let body = read_body(self.http.get(url))
            .await
            .with_context(|| format!("Sportradar request {} failed", path))?;
        serde_json::from_slice(&body).with_context(|| format!("could not decode {}", path))
    }

    async fn season_years(&self, years: &[i32]) -> Result<BTreeSet<i32>> {
        let reply: SeasonsReply = self
            .get_json("/en/league/seasons.json")
            .await
            .context("getting seasons")?;

        // NBA lists preseason and postseason separately; only the regular season
        // has a schedule under /REG/.
        let regular_only = self.competition == Competition::Nba;

        Ok(reply
            .seasons
            .iter()
            .filter(|s| !regular_only || s.season_type.as_ref().is_some_and(|t| t.code == "REG"))
            .map(|s| s.year)
            .filter(|year| year_requested(years, *year))
            .collect())
    }
}

#[async_trait]
impl ScheduleSource for SportradarClient {
    async fn list_items(&self, years: &[i32]) -> Result<Vec<ScheduledItem>> {
        let mut items = Vec::new();

        for year in self.season_years(years).await? {
            let schedule: GameSchedule = self
                .get_json(&format!("/en/games/{}/REG/schedule.json", year))
                .await
                .with_context(|| format!("getting game schedule for year {}", year))?;

            let games = schedule
                .games
                .into_iter()
                .chain(schedule.weeks.into_iter().flat_map(|w| w.games));
            for game in games {
                items.push(ScheduledItem {
                    item: DownloadItem {
                        id: game.id,
                        year,
                        competition: self.competition,
                    },
                    status: game.status,
                });
            }
        }

        Ok(items)
    }

    fn name(&self) -> &str {
        "Sportradar"
    }
}

#[async_trait]
impl ItemFetcher for SportradarClient {
    async fn fetch(&self, item: &DownloadItem) -> Result<Vec<u8>, FetchError> {
        let url = self.endpoint(&format!("/en/games/{}/pbp.json", item.id))?;
        read_body(self.http.get(url)).await
    }
}

// ── Wire models ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SeasonsReply {
    #[serde(default)]
    seasons: Vec<SeasonInfo>,
}

#[derive(Debug, Deserialize)]
struct SeasonInfo {
    year: i32,
    #[serde(rename = "type", default)]
    season_type: Option<SeasonType>,
}

#[derive(Debug, Deserialize)]
struct SeasonType {
    #[serde(default)]
    code: String,
}

/// NBA and NCAAB list `games` at the top level; NCAAF nests them in `weeks`.
#[derive(Debug, Deserialize)]
struct GameSchedule {
    #[serde(default)]
    games: Vec<GameEntry>,
    #[serde(default)]
    weeks: Vec<WeekEntry>,
}

#[derive(Debug, Deserialize)]
struct WeekEntry {
    #[serde(default)]
    games: Vec<GameEntry>,
}

#[derive(Debug, Deserialize)]
struct GameEntry {
    id: String,
    #[serde(default)]
    status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::providers::http_client;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> SportradarCredentials {
        SportradarCredentials {
            nba_key: Some("nba-key".into()),
            ncaab_key: Some("ncaab-key".into()),
            ncaaf_key: Some("ncaaf-key".into()),
        }
    }

    fn client(server: &MockServer, competition: Competition) -> SportradarClient {
        let http = http_client(Duration::from_secs(5)).unwrap();
        SportradarClient::new(http, competition, &credentials())
            .unwrap()
            .with_base_url(&server.uri())
    }

    #[tokio::test]
    async fn test_nba_lists_regular_season_games_for_requested_years() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/en/league/seasons.json"))
            .and(query_param("api_key", "nba-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "seasons": [
                    { "id": "a", "year": 2022, "type": { "code": "PRE" } },
                    { "id": "b", "year": 2022, "type": { "code": "REG" } },
                    { "id": "c", "year": 2023, "type": { "code": "REG" } },
                    { "id": "d", "year": 2023, "type": { "code": "PST" } },
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/en/games/2023/REG/schedule.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "games": [
                    { "id": "g1", "status": "closed" },
                    { "id": "g2", "status": "scheduled" },
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let items = client(&server, Competition::Nba)
            .list_items(&[2023])
            .await
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].item.id, "g1");
        assert_eq!(items[0].item.year, 2023);
        assert_eq!(items[0].item.competition, Competition::Nba);
        assert_eq!(items[0].status, "closed");
        assert_eq!(items[1].status, "scheduled");
    }

    #[tokio::test]
    async fn test_ncaaf_flattens_weeks() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/en/league/seasons.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "seasons": [{ "year": 2021, "type": { "code": "REG" } }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/en/games/2021/REG/schedule.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "year": 2021,
                "weeks": [
                    { "sequence": 1, "games": [{ "id": "w1g1", "status": "closed" }] },
                    { "sequence": 2, "games": [
                        { "id": "w2g1", "status": "closed" },
                        { "id": "w2g2", "status": "closed" }
                    ] },
                ]
            })))
            .mount(&server)
            .await;

        let items = client(&server, Competition::Ncaaf)
            .list_items(&[])
            .await
            .unwrap();

        let ids: Vec<_> = items.iter().map(|i| i.item.id.as_str()).collect();
        assert_eq!(ids, vec!["w1g1", "w2g1", "w2g2"]);
    }

    #[tokio::test]
    async fn test_schedule_failure_is_reported_with_year() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/en/league/seasons.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "seasons": [{ "year": 2020, "type": { "code": "REG" } }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/en/games/2020/REG/schedule.json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client(&server, Competition::Ncaab)
            .list_items(&[])
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("year 2020"));
    }

    #[tokio::test]
    async fn test_fetch_returns_raw_pbp() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/en/games/abc-123/pbp.json"))
            .and(query_param("api_key", "ncaab-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"id\":\"abc-123\"}"))
            .mount(&server)
            .await;

        let sr = client(&server, Competition::Ncaab);
        let item = DownloadItem {
            id: "abc-123".into(),
            year: 2024,
            competition: Competition::Ncaab,
        };
        let body = sr.fetch(&item).await.unwrap();
        assert_eq!(body, b"{\"id\":\"abc-123\"}");
    }

    #[tokio::test]
    async fn test_transport_errors_do_not_expose_api_key() {
        let creds = SportradarCredentials {
            ncaab_key: Some("SECRET-KEY".into()),
            ..Default::default()
        };
        let http = http_client(Duration::from_secs(5)).unwrap();
        // Nothing listens on port 1, so every request fails to connect.
        let sr = SportradarClient::new(http, Competition::Ncaab, &creds)
            .unwrap()
            .with_base_url("http://127.0.0.1:1");

        let item = DownloadItem {
            id: "g1".into(),
            year: 2024,
            competition: Competition::Ncaab,
        };
        let err = TaskError::from(sr.fetch(&item).await.unwrap_err());
        assert!(err.to_string().starts_with("request failed"));
        assert!(!err.to_string().contains("SECRET-KEY"));

        let err = sr.list_items(&[]).await.unwrap_err();
        assert!(!format!("{:#}", err).contains("SECRET-KEY"));
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let http = http_client(Duration::from_secs(5)).unwrap();
        let err = SportradarClient::new(http, Competition::Nba, &SportradarCredentials::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("SPORTRADAR_NBA_KEY"));
    }

    #[test]
    fn test_nfl_is_unsupported() {
        let http = http_client(Duration::from_secs(5)).unwrap();
        assert!(SportradarClient::new(http, Competition::Nfl, &credentials()).is_err());
    }
}
