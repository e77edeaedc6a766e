use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::models::{Competition, Provider};
use crate::providers::{BetGeniusCredentials, SportradarCredentials};

const CONFIG_FILE_NAME: &str = ".gamedl.yaml";
const DEFAULT_CONCURRENCY: usize = 10;
const DEFAULT_OUTPUT_DIR: &str = "downloaded_games";
const DEFAULT_TASK_TIMEOUT_SECS: u64 = 300;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Download game data from sports data providers
#[derive(Parser, Debug, Clone)]
#[command(name = "gamedl", version, about)]
pub struct Cli {
    /// Config file (default: $HOME/.gamedl.yaml, then ./.gamedl.yaml)
    #[arg(long, global = true, env = "GAMEDL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Download play-by-play files for every finished game of a competition
    Download(DownloadArgs),
    /// Print the version information
    Version {
        /// Also show commit hash and build date
        #[arg(short, long)]
        verbose: bool,
    },
}

/// `download` flags. Anything left unset here falls back to the config file,
/// then to the built-in default.
#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    /// Competition to download
    #[arg(short, long, env = "GAMEDL_DOWNLOAD_COMPETITION", value_enum)]
    pub competition: Option<Competition>,

    /// Data provider
    #[arg(short, long, env = "GAMEDL_DOWNLOAD_PROVIDER", value_enum)]
    pub provider: Option<Provider>,

    /// Seasons to download, comma-separated, e.g. 2023,2024 (default: all available)
    #[arg(short, long, env = "GAMEDL_DOWNLOAD_SEASONS", value_delimiter = ',')]
    pub seasons: Vec<i32>,

    /// Number of concurrent downloads [default: 10]
    #[arg(long, env = "GAMEDL_DOWNLOAD_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Directory to store downloaded game files [default: downloaded_games]
    #[arg(short, long, env = "GAMEDL_DOWNLOAD_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Per-game fetch deadline in seconds, 0 disables it [default: 300]
    #[arg(long, env = "GAMEDL_DOWNLOAD_TASK_TIMEOUT_SECS")]
    pub task_timeout_secs: Option<u64>,

    /// HTTP request timeout in seconds [default: 60]
    #[arg(long, env = "GAMEDL_HTTP_TIMEOUT_SECS")]
    pub http_timeout_secs: Option<u64>,

    /// Override the Sportradar API root, e.g. a production instead of a trial URL
    #[arg(long, env = "SPORTRADAR_BASE_URL")]
    pub sportradar_base_url: Option<String>,

    /// Serve every BetGenius endpoint from one root (proxy or mirror)
    #[arg(long, env = "BG_BASE_URL")]
    pub betgenius_base_url: Option<String>,

    #[command(flatten)]
    pub credentials: CredentialConfig,
}

/// Provider credentials. Only the ones for the selected provider are required.
#[derive(Args, Debug, Clone, Default)]
pub struct CredentialConfig {
    /// Sportradar NBA API key
    #[arg(long, env = "SPORTRADAR_NBA_KEY", hide_env_values = true)]
    pub sportradar_nba_key: Option<String>,

    /// Sportradar NCAA men's basketball API key
    #[arg(long, env = "SPORTRADAR_NCAAB_KEY", hide_env_values = true)]
    pub sportradar_ncaab_key: Option<String>,

    /// Sportradar NCAA football API key
    #[arg(long, env = "SPORTRADAR_NCAAF_KEY", hide_env_values = true)]
    pub sportradar_ncaaf_key: Option<String>,

    /// BetGenius fixtures API key
    #[arg(long, env = "BG_FIXTURE_KEY", hide_env_values = true)]
    pub bg_fixture_key: Option<String>,

    /// BetGenius fixtures login user
    #[arg(long, env = "BG_FIXTURE_USER")]
    pub bg_fixture_user: Option<String>,

    /// BetGenius fixtures login password
    #[arg(long, env = "BG_FIXTURE_PASSWORD", hide_env_values = true)]
    pub bg_fixture_password: Option<String>,

    /// BetGenius statistics API key
    #[arg(long, env = "BG_STATS_KEY", hide_env_values = true)]
    pub bg_stats_key: Option<String>,

    /// BetGenius statistics OAuth client id
    #[arg(long, env = "BG_STATS_USER")]
    pub bg_stats_user: Option<String>,

    /// BetGenius statistics OAuth client secret
    #[arg(long, env = "BG_STATS_PASSWORD", hide_env_values = true)]
    pub bg_stats_password: Option<String>,
}

impl CredentialConfig {
    pub fn sportradar(&self) -> SportradarCredentials {
        SportradarCredentials {
            nba_key: self.sportradar_nba_key.clone(),
            ncaab_key: self.sportradar_ncaab_key.clone(),
            ncaaf_key: self.sportradar_ncaaf_key.clone(),
        }
    }

    pub fn betgenius(&self) -> BetGeniusCredentials {
        BetGeniusCredentials {
            fixture_key: self.bg_fixture_key.clone(),
            fixture_user: self.bg_fixture_user.clone(),
            fixture_password: self.bg_fixture_password.clone(),
            stats_key: self.bg_stats_key.clone(),
            stats_user: self.bg_stats_user.clone(),
            stats_password: self.bg_stats_password.clone(),
        }
    }
}

// ── Config file ──────────────────────────────────────────────────────────────

/// Contents of `.gamedl.yaml`.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub download: DownloadSection,
}

/// The `download:` section. Keys mirror the long flag names.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DownloadSection {
    pub competition: Option<String>,
    pub provider: Option<String>,
    pub seasons: Option<SeasonList>,
    pub concurrency: Option<usize>,
    pub output_dir: Option<PathBuf>,
    pub task_timeout_secs: Option<u64>,
    pub http_timeout_secs: Option<u64>,
}

/// `seasons: [2023, 2024]` or `seasons: "2023,2024"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SeasonList {
    Years(Vec<i32>),
    Joined(String),
}

impl SeasonList {
    fn years(&self) -> Result<Vec<i32>> {
        match self {
            SeasonList::Years(years) => Ok(years.clone()),
            SeasonList::Joined(joined) => joined
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<i32>()
                        .with_context(|| format!("invalid season in config file: {:?}", s))
                })
                .collect(),
        }
    }
}

impl FileConfig {
    /// Load the config file. An explicit path must exist; otherwise the home
    /// directory and then the working directory are searched, and a missing
    /// file yields the empty config.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let candidates = dirs::home_dir()
                    .map(|home| home.join(CONFIG_FILE_NAME))
                    .into_iter()
                    .chain(std::iter::once(PathBuf::from(CONFIG_FILE_NAME)));
                match candidates.into_iter().find(|p| p.is_file()) {
                    Some(path) => path,
                    None => return Ok(FileConfig::default()),
                }
            }
        };

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config = Self::parse(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        info!("Using config file: {}", path.display());
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        // An empty file deserializes as YAML null.
        if text.trim().is_empty() {
            return Ok(FileConfig::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }
}

// ── Resolved settings ────────────────────────────────────────────────────────

/// Download settings after merging flags, environment, config file and
/// defaults, in that order of precedence.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub competition: Competition,
    pub provider: Provider,
    pub seasons: Vec<i32>,
    pub concurrency: usize,
    pub output_dir: PathBuf,
    pub task_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub sportradar_base_url: Option<String>,
    pub betgenius_base_url: Option<String>,
    pub credentials: CredentialConfig,
}

impl DownloadArgs {
    pub fn resolve(self, file: DownloadSection) -> Result<DownloadConfig> {
        let competition = match (self.competition, file.competition) {
            (Some(c), _) => c,
            (None, Some(name)) => Competition::from_str(&name, true).map_err(|_| {
                anyhow::anyhow!("unknown competition in config file: {}", name)
            })?,
            (None, None) => anyhow::bail!(
                "competition is required (--competition, GAMEDL_DOWNLOAD_COMPETITION or download.competition)"
            ),
        };
        let provider = match (self.provider, file.provider) {
            (Some(p), _) => p,
            (None, Some(name)) => Provider::from_str(&name, true)
                .map_err(|_| anyhow::anyhow!("unknown provider in config file: {}", name))?,
            (None, None) => anyhow::bail!(
                "provider is required (--provider, GAMEDL_DOWNLOAD_PROVIDER or download.provider)"
            ),
        };
        let seasons = match (self.seasons.is_empty(), &file.seasons) {
            (true, Some(list)) => list.years()?,
            _ => self.seasons,
        };

        Ok(DownloadConfig {
            competition,
            provider,
            seasons,
            concurrency: self
                .concurrency
                .or(file.concurrency)
                .unwrap_or(DEFAULT_CONCURRENCY),
            output_dir: self
                .output_dir
                .or(file.output_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            task_timeout_secs: self
                .task_timeout_secs
                .or(file.task_timeout_secs)
                .unwrap_or(DEFAULT_TASK_TIMEOUT_SECS),
            http_timeout_secs: self
                .http_timeout_secs
                .or(file.http_timeout_secs)
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            sportradar_base_url: self.sportradar_base_url,
            betgenius_base_url: self.betgenius_base_url,
            credentials: self.credentials,
        })
    }
}

impl DownloadConfig {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be at least 1");
        }
        if self.http_timeout_secs == 0 {
            anyhow::bail!("http_timeout_secs must be positive");
        }
        match (self.provider, self.competition) {
            (Provider::Sportradar, Competition::Nfl) => {
                anyhow::bail!("unsupported competition for Sportradar: nfl")
            }
            (Provider::Sportradar, competition) => {
                self.credentials.sportradar().key_for(competition)?;
            }
            (Provider::Betgenius, Competition::Nfl) => self.credentials.betgenius().validate()?,
            (Provider::Betgenius, competition) => {
                anyhow::bail!("unsupported competition for BetGenius: {}", competition)
            }
        }
        Ok(())
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        (self.task_timeout_secs > 0).then(|| Duration::from_secs(self.task_timeout_secs))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
