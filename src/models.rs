use clap::ValueEnum;
use std::fmt;

use crate::error::TaskError;

/// Competitions that can be downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Competition {
    Nfl,
    Ncaab,
    Ncaaf,
    Nba,
}

impl Competition {
    /// Directory name under the output root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Competition::Nfl => "nfl",
            Competition::Ncaab => "ncaab",
            Competition::Ncaaf => "ncaaf",
            Competition::Nba => "nba",
        }
    }
}

impl fmt::Display for Competition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Upstream data providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    #[value(alias = "sr")]
    Sportradar,
    #[value(alias = "genius", alias = "bg")]
    Betgenius,
}

impl Provider {
    /// Provider-side status that marks a game as ready to download.
    pub fn ready_status(&self) -> &'static str {
        match self {
            Provider::Sportradar => "closed",
            Provider::Betgenius => "scheduled",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Sportradar => f.write_str("sportradar"),
            Provider::Betgenius => f.write_str("betgenius"),
        }
    }
}

/// One downloadable game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadItem {
    pub id: String,
    pub year: i32,
    pub competition: Competition,
}

/// A game as listed by a provider schedule, before status filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledItem {
    pub item: DownloadItem,
    /// Provider-defined status string, e.g. "closed" or "scheduled"
    pub status: String,
}

/// Outcome of one download task. Exactly one is produced per dispatched item.
#[derive(Debug)]
pub struct TaskResult {
    pub id: String,
    pub year: i32,
    pub error: Option<TaskError>,
}

impl TaskResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Final tally of a batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub processed: usize,
    pub failures: Vec<TaskResult>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.processed - self.failures.len()
    }
}
