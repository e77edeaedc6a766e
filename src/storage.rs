//! On-disk layout for downloaded games: `<root>/<competition>/<year>/<id>.json`.

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{DownloadError, PersistError};
use crate::models::Competition;

/// Writes one raw payload to its deterministic location.
#[async_trait]
pub trait Persister: Send + Sync {
    async fn save(
        &self,
        competition: Competition,
        year: i32,
        id: &str,
        raw: &[u8],
    ) -> Result<(), PersistError>;
}

/// Stores payloads as two-space indented JSON files.
#[derive(Debug, Clone)]
pub struct JsonFilePersister {
    root: PathBuf,
}

impl JsonFilePersister {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        JsonFilePersister { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn year_dir(&self, competition: Competition, year: i32) -> PathBuf {
        self.root.join(competition.dir_name()).join(year.to_string())
    }

    pub fn game_path(&self, competition: Competition, year: i32, id: &str) -> PathBuf {
        self.year_dir(competition, year).join(format!("{}.json", id))
    }

    /// Create the year directory ahead of dispatch so tasks never race on it.
    pub async fn create_year_dir(&self, competition: Competition, year: i32) -> Result<PathBuf, DownloadError> {
        let dir = self.year_dir(competition, year);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| DownloadError::CreateDir {
                path: dir.display().to_string(),
                source,
            })?;
        Ok(dir)
    }
}

/// Re-indent a JSON document with two spaces, keeping key order.
pub fn indent_json(raw: &[u8]) -> Result<Vec<u8>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_slice(raw)?;
    let mut out = Vec::with_capacity(raw.len() + raw.len() / 4);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"  ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}

#[async_trait]
impl Persister for JsonFilePersister {
    async fn save(
        &self,
        competition: Competition,
        year: i32,
        id: &str,
        raw: &[u8],
    ) -> Result<(), PersistError> {
        let pretty = indent_json(raw)?;
        let path = self.game_path(competition, year, id);
        let io_err = |source| PersistError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(&path, pretty).await.map_err(io_err)?;

        debug!("Saved {} bytes to {}", raw.len(), path.display());
        Ok(())
    }
}
