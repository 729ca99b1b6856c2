//! Persistent per-asset view counters.
//!
//! The whole table lives in one JSON document on disk. It is loaded once
//! at startup and rewritten in full on every mutation. The table mutex is
//! held across the read-modify-persist sequence so concurrent increments
//! never lose updates. Whole-document rewriting is a known scalability
//! ceiling at higher write volumes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// Counter record for one asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewStats {
    pub views: u64,
}

#[derive(Debug)]
pub enum StatsError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
}

impl fmt::Display for StatsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatsError::Io(e) => write!(f, "I/O error: {}", e),
            StatsError::Serialization(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for StatsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StatsError::Io(e) => Some(e),
            StatsError::Serialization(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for StatsError {
    fn from(err: std::io::Error) -> Self {
        StatsError::Io(err)
    }
}

impl From<serde_json::Error> for StatsError {
    fn from(err: serde_json::Error) -> Self {
        StatsError::Serialization(err)
    }
}

#[derive(Clone)]
pub struct StatsStore {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    table: Mutex<HashMap<String, ViewStats>>,
}

impl StatsStore {
    /// Open the counter document, seeding an empty one when absent.
    ///
    /// A document that exists but fails to parse is logged and replaced
    /// by an empty in-memory table; startup must not be blocked by a
    /// corrupt counter file.
    pub async fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let table = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(table) => table,
                Err(err) => {
                    warn!("Error parsing {}: {}", path.display(), err);
                    HashMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tokio::fs::write(&path, "{}").await?;
                HashMap::new()
            }
            Err(err) => return Err(err),
        };

        Ok(Self {
            inner: Arc::new(Inner {
                path,
                table: Mutex::new(table),
            }),
        })
    }

    /// Insert a zero-count record for a freshly ingested asset.
    pub async fn record_new_asset(&self, audio_id: &str) -> Result<(), StatsError> {
        let mut table = self.inner.table.lock().await;
        table.insert(audio_id.to_string(), ViewStats { views: 0 });
        self.persist(&table).await
    }

    /// Bump the view count when the asset is known. Unknown ids are
    /// ignored rather than treated as errors.
    pub async fn increment_view(&self, audio_id: &str) -> Result<(), StatsError> {
        let mut table = self.inner.table.lock().await;
        match table.get_mut(audio_id) {
            Some(stats) => stats.views += 1,
            None => return Ok(()),
        }
        self.persist(&table).await
    }

    /// Snapshot of every counter, for display.
    pub async fn all(&self) -> HashMap<String, ViewStats> {
        self.inner.table.lock().await.clone()
    }

    async fn persist(&self, table: &HashMap<String, ViewStats>) -> Result<(), StatsError> {
        let document = serde_json::to_string_pretty(table)?;
        tokio::fs::write(&self.inner.path, document).await?;
        Ok(())
    }
}
