//! JSONL Store - Concrete Adapter for the MarketCapStore Port
//!
//! Wraps `SchemaManifest` (atomic `schema.json`) and `HistoryLog`
//! (append-only per-source JSONL) into a single struct implementing
//! `MarketCapStore`. Keeps the latest entry per source and per feed in
//! memory so the HTTP surface does not rescan history files on every
//! request.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use super::history::HistoryLog;
use super::manifest::SchemaManifest;
use crate::domain::{IngestError, LogEntry};
use crate::ports::repository::MarketCapStore;

/// Store label used in errors not tied to a single source.
const STORE_LABEL: &str = "store";

/// Cache key of a feed's latest entry: (source, feed).
type FeedKey = (String, String);

/// File-backed market-cap store.
pub struct JsonlStore {
    /// Root data directory.
    data_dir: PathBuf,
    /// Format marker.
    manifest: SchemaManifest,
    /// Per-source history files.
    history: HistoryLog,
    /// Latest entry per source, filled on write or first read.
    latest: RwLock<HashMap<String, LogEntry>>,
    /// Latest entry per (source, feed), filled on write or first read.
    feed_latest: RwLock<HashMap<FeedKey, LogEntry>>,
}

impl JsonlStore {
    /// Create a store over `data_dir`. Nothing touches disk until
    /// `ensure_schema` or the first append.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            manifest: SchemaManifest::new(&data_dir),
            history: HistoryLog::new(&data_dir),
            latest: RwLock::new(HashMap::new()),
            feed_latest: RwLock::new(HashMap::new()),
            data_dir,
        }
    }

    /// Create a store and ensure its on-disk schema in one step.
    pub async fn open(data_dir: impl Into<PathBuf>) -> Result<Self, IngestError> {
        let store = Self::new(data_dir);
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn load(&self, source_id: &str) -> Result<Vec<LogEntry>, IngestError> {
        self.history
            .load(source_id)
            .await
            .map_err(|e| IngestError::persist(source_id, format!("{e:#}")))
    }
}

/// Keep the last `limit` entries.
fn tail(mut entries: Vec<LogEntry>, limit: usize) -> Vec<LogEntry> {
    let skip = entries.len().saturating_sub(limit);
    entries.split_off(skip)
}

#[async_trait]
impl MarketCapStore for JsonlStore {
    async fn ensure_schema(&self) -> Result<(), IngestError> {
        tokio::fs::create_dir_all(&self.data_dir)
            .await
            .map_err(|e| IngestError::persist(STORE_LABEL, e))?;
        self.manifest
            .ensure()
            .await
            .map_err(|e| IngestError::persist(STORE_LABEL, format!("{e:#}")))?;
        self.history
            .create_dir()
            .await
            .map_err(|e| IngestError::persist(STORE_LABEL, format!("{e:#}")))?;
        let repaired = self
            .history
            .repair()
            .await
            .map_err(|e| IngestError::persist(STORE_LABEL, format!("{e:#}")))?;

        info!(
            data_dir = %self.data_dir.display(),
            repaired,
            "Store schema ready"
        );
        Ok(())
    }

    async fn append(&self, entry: &LogEntry) -> Result<(), IngestError> {
        self.history
            .append(entry)
            .await
            .map_err(|e| IngestError::persist(&entry.source_id, format!("{e:#}")))?;

        self.latest
            .write()
            .await
            .insert(entry.source_id.clone(), entry.clone());
        self.feed_latest
            .write()
            .await
            .insert((entry.source_id.clone(), entry.feed.clone()), entry.clone());
        Ok(())
    }

    async fn read_latest(&self, source_id: &str) -> Result<Option<LogEntry>, IngestError> {
        if let Some(entry) = self.latest.read().await.get(source_id) {
            return Ok(Some(entry.clone()));
        }

        let Some(last) = self.load(source_id).await?.pop() else {
            return Ok(None);
        };
        let mut latest = self.latest.write().await;
        // A concurrent append may have landed while the file was read.
        Ok(Some(
            latest
                .entry(source_id.to_string())
                .or_insert(last)
                .clone(),
        ))
    }

    async fn read_history(
        &self,
        source_id: &str,
        limit: usize,
    ) -> Result<Vec<LogEntry>, IngestError> {
        Ok(tail(self.load(source_id).await?, limit))
    }

    async fn read_feed_latest(
        &self,
        source_id: &str,
        feed: &str,
    ) -> Result<Option<LogEntry>, IngestError> {
        let key = (source_id.to_string(), feed.to_string());
        if let Some(entry) = self.feed_latest.read().await.get(&key) {
            return Ok(Some(entry.clone()));
        }

        let Some(last) = self
            .load(source_id)
            .await?
            .into_iter()
            .rev()
            .find(|e| e.feed == feed)
        else {
            return Ok(None);
        };
        let mut feed_latest = self.feed_latest.write().await;
        Ok(Some(feed_latest.entry(key).or_insert(last).clone()))
    }

    async fn read_feed_history(
        &self,
        source_id: &str,
        feed: &str,
        limit: usize,
    ) -> Result<Vec<LogEntry>, IngestError> {
        let mut entries = self.load(source_id).await?;
        entries.retain(|e| e.feed == feed);
        Ok(tail(entries, limit))
    }

    async fn is_healthy(&self) -> bool {
        self.history.is_healthy().await
    }
}
