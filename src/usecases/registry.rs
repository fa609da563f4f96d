//! Feed Registry - Name -> Feed Mapping
//!
//! Built once from the static feed table. Exposes the lifecycle
//! operations the HTTP surface and entry point use, and reads back what
//! each feed has persisted.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use super::feed::Feed;
use super::pipeline::IngestPipeline;
use crate::adapters::metrics::IngestMetrics;
use crate::adapters::sources::SourceMap;
use crate::domain::{FeedDescriptor, FeedStatus, LogEntry};

/// Registry lookup and build errors.
#[derive(Debug, Error)]
pub enum RegistryError {
  #[error("unknown feed name: {0}")]
  UnknownFeed(String),

  #[error("feed {feed} references unknown source {source_id}")]
  UnknownSource { feed: String, source_id: String },

  #[error("feed name registered twice: {0}")]
  DuplicateFeed(String),
}

/// All feeds of the service, in table order.
pub struct FeedRegistry {
  feeds: Vec<Arc<Feed>>,
  by_name: HashMap<String, usize>,
  pipeline: Arc<IngestPipeline>,
}

impl FeedRegistry {
  /// Build one feed per descriptor.
  ///
  /// # Errors
  /// `UnknownSource` if a descriptor names a source with no adapter,
  /// `DuplicateFeed` if two descriptors share a name.
  pub fn build(
    descriptors: Vec<FeedDescriptor>,
    sources: &SourceMap,
    pipeline: Arc<IngestPipeline>,
    metrics: Arc<IngestMetrics>,
  ) -> Result<Self, RegistryError> {
    let mut feeds = Vec::with_capacity(descriptors.len());
    let mut by_name = HashMap::with_capacity(descriptors.len());

    for descriptor in descriptors {
      let adapter = sources
        .get(&descriptor.source_id)
        .cloned()
        .ok_or_else(|| RegistryError::UnknownSource {
          feed: descriptor.name.clone(),
          source_id: descriptor.source_id.clone(),
        })?;
      if by_name.insert(descriptor.name.clone(), feeds.len()).is_some() {
        return Err(RegistryError::DuplicateFeed(descriptor.name));
      }
      feeds.push(Arc::new(Feed::new(
        descriptor,
        adapter,
        Arc::clone(&pipeline),
        Arc::clone(&metrics),
      )));
    }

    info!(feeds = feeds.len(), "Feed registry built");
    Ok(Self {
      feeds,
      by_name,
      pipeline,
    })
  }

  pub fn feed(&self, name: &str) -> Result<&Arc<Feed>, RegistryError> {
    self
      .by_name
      .get(name)
      .map(|&i| &self.feeds[i])
      .ok_or_else(|| RegistryError::UnknownFeed(name.to_string()))
  }

  /// Start a feed. `Ok(false)` if it was already active.
  pub async fn start(&self, name: &str) -> Result<bool, RegistryError> {
    Ok(self.feed(name)?.start().await)
  }

  /// Stop a feed. `Ok(false)` if it was not active.
  pub async fn stop(&self, name: &str) -> Result<bool, RegistryError> {
    Ok(self.feed(name)?.stop().await)
  }

  /// Latest entry persisted by this feed.
  ///
  /// Entries other feeds wrote to the same source are never returned.
  /// Store read failures are logged and reported as "no data yet".
  pub async fn get_most_recent(&self, name: &str) -> Result<Option<LogEntry>, RegistryError> {
    let feed = self.feed(name)?;
    let source_id = &feed.descriptor().source_id;
    match self.pipeline.store().read_feed_latest(source_id, name).await {
      Ok(entry) => Ok(entry),
      Err(e) => {
        warn!(feed = name, source = %source_id, error = %e, "Latest entry unreadable");
        Ok(None)
      }
    }
  }

  /// Last `limit` entries persisted by this feed, oldest first.
  ///
  /// Store read failures are logged and reported as an empty series.
  pub async fn history(&self, name: &str, limit: usize) -> Result<Vec<LogEntry>, RegistryError> {
    let feed = self.feed(name)?;
    let source_id = &feed.descriptor().source_id;
    match self
      .pipeline
      .store()
      .read_feed_history(source_id, name, limit)
      .await
    {
      Ok(entries) => Ok(entries),
      Err(e) => {
        warn!(feed = name, source = %source_id, error = %e, "History unreadable");
        Ok(Vec::new())
      }
    }
  }

  /// Feed names in table order.
  pub fn list_names(&self) -> Vec<String> {
    self.feeds.iter().map(|f| f.name().to_string()).collect()
  }

  pub fn status(&self, name: &str) -> Result<FeedStatus, RegistryError> {
    Ok(self.feed(name)?.status())
  }

  pub fn statuses(&self) -> Vec<FeedStatus> {
    self.feeds.iter().map(|f| f.status()).collect()
  }

  /// Stop every feed and wait for all loops to exit.
  pub async fn shutdown(&self) {
    // Signal every loop first so in-flight cycles finish in parallel.
    for feed in &self.feeds {
      feed.stop().await;
    }
    for feed in &self.feeds {
      feed.shutdown().await;
    }
    info!(feeds = self.feeds.len(), "All feeds shut down");
  }
}
