//! Repository Port - Durable Market-Cap Log Interface
//!
//! Append-only, keyed by source. Each poll cycle is one entry, written
//! as a single atomic unit; there is no update or delete.

use async_trait::async_trait;

use crate::domain::{IngestError, LogEntry};

/// Trait for market-cap persistence providers.
///
/// Shared by every feed, so `append` must be safe under concurrent
/// writers from different feeds.
#[async_trait]
pub trait MarketCapStore: Send + Sync + 'static {
  /// Create the durable store if absent. Idempotent.
  async fn ensure_schema(&self) -> Result<(), IngestError>;

  /// Durably append all records of one poll cycle.
  async fn append(&self, entry: &LogEntry) -> Result<(), IngestError>;

  /// Most recent entry for a source, if any cycle has completed.
  async fn read_latest(&self, source_id: &str) -> Result<Option<LogEntry>, IngestError>;

  /// Last `limit` entries for a source, oldest first.
  async fn read_history(
    &self,
    source_id: &str,
    limit: usize,
  ) -> Result<Vec<LogEntry>, IngestError>;

  /// Most recent entry a given feed wrote to a source.
  ///
  /// Several feeds may poll one source; this never returns another
  /// feed's entry.
  async fn read_feed_latest(
    &self,
    source_id: &str,
    feed: &str,
  ) -> Result<Option<LogEntry>, IngestError>;

  /// Last `limit` entries a given feed wrote to a source, oldest first.
  async fn read_feed_history(
    &self,
    source_id: &str,
    feed: &str,
    limit: usize,
  ) -> Result<Vec<LogEntry>, IngestError>;

  /// Check if the store is writable.
  async fn is_healthy(&self) -> bool;
}
