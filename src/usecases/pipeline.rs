//! Ingest Pipeline - One Poll Cycle
//!
//! fetch -> validate -> extract -> persist, strictly in that order. Any
//! stage failing ends the cycle before the store is touched, so a
//! rejected payload never leaves a record behind.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument};

use super::validator::{failed_stage, PayloadValidator};
use crate::adapters::metrics::IngestMetrics;
use crate::domain::{FeedDescriptor, IngestError, LogEntry};
use crate::ports::repository::MarketCapStore;
use crate::ports::source::SourceAdapter;

/// Runs single poll cycles against a shared store.
pub struct IngestPipeline {
  validator: PayloadValidator,
  store: Arc<dyn MarketCapStore>,
  metrics: Arc<IngestMetrics>,
}

impl IngestPipeline {
  pub fn new(
    validator: PayloadValidator,
    store: Arc<dyn MarketCapStore>,
    metrics: Arc<IngestMetrics>,
  ) -> Self {
    Self {
      validator,
      store,
      metrics,
    }
  }

  pub fn store(&self) -> &Arc<dyn MarketCapStore> {
    &self.store
  }

  /// Execute one cycle and return the entry that was persisted.
  #[instrument(skip_all, fields(feed = %feed.name, source = %adapter.source_id(), cycle = cycle))]
  pub async fn run_cycle(
    &self,
    adapter: &dyn SourceAdapter,
    feed: &FeedDescriptor,
    cycle: u64,
  ) -> Result<LogEntry, IngestError> {
    let source_id = adapter.source_id();
    let payload = adapter.fetch(feed.limit).await?;

    match self.validator.validate(adapter, &payload).await {
      Ok(stage) => self
        .metrics
        .validations_total
        .with_label_values(&[source_id, stage.as_str(), "accepted"])
        .inc(),
      Err(e) => {
        if let Some(stage) = failed_stage(&e) {
          self
            .metrics
            .validations_total
            .with_label_values(&[source_id, stage.as_str(), "rejected"])
            .inc();
        }
        return Err(e);
      }
    }

    let records = adapter.extract(&payload)?;
    let entries = adapter
      .layout()
      .entries(&payload)
      .map_or(0, |entries| entries.len());
    let collisions = entries.saturating_sub(records.len());
    if collisions > 0 {
      debug!(collisions, entries, kept = records.len(), "Colliding market caps collapsed");
    }

    let entry = LogEntry::new(source_id, &feed.name, cycle, records, Utc::now());
    self.store.append(&entry).await?;
    Ok(entry)
  }
}
