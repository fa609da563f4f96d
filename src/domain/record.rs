//! Market-Cap Records - Canonical Ingest Types
//!
//! A poll cycle turns one provider payload into a [`MarketCapMap`]
//! (market cap -> name/last-updated) and persists it as a single
//! [`LogEntry`]. The map is keyed by the exact decimal market cap, so
//! two entries reporting the same value collapse into one record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Provider-shaped raw response, kept untouched until it is validated.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPayload {
    /// Source identifier of the adapter that fetched it.
    pub source_id: String,
    /// Raw JSON body (after provider-specific slack filtering, if any).
    pub body: Value,
    /// When the response was received.
    pub fetched_at: DateTime<Utc>,
}

impl ProviderPayload {
    pub fn new(source_id: impl Into<String>, body: Value) -> Self {
        Self {
            source_id: source_id.into(),
            body,
            fetched_at: Utc::now(),
        }
    }
}

/// Value side of the extraction map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Asset display name as the provider reports it.
    pub name: String,
    /// Provider's own last-updated representation (ISO-8601 or Unix seconds).
    pub last_updated: String,
}

/// Normalized `{name, market_cap, last_updated}` tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketCapRecord {
    pub name: String,
    pub market_cap: Decimal,
    pub last_updated: String,
}

/// Market cap -> record mapping produced by one poll cycle.
///
/// Inserting an already-present market cap replaces the earlier record
/// (last write wins). Keys compare by numeric value, so `100` and
/// `100.0` are the same key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketCapMap(BTreeMap<Decimal, RecordMeta>);

impl MarketCapMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning the one it displaced on a key collision.
    pub fn insert(&mut self, market_cap: Decimal, meta: RecordMeta) -> Option<RecordMeta> {
        self.0.insert(market_cap, meta)
    }

    pub fn get(&self, market_cap: &Decimal) -> Option<&RecordMeta> {
        self.0.get(market_cap)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Decimal, &RecordMeta)> {
        self.0.iter()
    }

    /// Flatten into records, largest market cap first.
    pub fn records(&self) -> Vec<MarketCapRecord> {
        self.0
            .iter()
            .rev()
            .map(|(cap, meta)| MarketCapRecord {
                name: meta.name.clone(),
                market_cap: *cap,
                last_updated: meta.last_updated.clone(),
            })
            .collect()
    }
}

impl FromIterator<(Decimal, RecordMeta)> for MarketCapMap {
    fn from_iter<I: IntoIterator<Item = (Decimal, RecordMeta)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (cap, meta) in iter {
            map.insert(cap, meta);
        }
        map
    }
}

/// One durable line in a source's history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique identifier of this write.
    pub entry_id: Uuid,
    /// Source the records came from (the log key).
    pub source_id: String,
    /// Feed that drove the cycle.
    pub feed: String,
    /// Cycle number within the feed (1-based, strictly increasing).
    pub cycle: u64,
    /// When the cycle completed.
    pub timestamp: DateTime<Utc>,
    /// Extracted records of this cycle.
    pub records: MarketCapMap,
}

impl LogEntry {
    pub fn new(
        source_id: impl Into<String>,
        feed: impl Into<String>,
        cycle: u64,
        records: MarketCapMap,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            source_id: source_id.into(),
            feed: feed.into(),
            cycle,
            timestamp,
            records,
        }
    }
}
