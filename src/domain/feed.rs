//! Feed descriptors and status snapshots.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Static registry row a feed instance is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDescriptor {
    /// Unique feed name (registry key).
    pub name: String,
    /// Numeric feed identifier.
    pub id: u32,
    /// Source adapter the feed polls.
    pub source_id: String,
    /// Fixed wait between the end of one cycle and the start of the next.
    pub heartbeat: Duration,
    /// Entries requested per fetch.
    pub limit: usize,
}

/// Read-only view of a feed's lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedStatus {
    pub name: String,
    pub id: u32,
    pub source_id: String,
    pub heartbeat_seconds: u64,
    pub active: bool,
    pub cycle_count: u64,
    pub start_time: Option<DateTime<Utc>>,
}
