//! Domain layer - Ingest records, extraction, and validation rules.
//!
//! Pure types and functions with no I/O (hexagonal architecture inner
//! ring). Adapters and use cases build on these.

pub mod error;
pub mod extract;
pub mod feed;
pub mod record;
pub mod verdict;

// Re-export core types for convenience
pub use error::IngestError;
pub use extract::{check_entries, extract_market_caps, PayloadLayout};
pub use feed::{FeedDescriptor, FeedStatus};
pub use record::{LogEntry, MarketCapMap, MarketCapRecord, ProviderPayload, RecordMeta};
pub use verdict::{SemanticVerdict, ValidationStage};
