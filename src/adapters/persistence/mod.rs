//! Persistence Adapters - JSONL-based File Storage
//!
//! Implements the `MarketCapStore` port using append-only JSONL files
//! per source and an atomic JSON manifest for the data directory.
//! No database dependency; torn writes are repaired on startup.

pub mod history;
pub mod manifest;
pub mod store;

pub use history::HistoryLog;
pub use manifest::SchemaManifest;
pub use store::JsonlStore;
