//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP clients, file I/O). Each sub-module groups
//! adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `sources`: CoinGecko, CoinMarketCap and CryptoCompare REST clients
//! - `semantic`: OpenAI-compatible yes/no payload judge
//! - `persistence`: JSONL history log and store manifest
//! - `metrics`: Prometheus ingest metrics
//! - `http`: datafeed, status, metrics and probe endpoints

pub mod http;
pub mod metrics;
pub mod persistence;
pub mod semantic;
pub mod sources;
