//! Metrics Adapter
//!
//! Prometheus registry for the ingest pipeline. Served over HTTP by
//! `adapters::http`.

pub mod prometheus;

pub use self::prometheus::IngestMetrics;
