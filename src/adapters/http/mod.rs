//! HTTP Surface
//!
//! Read-only view over the feed registry and store for external
//! consumers, plus Prometheus scraping and container probes.

pub mod server;

pub use server::{router, AppState, HttpServer};
