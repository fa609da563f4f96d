//! Configuration Module - TOML-based Service Configuration
//!
//! Loads and validates configuration from `config.toml`. Provider
//! endpoints, the feed table and the semantic judge are all declared
//! here; credentials are referenced by environment variable name only.

pub mod loader;

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::FeedDescriptor;

/// Top-level service configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before any feed is built.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Service identity and logging.
  pub service: ServiceConfig,
  /// HTTP surface.
  #[serde(default)]
  pub http: HttpConfig,
  /// Store location.
  #[serde(default)]
  pub persistence: PersistenceConfig,
  /// Semantic validation stage.
  #[serde(default)]
  pub semantic: SemanticConfig,
  /// Settings shared by all provider requests.
  #[serde(default)]
  pub providers: ProvidersConfig,
  /// Source adapters keyed by source id.
  pub sources: BTreeMap<String, SourceConfig>,
  /// Static feed table.
  pub feeds: Vec<FeedConfig>,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Human-readable service name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// HTTP surface configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
  /// Serve `/datafeed`, `/feeds`, `/metrics` and probes.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Server bind address.
  #[serde(default = "default_bind_addr")]
  pub bind_address: String,
}

impl Default for HttpConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: default_bind_addr(),
    }
  }
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
  /// Directory holding `schema.json` and `history/`.
  #[serde(default = "default_data_dir")]
  pub data_dir: String,
}

impl Default for PersistenceConfig {
  fn default() -> Self {
    Self {
      data_dir: default_data_dir(),
    }
  }
}

/// Semantic judge configuration (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Deserialize)]
pub struct SemanticConfig {
  /// Ask the judge at all. When false every payload goes to schema checks.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Chat-completions endpoint.
  #[serde(default = "default_semantic_endpoint")]
  pub endpoint: String,
  /// Model name.
  #[serde(default = "default_semantic_model")]
  pub model: String,
  /// Environment variable holding the API key.
  #[serde(default = "default_semantic_key_env")]
  pub api_key_env: String,
  /// Judge request timeout in seconds.
  #[serde(default = "default_semantic_timeout")]
  pub timeout_seconds: u64,
  /// Maximum prompt length in characters.
  #[serde(default = "default_excerpt_chars")]
  pub excerpt_chars: usize,
}

impl Default for SemanticConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      endpoint: default_semantic_endpoint(),
      model: default_semantic_model(),
      api_key_env: default_semantic_key_env(),
      timeout_seconds: default_semantic_timeout(),
      excerpt_chars: default_excerpt_chars(),
    }
  }
}

impl SemanticConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_seconds)
  }
}

/// Provider request settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
  /// Request timeout in seconds.
  #[serde(default = "default_timeout")]
  pub timeout_seconds: u64,
}

impl Default for ProvidersConfig {
  fn default() -> Self {
    Self {
      timeout_seconds: default_timeout(),
    }
  }
}

impl ProvidersConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_seconds)
  }
}

/// Which adapter implementation backs a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
  Coingecko,
  Coinmarketcap,
  Cryptocompare,
}

/// One source adapter declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
  /// Adapter implementation.
  pub kind: SourceKind,
  /// API root override (tests, proxies).
  pub base_url: Option<String>,
  /// Environment variable holding the API key (CoinMarketCap only).
  pub api_key_env: Option<String>,
  /// Over-fetch margin (CryptoCompare only).
  pub buffer: Option<usize>,
  /// Fixed token ids (CoinGecko named-token variant).
  #[serde(default)]
  pub ids: Vec<String>,
  /// Request quota for this provider.
  #[serde(default = "default_requests_per_minute")]
  pub requests_per_minute: u32,
}

/// One row of the feed table.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
  /// Unique feed name.
  pub name: String,
  /// Numeric feed id.
  pub id: u32,
  /// Source id (key of `[sources]`).
  pub source: String,
  /// Wait between cycles in seconds.
  pub heartbeat_seconds: u64,
  /// Entries requested per fetch.
  #[serde(default = "default_limit")]
  pub limit: usize,
  /// Start the feed when the service starts.
  #[serde(default)]
  pub autostart: bool,
}

impl FeedConfig {
  pub fn descriptor(&self) -> FeedDescriptor {
    FeedDescriptor {
      name: self.name.clone(),
      id: self.id,
      source_id: self.source.clone(),
      heartbeat: Duration::from_secs(self.heartbeat_seconds),
      limit: self.limit,
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_bind_addr() -> String {
  "0.0.0.0:8080".to_string()
}

fn default_data_dir() -> String {
  "data".to_string()
}

fn default_semantic_endpoint() -> String {
  "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_semantic_model() -> String {
  "gpt-4o-mini".to_string()
}

fn default_semantic_key_env() -> String {
  "OPENAI_API_KEY".to_string()
}

fn default_semantic_timeout() -> u64 {
  15
}

fn default_excerpt_chars() -> usize {
  500
}

fn default_timeout() -> u64 {
  30
}

fn default_requests_per_minute() -> u32 {
  30
}

fn default_limit() -> usize {
  10
}
