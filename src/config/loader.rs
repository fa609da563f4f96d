//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig> {
  let path = path.as_ref();

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig = toml::from_str(content).context("Failed to parse config.toml")?;
  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Unique feed names and ids
/// - Feeds referencing declared sources
/// - Positive heartbeats, limits and timeouts
fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.service.name.trim().is_empty(),
    "service.name must not be empty"
  );

  for (id, source) in &config.sources {
    anyhow::ensure!(!id.trim().is_empty(), "Source ids must not be empty");
    anyhow::ensure!(
      source.requests_per_minute > 0,
      "Source {} has requests_per_minute = 0",
      id
    );
    if let Some(url) = &source.base_url {
      anyhow::ensure!(
        url.starts_with("http://") || url.starts_with("https://"),
        "Source {} base_url must be an http(s) URL, got {}",
        id,
        url
      );
    }
  }

  let mut names = HashSet::new();
  let mut ids = HashSet::new();
  for (i, feed) in config.feeds.iter().enumerate() {
    anyhow::ensure!(!feed.name.trim().is_empty(), "Feed {} has an empty name", i);
    anyhow::ensure!(
      names.insert(feed.name.as_str()),
      "Duplicate feed name: {}",
      feed.name
    );
    anyhow::ensure!(ids.insert(feed.id), "Duplicate feed id {} ({})", feed.id, feed.name);
    anyhow::ensure!(
      config.sources.contains_key(&feed.source),
      "Feed {} references unknown source {}",
      feed.name,
      feed.source
    );
    anyhow::ensure!(
      feed.heartbeat_seconds > 0,
      "Feed {} heartbeat_seconds must be positive",
      feed.name
    );
    anyhow::ensure!(feed.limit > 0, "Feed {} limit must be positive", feed.name);
  }

  anyhow::ensure!(
    config.providers.timeout_seconds > 0,
    "providers.timeout_seconds must be positive"
  );
  anyhow::ensure!(
    config.semantic.timeout_seconds > 0,
    "semantic.timeout_seconds must be positive"
  );
  anyhow::ensure!(
    config.semantic.excerpt_chars > 0,
    "semantic.excerpt_chars must be positive"
  );
  config
    .http
    .bind_address
    .parse::<std::net::SocketAddr>()
    .with_context(|| format!("Invalid http.bind_address: {}", config.http.bind_address))?;

  Ok(())
}
