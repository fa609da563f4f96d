//! Source Adapters - Market-Data Provider Implementations
//!
//! One adapter per provider behind the `SourceAdapter` port, built once
//! at startup from the `[sources]` config table:
//! - `coingecko`: ranked or named-token `/coins/markets`
//! - `coinmarketcap`: `/listings/latest` with API key header
//! - `cryptocompare`: `/top/mktcapfull` with over-fetch slack

pub mod client;
pub mod coingecko;
pub mod coinmarketcap;
pub mod cryptocompare;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::config::{AppConfig, SourceConfig, SourceKind};
use crate::ports::source::SourceAdapter;

pub use client::{build_http_client, ProviderClient};
pub use coingecko::CoinGeckoSource;
pub use coinmarketcap::CoinMarketCapSource;
pub use cryptocompare::CryptoCompareSource;

/// Adapters keyed by source id.
pub type SourceMap = HashMap<String, Arc<dyn SourceAdapter>>;

/// Build one adapter for a declared source.
pub fn build_source(
    source_id: &str,
    config: &SourceConfig,
    http: reqwest::Client,
) -> Arc<dyn SourceAdapter> {
    let client = ProviderClient::new(http, config.requests_per_minute);
    let base_url = |default: &str| config.base_url.clone().unwrap_or_else(|| default.to_string());

    match config.kind {
        SourceKind::Coingecko => Arc::new(
            CoinGeckoSource::new(source_id, base_url(coingecko::DEFAULT_BASE_URL), client)
                .with_ids(config.ids.clone()),
        ),
        SourceKind::Coinmarketcap => Arc::new(CoinMarketCapSource::new(
            source_id,
            base_url(coinmarketcap::DEFAULT_BASE_URL),
            client,
            config
                .api_key_env
                .clone()
                .unwrap_or_else(|| coinmarketcap::DEFAULT_API_KEY_ENV.to_string()),
        )),
        SourceKind::Cryptocompare => Arc::new(
            CryptoCompareSource::new(source_id, base_url(cryptocompare::DEFAULT_BASE_URL), client)
                .with_buffer(config.buffer.unwrap_or(cryptocompare::DEFAULT_BUFFER)),
        ),
    }
}

/// Build every adapter declared in config, sharing one HTTP client.
pub fn build_sources(config: &AppConfig) -> Result<SourceMap> {
    let http = build_http_client(config.providers.timeout())?;
    let sources: SourceMap = config
        .sources
        .iter()
        .map(|(id, source)| (id.clone(), build_source(id, source, http.clone())))
        .collect();

    info!(sources = sources.len(), "Source adapters built");
    Ok(sources)
}
