//! CoinMarketCap Source - `/v1/cryptocurrency/listings/latest`
//!
//! Requires an API key read from the environment at fetch time. Without
//! one every fetch fails with `MissingCredential`, which stops the feed.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use super::client::ProviderClient;
use crate::domain::extract::{check_entries, PayloadLayout};
use crate::domain::{IngestError, ProviderPayload};
use crate::ports::source::SourceAdapter;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://pro-api.coinmarketcap.com";

/// Environment variable holding the key unless config names another.
pub const DEFAULT_API_KEY_ENV: &str = "COINMARKETCAP_API_KEY";

const LISTINGS_PATH: &str = "/v1/cryptocurrency/listings/latest";
const API_KEY_HEADER: &str = "X-CMC_PRO_API_KEY";

static LAYOUT: PayloadLayout = PayloadLayout {
    entries: "/data",
    name: &["name"],
    market_cap: &["quote", "USD", "market_cap"],
    last_updated: &["last_updated"],
};

#[allow(dead_code)]
#[derive(Debug, Deserialize)]
struct UsdQuote {
    price: f64,
    market_cap: f64,
    last_updated: String,
    volume_24h: Option<f64>,
    percent_change_24h: Option<f64>,
}

#[allow(dead_code)]
#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(rename = "USD")]
    usd: UsdQuote,
}

/// One listing as the schema stage requires it.
#[allow(dead_code)]
#[derive(Debug, Deserialize)]
struct ListingEntry {
    id: u64,
    name: String,
    symbol: String,
    slug: String,
    num_market_pairs: u64,
    date_added: String,
    tags: Vec<String>,
    max_supply: Option<f64>,
    circulating_supply: f64,
    total_supply: f64,
    platform: Option<Value>,
    cmc_rank: u32,
    last_updated: String,
    quote: Quote,
}

/// CoinMarketCap market-cap source.
pub struct CoinMarketCapSource {
    source_id: String,
    base_url: String,
    client: ProviderClient,
    /// Name of the environment variable holding the API key.
    api_key_env: String,
}

impl CoinMarketCapSource {
    pub fn new(
        source_id: impl Into<String>,
        base_url: impl Into<String>,
        client: ProviderClient,
        api_key_env: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            api_key_env: api_key_env.into(),
        }
    }

    fn api_key(&self) -> Result<String, IngestError> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| IngestError::MissingCredential {
                source_id: self.source_id.clone(),
                env_var: self.api_key_env.clone(),
            })
    }
}

#[async_trait]
impl SourceAdapter for CoinMarketCapSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn layout(&self) -> &PayloadLayout {
        &LAYOUT
    }

    #[instrument(skip(self), fields(source = %self.source_id))]
    async fn fetch(&self, limit: usize) -> Result<ProviderPayload, IngestError> {
        let key = self.api_key()?;
        let url = format!("{}{LISTINGS_PATH}", self.base_url);
        let body = self
            .client
            .get_json(
                &self.source_id,
                &url,
                &[("limit", limit.to_string())],
                &[(API_KEY_HEADER, key.as_str()), ("Accept", "application/json")],
            )
            .await?;

        if !body.get("data").is_some_and(Value::is_array) {
            return Err(IngestError::unavailable(
                &self.source_id,
                "response has no `data` array",
            ));
        }
        Ok(ProviderPayload::new(self.source_id.clone(), body))
    }

    fn validate_schema(&self, payload: &ProviderPayload) -> Result<(), IngestError> {
        check_entries::<ListingEntry>(payload, &LAYOUT)
    }
}
