//! CoinGecko Source - `/coins/markets` Ranked or Named Tokens
//!
//! Without token ids the adapter asks for the top `limit` coins by
//! market cap. With ids configured it asks for exactly those coins and
//! fails when the provider leaves any of them out.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use super::client::ProviderClient;
use crate::domain::extract::{check_entries, PayloadLayout};
use crate::domain::{IngestError, ProviderPayload};
use crate::ports::source::SourceAdapter;

/// Default public API root.
pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com";

const MARKETS_PATH: &str = "/api/v3/coins/markets";
const VS_CURRENCY: &str = "usd";
const ORDER: &str = "market_cap_desc";

static LAYOUT: PayloadLayout = PayloadLayout {
    entries: "",
    name: &["name"],
    market_cap: &["market_cap"],
    last_updated: &["last_updated"],
};

/// One `/coins/markets` entry as the schema stage requires it.
#[allow(dead_code)]
#[derive(Debug, Deserialize)]
struct CoinGeckoEntry {
    id: String,
    symbol: String,
    name: String,
    image: String,
    current_price: f64,
    market_cap: f64,
    market_cap_rank: u32,
    last_updated: DateTime<Utc>,
    fully_diluted_valuation: Option<f64>,
    total_volume: Option<f64>,
    circulating_supply: Option<f64>,
    max_supply: Option<f64>,
    roi: Option<Value>,
}

/// CoinGecko market-cap source.
pub struct CoinGeckoSource {
    /// Registry key and log key.
    source_id: String,
    /// API root, e.g. `https://api.coingecko.com`.
    base_url: String,
    /// Rate-limited HTTP client.
    client: ProviderClient,
    /// Named-token variant: fetch exactly these ids.
    ids: Option<Vec<String>>,
}

impl CoinGeckoSource {
    /// Create a ranked (top-N) source.
    pub fn new(source_id: impl Into<String>, base_url: impl Into<String>, client: ProviderClient) -> Self {
        Self {
            source_id: source_id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            ids: None,
        }
    }

    /// Restrict the source to a fixed set of token ids.
    pub fn with_ids(mut self, ids: Vec<String>) -> Self {
        self.ids = Some(ids).filter(|ids| !ids.is_empty());
        self
    }

    fn query(&self, limit: usize) -> Vec<(&'static str, String)> {
        let mut query = vec![("vs_currency", VS_CURRENCY.to_string())];
        match &self.ids {
            Some(ids) => {
                query.push(("ids", ids.join(",")));
                query.push(("per_page", ids.len().to_string()));
            }
            None => {
                query.push(("order", ORDER.to_string()));
                query.push(("per_page", limit.to_string()));
            }
        }
        query.push(("page", "1".to_string()));
        query.push(("sparkline", "false".to_string()));
        query
    }

    /// Named-token variant: every requested id must be present.
    fn ensure_requested_ids(&self, body: &Value) -> Result<(), IngestError> {
        let Some(ids) = &self.ids else {
            return Ok(());
        };
        let returned: HashSet<&str> = body
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.get("id").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default();
        let missing = ids.iter().filter(|id| !returned.contains(id.as_str())).count();
        if missing > 0 {
            return Err(IngestError::InsufficientData {
                source_id: self.source_id.clone(),
                missing,
                tolerated: 0,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SourceAdapter for CoinGeckoSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn layout(&self) -> &PayloadLayout {
        &LAYOUT
    }

    #[instrument(skip(self), fields(source = %self.source_id))]
    async fn fetch(&self, limit: usize) -> Result<ProviderPayload, IngestError> {
        let url = format!("{}{MARKETS_PATH}", self.base_url);
        let body = self
            .client
            .get_json(&self.source_id, &url, &self.query(limit), &[])
            .await?;

        if !body.is_array() {
            return Err(IngestError::unavailable(
                &self.source_id,
                "expected a JSON array of coins",
            ));
        }
        self.ensure_requested_ids(&body)?;

        Ok(ProviderPayload::new(self.source_id.clone(), body))
    }

    fn validate_schema(&self, payload: &ProviderPayload) -> Result<(), IngestError> {
        check_entries::<CoinGeckoEntry>(payload, &LAYOUT)
    }
}
