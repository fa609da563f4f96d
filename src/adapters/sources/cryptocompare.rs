//! CryptoCompare Source - `/data/top/mktcapfull` with Slack
//!
//! The top-list endpoint sometimes returns coins without a `RAW` price
//! block. The adapter over-fetches by `buffer` entries, drops incomplete
//! ones, and fails only when more than `buffer` are incomplete.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use super::client::ProviderClient;
use crate::domain::extract::{check_entries, lookup, PayloadLayout};
use crate::domain::{IngestError, ProviderPayload};
use crate::ports::source::SourceAdapter;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://min-api.cryptocompare.com";

/// Extra entries requested to absorb incomplete ones.
pub const DEFAULT_BUFFER: usize = 2;

const TOP_LIST_PATH: &str = "/data/top/mktcapfull";
const QUOTE_SYMBOL: &str = "USD";

static LAYOUT: PayloadLayout = PayloadLayout {
    entries: "",
    name: &["CoinInfo", "Name"],
    market_cap: &["RAW", "USD", "MKTCAP"],
    last_updated: &["RAW", "USD", "LASTUPDATE"],
};

#[allow(dead_code)]
#[derive(Debug, Deserialize)]
struct CoinInfo {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "FullName")]
    full_name: String,
}

#[allow(dead_code)]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct RawUsd {
    price: f64,
    mktcap: f64,
    lastupdate: i64,
    supply: Option<f64>,
}

#[allow(dead_code)]
#[derive(Debug, Deserialize)]
struct RawQuotes {
    #[serde(rename = "USD")]
    usd: RawUsd,
}

/// One top-list entry as the schema stage requires it.
#[allow(dead_code)]
#[derive(Debug, Deserialize)]
struct TopListEntry {
    #[serde(rename = "CoinInfo")]
    coin_info: CoinInfo,
    #[serde(rename = "RAW")]
    raw: RawQuotes,
    #[serde(rename = "DISPLAY")]
    display: Option<Value>,
}

/// Drop entries lacking a `RAW.USD` block and cut the rest to `limit`.
///
/// Fails with `InsufficientData` when more than `buffer` entries were
/// incomplete.
pub fn apply_slack(
    source_id: &str,
    entries: Vec<Value>,
    limit: usize,
    buffer: usize,
) -> Result<Vec<Value>, IngestError> {
    let total = entries.len();
    let mut usable: Vec<Value> = entries
        .into_iter()
        .filter(|entry| lookup(entry, &["RAW", QUOTE_SYMBOL]).is_some())
        .collect();
    let missing = total - usable.len();

    if missing > buffer {
        return Err(IngestError::InsufficientData {
            source_id: source_id.to_string(),
            missing,
            tolerated: buffer,
        });
    }
    if missing > 0 {
        debug!(source = source_id, missing, buffer, "Dropped incomplete entries");
    }

    usable.truncate(limit);
    Ok(usable)
}

/// CryptoCompare market-cap source.
pub struct CryptoCompareSource {
    source_id: String,
    base_url: String,
    client: ProviderClient,
    /// Over-fetch margin for incomplete entries.
    buffer: usize,
}

impl CryptoCompareSource {
    pub fn new(source_id: impl Into<String>, base_url: impl Into<String>, client: ProviderClient) -> Self {
        Self {
            source_id: source_id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            buffer: DEFAULT_BUFFER,
        }
    }

    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }
}

#[async_trait]
impl SourceAdapter for CryptoCompareSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn layout(&self) -> &PayloadLayout {
        &LAYOUT
    }

    #[instrument(skip(self), fields(source = %self.source_id, buffer = self.buffer))]
    async fn fetch(&self, limit: usize) -> Result<ProviderPayload, IngestError> {
        let url = format!("{}{TOP_LIST_PATH}", self.base_url);
        let query = [
            ("limit", (limit + self.buffer).to_string()),
            ("tsym", QUOTE_SYMBOL.to_string()),
        ];
        let mut body = self.client.get_json(&self.source_id, &url, &query, &[]).await?;

        let entries = match body.get_mut("Data").map(Value::take) {
            Some(Value::Array(entries)) => entries,
            _ => {
                let message = body
                    .get("Message")
                    .and_then(Value::as_str)
                    .unwrap_or("response has no `Data` array");
                return Err(IngestError::unavailable(&self.source_id, message));
            }
        };

        let usable = apply_slack(&self.source_id, entries, limit, self.buffer)?;
        Ok(ProviderPayload::new(self.source_id.clone(), Value::Array(usable)))
    }

    fn validate_schema(&self, payload: &ProviderPayload) -> Result<(), IngestError> {
        check_entries::<TopListEntry>(payload, &LAYOUT)
    }
}
