//! Market-Cap Extraction - Payload to Normalized Map
//!
//! Each provider nests the three fields every response must yield
//! (name, market cap, last updated) at different paths. A
//! [`PayloadLayout`] describes where they live; extraction and schema
//! checking are then provider-agnostic.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::error::IngestError;
use super::record::{MarketCapMap, ProviderPayload, RecordMeta};

/// Where a provider keeps its entries and the three required fields.
#[derive(Debug, Clone, Copy)]
pub struct PayloadLayout {
    /// JSON pointer to the entry array (`""` for a root array).
    pub entries: &'static str,
    /// Key path to the asset name inside one entry.
    pub name: &'static [&'static str],
    /// Key path to the market cap inside one entry.
    pub market_cap: &'static [&'static str],
    /// Key path to the last-updated marker inside one entry.
    pub last_updated: &'static [&'static str],
}

impl PayloadLayout {
    /// Borrow the entry array of a payload.
    pub fn entries<'a>(&self, payload: &'a ProviderPayload) -> Option<&'a [Value]> {
        payload
            .body
            .pointer(self.entries)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
    }

    fn entries_label(&self) -> String {
        if self.entries.is_empty() {
            "<root array>".to_string()
        } else {
            self.entries.trim_start_matches('/').replace('/', ".")
        }
    }
}

/// Follow a key path into a JSON value.
pub fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| v.get(key))
}

/// Read a market cap from a JSON integer, float, or numeric string.
pub fn market_cap_from_value(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(Decimal::from(i));
            }
            if let Some(u) = n.as_u64() {
                return Some(Decimal::from(u));
            }
            n.to_string()
        }
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn text_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Build the market-cap map of an already-validated payload.
///
/// Entries are read in provider order. A later entry with the same
/// market cap overwrites the earlier one; every such collision is
/// logged because it silently drops a record.
pub fn extract_market_caps(
    payload: &ProviderPayload,
    layout: &PayloadLayout,
) -> Result<MarketCapMap, IngestError> {
    let source_id = payload.source_id.as_str();
    let missing = |index: Option<usize>, path: &[&str]| IngestError::MissingField {
        source_id: source_id.to_string(),
        index,
        field: path.join("."),
    };

    let entries = layout.entries(payload).ok_or_else(|| IngestError::MissingField {
        source_id: source_id.to_string(),
        index: None,
        field: layout.entries_label(),
    })?;

    let mut map = MarketCapMap::new();
    for (index, entry) in entries.iter().enumerate() {
        let name = lookup(entry, layout.name)
            .and_then(Value::as_str)
            .ok_or_else(|| missing(Some(index), layout.name))?;
        let market_cap = lookup(entry, layout.market_cap)
            .and_then(market_cap_from_value)
            .ok_or_else(|| missing(Some(index), layout.market_cap))?;
        let last_updated = lookup(entry, layout.last_updated)
            .and_then(text_from_value)
            .ok_or_else(|| missing(Some(index), layout.last_updated))?;

        let meta = RecordMeta {
            name: name.to_string(),
            last_updated,
        };
        if let Some(previous) = map.insert(market_cap, meta) {
            debug!(
                source = source_id,
                %market_cap,
                dropped = %previous.name,
                kept = name,
                "Market cap collision, later entry wins"
            );
        }
    }

    Ok(map)
}

/// Check every entry of a payload against a typed record shape.
///
/// `T` lists required fields as plain types and optional ones as
/// `Option<_>`; unknown fields are ignored. The first entry that does
/// not deserialize fails the whole payload.
pub fn check_entries<T: DeserializeOwned>(
    payload: &ProviderPayload,
    layout: &PayloadLayout,
) -> Result<(), IngestError> {
    let source_id = payload.source_id.as_str();
    let entries = layout
        .entries(payload)
        .ok_or_else(|| IngestError::SchemaValidation {
            source_id: source_id.to_string(),
            index: None,
            reason: format!("expected an array at `{}`", layout.entries_label()),
        })?;

    for (index, entry) in entries.iter().enumerate() {
        if let Err(e) = T::deserialize(entry) {
            return Err(IngestError::SchemaValidation {
                source_id: source_id.to_string(),
                index: Some(index),
                reason: format!("{e} in {}", excerpt(entry, 200)),
            });
        }
    }
    Ok(())
}

/// Char-boundary-safe prefix of a value's compact JSON text.
pub fn excerpt(value: &Value, max_chars: usize) -> String {
    let text = value.to_string();
    if text.chars().count() <= max_chars {
        text
    } else {
        let mut out: String = text.chars().take(max_chars).collect();
        out.push('…');
        out
    }
}
