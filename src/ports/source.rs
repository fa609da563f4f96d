//! Source Port - Market-Data Provider Interface
//!
//! One implementation per provider. Adapters are created once at
//! startup, own their URL and credential, and keep no state between
//! calls beyond their HTTP client.

use async_trait::async_trait;

use crate::domain::extract::{extract_market_caps, PayloadLayout};
use crate::domain::{IngestError, MarketCapMap, ProviderPayload};

/// Trait for market-cap data providers.
#[async_trait]
pub trait SourceAdapter: Send + Sync + 'static {
  /// Identifier the store keys this source's history by.
  fn source_id(&self) -> &str;

  /// Where entries and the three required fields live in a payload.
  fn layout(&self) -> &PayloadLayout;

  /// Fetch up to `limit` entries ranked by descending market cap
  /// (or the configured token set, for named-token sources).
  ///
  /// Any non-success response is `ProviderUnavailable`; partial or
  /// unreadable bodies are never returned as success.
  async fn fetch(&self, limit: usize) -> Result<ProviderPayload, IngestError>;

  /// Strict structural check of every entry against the provider's
  /// record shape.
  fn validate_schema(&self, payload: &ProviderPayload) -> Result<(), IngestError>;

  /// Map each entry to a record keyed by its market cap.
  fn extract(&self, payload: &ProviderPayload) -> Result<MarketCapMap, IngestError> {
    extract_market_caps(payload, self.layout())
  }
}
