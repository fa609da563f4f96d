//! Provider HTTP Client - Rate-limited JSON GET
//!
//! Wraps reqwest with a per-provider request quota and maps every
//! transport failure, non-200 status or unreadable body to
//! `ProviderUnavailable`. The request timeout is set on the underlying
//! client so an unresponsive provider cannot stall a feed.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::IngestError;

/// Build the shared reqwest client all provider adapters clone.
pub fn build_http_client(timeout: Duration) -> anyhow::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .user_agent(concat!("market-cap-feeds/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(2)
        .build()
        .context("Failed to build HTTP client")
}

/// Rate-limited JSON client for one provider.
#[derive(Clone)]
pub struct ProviderClient {
    /// Underlying HTTP client.
    http: Client,
    /// Request quota for this provider.
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl ProviderClient {
    /// Create a client allowing `requests_per_minute` requests.
    pub fn new(http: Client, requests_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            http,
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
        }
    }

    /// GET `url` with query parameters and headers, expecting a 200 JSON body.
    pub async fn get_json(
        &self,
        source_id: &str,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, &str)],
    ) -> Result<Value, IngestError> {
        self.limiter.until_ready().await;

        let mut request = self.http.get(url).query(query);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await.map_err(|e| {
            warn!(source = source_id, error = %e, "Provider request failed");
            IngestError::unavailable(source_id, e)
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(IngestError::unavailable(
                source_id,
                format!("status {status}: {snippet}"),
            ));
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| IngestError::unavailable(source_id, format!("unreadable body: {e}")))?;

        debug!(source = source_id, url, "Provider response received");
        Ok(body)
    }
}
