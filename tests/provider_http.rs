//! Provider and HTTP Surface Tests - Local axum Servers
//!
//! Stands up a local axum server in place of each provider so the real
//! adapters are exercised over HTTP, and drives the service's own router
//! over a socket with reqwest.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};

use common::{
    collision_payload, descriptor, registry_with, registry_with_feeds, MemoryStore, ScriptedSource,
};
use market_cap_feeds::adapters::http::{router, AppState};
use market_cap_feeds::adapters::metrics::IngestMetrics;
use market_cap_feeds::adapters::persistence::JsonlStore;
use market_cap_feeds::adapters::sources::{
    CoinGeckoSource, CoinMarketCapSource, CryptoCompareSource, ProviderClient,
};
use market_cap_feeds::domain::{IngestError, LogEntry, MarketCapMap};
use market_cap_feeds::usecases::FeedRegistry;
use market_cap_feeds::ports::{MarketCapStore, SourceAdapter};

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client() -> ProviderClient {
    ProviderClient::new(reqwest::Client::new(), 600)
}

fn top_list_entry(name: &str, cap: f64) -> Value {
    json!({
        "CoinInfo": {"Id": "1", "Name": name, "FullName": name},
        "RAW": {"USD": {"PRICE": 1.0, "MKTCAP": cap, "LASTUPDATE": 1_700_000_000}}
    })
}

#[tokio::test]
async fn test_non_200_is_provider_unavailable() {
    let app = Router::new().route(
        "/api/v3/coins/markets",
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "try later") }),
    );
    let addr = serve(app).await;
    let source = CoinGeckoSource::new("coingecko", format!("http://{addr}"), client());

    let err = assert_err!(source.fetch(10).await);
    match err {
        IngestError::ProviderUnavailable { reason, .. } => assert!(reason.contains("503")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_unreachable_provider_is_provider_unavailable() {
    // Bind then drop to get a port nobody listens on.
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let source = CoinGeckoSource::new("coingecko", format!("http://{addr}"), client());
    assert!(matches!(
        source.fetch(10).await,
        Err(IngestError::ProviderUnavailable { .. })
    ));
}

#[tokio::test]
async fn test_cryptocompare_slack_over_http() {
    let app = Router::new().route(
        "/data/top/mktcapfull",
        get(|| async {
            let mut data: Vec<Value> = (0..6)
                .map(|i| top_list_entry(&format!("C{i}"), 1000.0 - f64::from(i)))
                .collect();
            data.insert(3, json!({"CoinInfo": {"Id": "9", "Name": "X", "FullName": "X"}}));
            Json(json!({"Message": "Success", "Data": data}))
        }),
    );
    let addr = serve(app).await;
    let source = CryptoCompareSource::new("cryptocompare", format!("http://{addr}"), client());

    let payload = assert_ok!(source.fetch(5).await);
    assert_eq!(payload.body.as_array().unwrap().len(), 5);
    assert_ok!(source.validate_schema(&payload));
    let records = assert_ok!(source.extract(&payload));
    assert_eq!(records.len(), 5);
    assert!(records.iter().all(|(_, meta)| meta.name != "X"));
}

#[tokio::test]
async fn test_cryptocompare_error_message_is_unavailable() {
    let app = Router::new().route(
        "/data/top/mktcapfull",
        get(|| async { Json(json!({"Response": "Error", "Message": "rate limit", "Data": {}})) }),
    );
    let addr = serve(app).await;
    let source = CryptoCompareSource::new("cryptocompare", format!("http://{addr}"), client());

    match assert_err!(source.fetch(5).await) {
        IngestError::ProviderUnavailable { reason, .. } => assert_eq!(reason, "rate limit"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_coinmarketcap_sends_key_header() {
    const KEY_ENV: &str = "MARKET_CAP_FEEDS_TEST_CMC_KEY";
    std::env::set_var(KEY_ENV, "secret-key");

    let app = Router::new().route(
        "/v1/cryptocurrency/listings/latest",
        get(|headers: HeaderMap| async move {
            if headers.get("X-CMC_PRO_API_KEY").and_then(|v| v.to_str().ok()) != Some("secret-key") {
                return (StatusCode::UNAUTHORIZED, Json(json!({"status": {"error_code": 1002}})));
            }
            (
                StatusCode::OK,
                Json(json!({"data": [{
                    "name": "Bitcoin",
                    "last_updated": "2024-01-01T00:00:00.000Z",
                    "quote": {"USD": {"market_cap": 8.2e11}}
                }]})),
            )
        }),
    );
    let addr = serve(app).await;
    let source = CoinMarketCapSource::new("coinmarketcap", format!("http://{addr}"), client(), KEY_ENV);

    let payload = assert_ok!(source.fetch(1).await);
    let records = assert_ok!(source.extract(&payload));
    assert_eq!(records.records()[0].name, "Bitcoin");
}

#[tokio::test]
async fn test_named_coingecko_missing_id_is_insufficient() {
    let app = Router::new().route(
        "/api/v3/coins/markets",
        get(|| async { Json(json!([{"id": "bitcoin", "name": "Bitcoin", "market_cap": 1, "last_updated": "t"}])) }),
    );
    let addr = serve(app).await;
    let source = CoinGeckoSource::new("coingecko", format!("http://{addr}"), client())
        .with_ids(vec!["bitcoin".to_string(), "ethereum".to_string()]);

    assert!(matches!(
        source.fetch(2).await,
        Err(IngestError::InsufficientData { missing: 1, .. })
    ));
}

#[tokio::test]
async fn test_datafeed_endpoint_reports_data_and_404s() {
    let store = Arc::new(MemoryStore::default());
    let source = Arc::new(ScriptedSource::always("fixture", collision_payload()));
    let registry = Arc::new(registry_with(
        descriptor("cg_top", "fixture", 3600),
        source,
        store.clone(),
    ));
    let state = AppState {
        registry: Arc::clone(&registry),
        store: store.clone() as Arc<dyn MarketCapStore>,
        metrics: Arc::new(IngestMetrics::new().unwrap()),
    };
    let addr = serve(router(state)).await;
    let http = reqwest::Client::new();

    let unknown = http.get(format!("http://{addr}/datafeed/nope")).send().await.unwrap();
    assert_eq!(unknown.status(), reqwest::StatusCode::NOT_FOUND);
    let body: Value = unknown.json().await.unwrap();
    assert_eq!(body["code"], 404);
    assert_eq!(body["description"], "unknown feed name");

    let empty: Value = http
        .get(format!("http://{addr}/datafeed/cg_top"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(empty["description"], "new feed / no data yet");

    assert_ok!(registry.start("cg_top").await);
    for _ in 0..50 {
        if !store.all().await.is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    let latest = http.get(format!("http://{addr}/datafeed/cg_top")).send().await.unwrap();
    assert_eq!(latest.status(), reqwest::StatusCode::OK);
    let body: Value = latest.json().await.unwrap();
    assert_eq!(body["records"]["100"]["name"], "A2");
    assert_eq!(body["cycle"], 1);

    let feeds: Value = http.get(format!("http://{addr}/feeds")).send().await.unwrap().json().await.unwrap();
    assert_eq!(feeds[0]["name"], "cg_top");
    assert_eq!(feeds[0]["active"], true);

    let ready = http.get(format!("http://{addr}/ready")).send().await.unwrap();
    assert_eq!(ready.status(), reqwest::StatusCode::OK);

    registry.shutdown().await;
}

async fn serve_registry(registry: Arc<FeedRegistry>, store: Arc<dyn MarketCapStore>) -> SocketAddr {
    let state = AppState {
        registry,
        store,
        metrics: Arc::new(IngestMetrics::new().unwrap()),
    };
    serve(router(state)).await
}

#[tokio::test]
async fn test_feed_control_endpoints() {
    let store = Arc::new(MemoryStore::default());
    let source = Arc::new(ScriptedSource::always("fixture", collision_payload()));
    let registry = Arc::new(registry_with(
        descriptor("cg_top", "fixture", 3600),
        source,
        store.clone(),
    ));
    let addr = serve_registry(Arc::clone(&registry), store).await;
    let http = reqwest::Client::new();

    let started: Value = http
        .post(format!("http://{addr}/feeds/cg_top/start"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(started["changed"], true);
    assert_eq!(started["status"]["active"], true);
    assert!(registry.status("cg_top").unwrap().active);

    let again: Value = http
        .post(format!("http://{addr}/feeds/cg_top/start"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(again["changed"], false);

    let stopped = http.post(format!("http://{addr}/feeds/cg_top/stop")).send().await.unwrap();
    assert_eq!(stopped.status(), reqwest::StatusCode::OK);
    let stopped: Value = stopped.json().await.unwrap();
    assert_eq!(stopped["changed"], true);
    assert_eq!(stopped["status"]["active"], false);
    assert!(!registry.status("cg_top").unwrap().active);

    for action in ["start", "stop"] {
        let unknown = http
            .post(format!("http://{addr}/feeds/nope/{action}"))
            .send()
            .await
            .unwrap();
        assert_eq!(unknown.status(), reqwest::StatusCode::NOT_FOUND);
        let body: Value = unknown.json().await.unwrap();
        assert_eq!(body["description"], "unknown feed name");
    }

    registry.shutdown().await;
}

#[tokio::test]
async fn test_history_endpoint_serves_one_feed_tail() {
    let store = Arc::new(MemoryStore::default());
    for cycle in 1..=3 {
        let entry = LogEntry::new("shared", "top10", cycle, MarketCapMap::new(), chrono::Utc::now());
        assert_ok!(store.append(&entry).await);
    }
    let other = LogEntry::new("shared", "top3", 1, MarketCapMap::new(), chrono::Utc::now());
    assert_ok!(store.append(&other).await);

    let source = Arc::new(ScriptedSource::always("shared", collision_payload()));
    let registry = Arc::new(registry_with_feeds(
        vec![descriptor("top10", "shared", 3600), descriptor("top3", "shared", 3600)],
        source,
        store.clone(),
    ));
    let addr = serve_registry(registry, store).await;
    let http = reqwest::Client::new();

    let tail: Vec<Value> = http
        .get(format!("http://{addr}/history/top10?limit=2"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let cycles: Vec<u64> = tail.iter().map(|e| e["cycle"].as_u64().unwrap()).collect();
    assert_eq!(cycles, vec![2, 3]);
    assert!(tail.iter().all(|e| e["feed"] == "top10"));

    let all: Vec<Value> = http
        .get(format!("http://{addr}/history/top10"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all.len(), 3);

    let unknown = http.get(format!("http://{addr}/history/nope")).send().await.unwrap();
    assert_eq!(unknown.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ready_is_503_when_store_is_not_writable() {
    let dir = tempfile::TempDir::new().unwrap();
    // A regular file where the data directory should be.
    let blocked = dir.path().join("data");
    std::fs::write(&blocked, b"not a directory").unwrap();
    let store: Arc<dyn MarketCapStore> = Arc::new(JsonlStore::new(&blocked));

    let source = Arc::new(ScriptedSource::always("fixture", collision_payload()));
    let registry = Arc::new(registry_with(
        descriptor("cg_top", "fixture", 3600),
        source,
        Arc::clone(&store),
    ));
    let addr = serve_registry(registry, store).await;

    let ready = reqwest::get(format!("http://{addr}/ready")).await.unwrap();
    assert_eq!(ready.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(ready.text().await.unwrap(), "NOT READY");

    let live = reqwest::get(format!("http://{addr}/live")).await.unwrap();
    assert_eq!(live.status(), reqwest::StatusCode::OK);
}
