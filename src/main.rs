//! Market-Cap Feeds - Entry Point
//!
//! Polls market-cap providers on fixed heartbeats, validates and
//! persists every cycle, and serves the latest data over HTTP. Runs
//! until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config (first CLI argument, default `config.toml`) + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Open the JSONL store and ensure its schema
//! 4. Build source adapters, the semantic judge and the ingest pipeline
//! 5. Build the feed registry from the feed table
//! 6. Spawn the HTTP server (/datafeed, /history, /feeds, feed start/stop,
//!    /metrics, /live, /ready)
//! 7. Start feeds marked `autostart`
//! 8. Wait for SIGINT → stop feeds → join loops → stop HTTP server

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use market_cap_feeds::adapters::http::{AppState, HttpServer};
use market_cap_feeds::adapters::metrics::IngestMetrics;
use market_cap_feeds::adapters::persistence::JsonlStore;
use market_cap_feeds::adapters::semantic::build_judge;
use market_cap_feeds::adapters::sources::build_sources;
use market_cap_feeds::config;
use market_cap_feeds::ports::MarketCapStore;
use market_cap_feeds::usecases::{FeedRegistry, IngestPipeline, PayloadValidator};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = config::loader::load_config(&config_path)
        .with_context(|| format!("Failed to load configuration from {config_path}"))?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.service.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path,
        sources = config.sources.len(),
        feeds = config.feeds.len(),
        semantic = config.semantic.enabled,
        "Starting market-cap feeds"
    );

    // ── 3. Store ────────────────────────────────────────────
    let store: Arc<dyn MarketCapStore> = Arc::new(
        JsonlStore::open(&config.persistence.data_dir)
            .await
            .context("Failed to open market-cap store")?,
    );

    // ── 4. Adapters + pipeline ──────────────────────────────
    let metrics = Arc::new(IngestMetrics::new().context("Failed to register metrics")?);
    let sources = build_sources(&config)?;
    let judge = build_judge(&config.semantic)?;
    let validator = PayloadValidator::new(
        judge,
        config.semantic.excerpt_chars,
        config.semantic.timeout(),
    );
    let pipeline = Arc::new(IngestPipeline::new(
        validator,
        Arc::clone(&store),
        Arc::clone(&metrics),
    ));

    // ── 5. Feed registry ────────────────────────────────────
    let descriptors = config.feeds.iter().map(config::FeedConfig::descriptor).collect();
    let registry = Arc::new(
        FeedRegistry::build(descriptors, &sources, pipeline, Arc::clone(&metrics))
            .context("Failed to build feed registry")?,
    );

    // ── 6. HTTP server ──────────────────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let http_handle = if config.http.enabled {
        let server = HttpServer::new(
            AppState {
                registry: Arc::clone(&registry),
                store: Arc::clone(&store),
                metrics: Arc::clone(&metrics),
            },
            config.http.bind_address.clone(),
        );
        let http_shutdown = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = server.run(http_shutdown).await {
                error!(error = %e, "HTTP server failed");
            }
        }))
    } else {
        None
    };

    // ── 7. Autostart feeds ──────────────────────────────────
    for feed in config.feeds.iter().filter(|f| f.autostart) {
        if let Err(e) = registry.start(&feed.name).await {
            warn!(feed = %feed.name, error = %e, "Autostart failed");
        }
    }
    info!(names = ?registry.list_names(), "Feeds registered, service is running");

    // ── 8. Wait for SIGINT ──────────────────────────────────
    signal::ctrl_c().await.context("Failed to listen for SIGINT")?;
    info!("SIGINT received, initiating graceful shutdown");

    registry.shutdown().await;

    let _ = shutdown_tx.send(());
    if let Some(handle) = http_handle {
        let _ = tokio::time::timeout(std::time::Duration::from_secs(5), handle).await;
    }

    info!("Shutdown complete");
    Ok(())
}
