//! HTTP Server - Datafeed, Status, Metrics and Probes
//!
//! Serves the latest persisted entry and recent history of each feed,
//! runtime start/stop control, and the operational endpoints via axum
//! 0.7. Errors are always JSON so clients can parse every response;
//! internal failure detail is never exposed.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{error, info, instrument};

use crate::adapters::metrics::IngestMetrics;
use crate::domain::FeedStatus;
use crate::ports::repository::MarketCapStore;
use crate::usecases::FeedRegistry;

/// Shared state of every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<FeedRegistry>,
    pub store: Arc<dyn MarketCapStore>,
    pub metrics: Arc<IngestMetrics>,
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: u16,
    description: String,
}

/// Entries returned by `/history/:name` when no limit is given.
const DEFAULT_HISTORY_LIMIT: usize = 10;
/// Upper bound on `?limit=`.
const MAX_HISTORY_LIMIT: usize = 1_000;

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

/// Reply to a start/stop request.
#[derive(Debug, Serialize)]
struct ControlBody {
    /// False if the feed was already in the requested state.
    changed: bool,
    status: FeedStatus,
}

fn error_response(status: StatusCode, description: &str) -> Response {
    let body = ErrorBody {
        error: format!("http {}", status.as_u16()),
        code: status.as_u16(),
        description: description.to_string(),
    };
    (status, Json(body)).into_response()
}

/// Build the router; split out so tests can drive it without a socket.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/feeds", get(feeds))
        .route("/feeds/:name/start", post(start_feed))
        .route("/feeds/:name/stop", post(stop_feed))
        .route("/datafeed/:name", get(datafeed))
        .route("/history/:name", get(history))
        .route("/metrics", get(metrics))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .with_state(state)
}

/// Axum-based HTTP server.
pub struct HttpServer {
    state: AppState,
    bind_address: String,
}

impl HttpServer {
    pub fn new(state: AppState, bind_address: impl Into<String>) -> Self {
        Self {
            state,
            bind_address: bind_address.into(),
        }
    }

    /// Serve until the shutdown broadcast fires.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;
        info!(address = %self.bind_address, "HTTP server started");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }
}

async fn banner(State(state): State<AppState>) -> impl IntoResponse {
    format!(
        "market-cap feeds endpoint ({} feeds)",
        state.registry.list_names().len()
    )
}

async fn feeds(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.statuses())
}

/// Latest entry of a feed, or a 404 telling unknown feeds from empty ones.
async fn datafeed(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.registry.get_most_recent(&name).await {
        Ok(Some(entry)) => Json(entry).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "new feed / no data yet"),
        Err(_) => error_response(StatusCode::NOT_FOUND, "unknown feed name"),
    }
}

/// Last `limit` entries of a feed, oldest first.
async fn history(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);
    match state.registry.history(&name, limit).await {
        Ok(entries) => Json(entries).into_response(),
        Err(_) => error_response(StatusCode::NOT_FOUND, "unknown feed name"),
    }
}

#[instrument(skip(state))]
async fn start_feed(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.registry.start(&name).await {
        Ok(changed) => control_response(&state, &name, changed),
        Err(_) => error_response(StatusCode::NOT_FOUND, "unknown feed name"),
    }
}

#[instrument(skip(state))]
async fn stop_feed(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.registry.stop(&name).await {
        Ok(changed) => control_response(&state, &name, changed),
        Err(_) => error_response(StatusCode::NOT_FOUND, "unknown feed name"),
    }
}

fn control_response(state: &AppState, name: &str, changed: bool) -> Response {
    match state.registry.status(name) {
        Ok(status) => Json(ControlBody { changed, status }).into_response(),
        Err(_) => error_response(StatusCode::NOT_FOUND, "unknown feed name"),
    }
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Metrics encoding failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable")
        }
    }
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness probe: returns 200 only if the store is writable.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if state.store.is_healthy().await {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}
