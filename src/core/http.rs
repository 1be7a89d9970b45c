//! HTTP endpoint server using Axum
//!
//! Thin query/control surface over the monitor: snapshots, history, alert
//! state, threshold updates and a manual refresh trigger. The dashboard is a
//! stateless consumer of these routes.

use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Json, Response},
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, Level};

use crate::core::scheduler::MonitorScheduler;
use crate::metrics::Metrics;
use crate::models::threshold::is_valid_symbol;
use crate::models::ThresholdLimits;
use crate::monitor::engine::MonitorEngine;

#[derive(Clone)]
pub struct AppState {
    pub health: Arc<RwLock<HealthStatus>>,
    pub metrics: Arc<Metrics>,
    pub start_time: Arc<Instant>,
    pub engine: Arc<MonitorEngine>,
    pub scheduler: Arc<MonitorScheduler>,
}

#[derive(Clone, Debug)]
pub struct HealthStatus {
    pub status: String,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    let health = state.health.read().await;
    let uptime_seconds = state.start_time.elapsed().as_secs();
    Ok(Json(json!({
        "status": health.status,
        "uptime_seconds": uptime_seconds,
        "service": "bursawatch-engine"
    })))
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .export()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Middleware to track HTTP request metrics
async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    state.metrics.http_requests_in_flight.inc();
    let response = next.run(request).await;
    let status = response.status();
    let duration = start.elapsed();
    state.metrics.http_requests_in_flight.dec();

    state.metrics.http_requests_total.inc();
    state
        .metrics
        .http_request_duration_seconds
        .observe(duration.as_secs_f64());

    if status.is_server_error() {
        error!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = duration.as_millis() as u64,
            "HTTP request error"
        );
    }

    response
}

#[derive(Debug, Serialize)]
struct StockInfo {
    symbol: String,
    current_price: Option<f64>,
    as_of: Option<DateTime<Utc>>,
    threshold_up: f64,
    threshold_down: f64,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
struct UpdateThresholdRequest {
    up: f64,
    down: f64,
}

/// All monitored symbols with the latest observed price and thresholds.
/// Prices come from the monitor's cache, so an unfetched or failing symbol
/// shows up without a price rather than blocking on the network.
async fn get_stocks(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    let thresholds = state.engine.registry().snapshot().await;
    let latest = state.engine.latest_snapshot().await;

    let mut stocks: Vec<StockInfo> = thresholds
        .into_iter()
        .map(|(symbol, limits)| {
            let observation = latest.get(&symbol);
            StockInfo {
                current_price: observation.map(|o| o.price),
                as_of: observation.map(|o| o.timestamp),
                threshold_up: limits.up,
                threshold_down: limits.down,
                symbol,
            }
        })
        .collect();
    stocks.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    Ok(Json(json!(stocks)))
}

async fn get_stock(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    if !is_valid_symbol(&symbol) {
        return Err(StatusCode::BAD_REQUEST);
    }
    let Some(limits) = state.engine.registry().get(&symbol).await else {
        return Err(StatusCode::NOT_FOUND);
    };
    let observation = state.engine.latest_observation(&symbol).await;

    Ok(Json(json!({
        "symbol": symbol,
        "current_price": observation.as_ref().map(|o| o.price),
        "as_of": observation.as_ref().map(|o| o.timestamp),
        "threshold_up": limits.up,
        "threshold_down": limits.down,
    })))
}

async fn get_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Value>, StatusCode> {
    let limit = params.limit.unwrap_or(100);
    let history = state
        .engine
        .history()
        .read_recent(limit)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to read price history");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(json!({
        "count": history.len(),
        "history": history,
    })))
}

async fn get_alerts(State(state): State<AppState>) -> Json<Value> {
    let alerts = state.engine.tracker().snapshot().await;
    Json(json!({ "alerts": alerts }))
}

async fn get_thresholds(State(state): State<AppState>) -> Json<Value> {
    let thresholds = state.engine.registry().snapshot().await;
    Json(json!({ "thresholds": thresholds }))
}

/// Update one symbol's thresholds. Takes effect on the next cycle and is
/// in-memory only; the thresholds file is not rewritten.
async fn update_threshold(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Json(request): Json<UpdateThresholdRequest>,
) -> Result<Json<Value>, StatusCode> {
    let limits = ThresholdLimits::new(request.up, request.down);
    state
        .engine
        .registry()
        .update(&symbol, limits)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    Ok(Json(json!({
        "symbol": symbol,
        "threshold_up": limits.up,
        "threshold_down": limits.down,
    })))
}

/// Request an immediate out-of-band monitoring cycle.
async fn trigger_refresh(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    state.scheduler.trigger_now();
    (
        StatusCode::ACCEPTED,
        Json(json!({ "message": "refresh scheduled" })),
    )
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/api/stocks", get(get_stocks))
        .route("/api/stocks/{symbol}", get(get_stock))
        .route("/api/history", get(get_history))
        .route("/api/alerts", get(get_alerts))
        .route("/api/thresholds", get(get_thresholds))
        .route("/api/thresholds/{symbol}", put(update_threshold))
        .route("/api/refresh", post(trigger_refresh))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
