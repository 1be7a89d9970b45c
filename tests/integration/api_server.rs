//! Integration tests for the API server
//!
//! Tests HTTP endpoints, health checks, metrics, and the query/control
//! surface over the monitor.


use serde_json::{json, Value};

use test_utils::TestApiServer;

#[tokio::test]
async fn health_endpoint_reports_healthy_status() {
    let app = TestApiServer::new().await;
    let response = app.server.get("/api/health").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert!(body["uptime_seconds"].as_u64().is_some());
    assert_eq!(body["service"], "bursawatch-engine");
}

#[tokio::test]
async fn metrics_endpoint_exposes_prometheus_metrics() {
    let app = TestApiServer::new().await;
    let response = app.server.get("/metrics").await;
    assert_eq!(response.status_code(), 200);

    let body = response.text();
    assert!(
        body.contains("http_requests_total"),
        "Expected http_requests_total metric"
    );
    assert!(
        body.contains("http_request_duration_seconds"),
        "Expected http_request_duration_seconds metric"
    );
    assert!(
        body.contains("http_requests_in_flight"),
        "Expected http_requests_in_flight metric"
    );
}

#[tokio::test]
async fn stocks_list_shows_thresholds_before_any_cycle() {
    let app = TestApiServer::new().await;
    let response = app.server.get("/api/stocks").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    let stocks = body.as_array().unwrap();
    assert_eq!(stocks.len(), 1);
    assert_eq!(stocks[0]["symbol"], "5285.KL");
    assert_eq!(stocks[0]["threshold_up"], 10.50);
    assert_eq!(stocks[0]["threshold_down"], 9.80);
    assert!(stocks[0]["current_price"].is_null(), "no cycle has run yet");
}

#[tokio::test]
async fn stocks_list_shows_latest_price_after_a_cycle() {
    let app = TestApiServer::new().await;
    app.engine.run_cycle().await;

    let response = app.server.get("/api/stocks").await;
    let body: Value = response.json();
    let stocks = body.as_array().unwrap();
    assert_eq!(stocks[0]["current_price"], 10.20);
    assert!(stocks[0]["as_of"].is_string());
}

#[tokio::test]
async fn stock_detail_validates_and_resolves_the_symbol() {
    let app = TestApiServer::new().await;

    let response = app.server.get("/api/stocks/notasymbol").await;
    assert_eq!(response.status_code(), 400);

    let response = app.server.get("/api/stocks/9999.KL").await;
    assert_eq!(response.status_code(), 404);

    let response = app.server.get("/api/stocks/5285.KL").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["symbol"], "5285.KL");
    assert_eq!(body["threshold_up"], 10.50);
}

#[tokio::test]
async fn thresholds_can_be_read_and_updated() {
    let app = TestApiServer::new().await;

    let response = app.server.get("/api/thresholds").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["thresholds"]["5285.KL"]["up"], 10.50);

    let response = app
        .server
        .put("/api/thresholds/5285.KL")
        .json(&json!({"up": 11.00, "down": 10.00}))
        .await;
    assert_eq!(response.status_code(), 200);

    let response = app.server.get("/api/thresholds").await;
    let body: Value = response.json();
    assert_eq!(body["thresholds"]["5285.KL"]["up"], 11.00);
    assert_eq!(body["thresholds"]["5285.KL"]["down"], 10.00);
}

#[tokio::test]
async fn threshold_update_rejects_invalid_input() {
    let app = TestApiServer::new().await;

    // Inverted band.
    let response = app
        .server
        .put("/api/thresholds/5285.KL")
        .json(&json!({"up": 9.00, "down": 10.00}))
        .await;
    assert_eq!(response.status_code(), 400);

    // Bad symbol.
    let response = app
        .server
        .put("/api/thresholds/notasymbol")
        .json(&json!({"up": 11.00, "down": 10.00}))
        .await;
    assert_eq!(response.status_code(), 400);

    // Original values untouched.
    let response = app.server.get("/api/thresholds").await;
    let body: Value = response.json();
    assert_eq!(body["thresholds"]["5285.KL"]["up"], 10.50);
}

#[tokio::test]
async fn history_endpoint_returns_recorded_observations() {
    let app = TestApiServer::new().await;

    let response = app.server.get("/api/history").await;
    let body: Value = response.json();
    assert_eq!(body["count"], 0);

    app.engine.run_cycle().await;

    let response = app.server.get("/api/history").await;
    let body: Value = response.json();
    assert_eq!(body["count"], 1);
    assert_eq!(body["history"][0]["symbol"], "5285.KL");
    assert_eq!(body["history"][0]["price"], 10.20);
}

#[tokio::test]
async fn history_endpoint_honors_the_limit() {
    let app = TestApiServer::new().await;
    app.engine.run_cycle().await;
    app.engine.run_cycle().await;
    app.engine.run_cycle().await;

    let response = app.server.get("/api/history?limit=2").await;
    let body: Value = response.json();
    assert_eq!(body["count"], 2);
}

#[tokio::test]
async fn alerts_endpoint_is_empty_without_breaches() {
    let app = TestApiServer::new().await;
    app.engine.run_cycle().await;

    let response = app.server.get("/api/alerts").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["alerts"], json!({}));
}

#[tokio::test]
async fn refresh_endpoint_accepts_the_request() {
    let app = TestApiServer::new().await;
    let response = app.server.post("/api/refresh").await;
    assert_eq!(response.status_code(), 202);

    let body: Value = response.json();
    assert_eq!(body["message"], "refresh scheduled");
}
