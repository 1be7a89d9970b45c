//! Price source adapter
//!
//! The engine only depends on the `PriceSource` trait. The shipped
//! implementation reads a Yahoo-chart-style quote endpoint; the base URL is
//! injectable so tests can point it at a mock server.

use crate::error::WatchError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Latest known price for a symbol, as reported by the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub price: f64,
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum SourceError {
    /// Network-level or rate-limit failure; worth retrying.
    #[error("transient price source failure: {0}")]
    Transient(String),

    /// Unknown symbol, malformed payload or other non-retryable failure.
    #[error("permanent price source failure: {0}")]
    Permanent(String),
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Transient(_))
    }

    pub fn from_http(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            return SourceError::Transient(err.to_string());
        }
        if err.is_decode() {
            return SourceError::Permanent(err.to_string());
        }
        match err.status() {
            Some(status) if status.is_server_error() || status.as_u16() == 429 => {
                SourceError::Transient(err.to_string())
            }
            Some(_) => SourceError::Permanent(err.to_string()),
            None => SourceError::Transient(err.to_string()),
        }
    }
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch the latest price for a symbol.
    async fn fetch_price(&self, symbol: &str) -> Result<Quote, SourceError>;
}

/// Quote client for a Yahoo-finance-chart-compatible endpoint.
pub struct YahooChartSource {
    client: reqwest::Client,
    base_url: String,
}

impl YahooChartSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, WatchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
    #[serde(rename = "regularMarketTime")]
    regular_market_time: Option<i64>,
}

#[async_trait]
impl PriceSource for YahooChartSource {
    async fn fetch_price(&self, symbol: &str) -> Result<Quote, SourceError> {
        let url = format!(
            "{}/v8/finance/chart/{}?interval=1d&range=1d",
            self.base_url, symbol
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(SourceError::from_http)?;

        let status = response.status();
        if !status.is_success() {
            let msg = format!("quote endpoint returned {} for {}", status, symbol);
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                SourceError::Transient(msg)
            } else {
                SourceError::Permanent(msg)
            });
        }

        let body: ChartResponse = response.json().await.map_err(SourceError::from_http)?;
        let meta = body.chart.result.and_then(|mut results| {
            if results.is_empty() {
                None
            } else {
                Some(results.remove(0).meta)
            }
        });

        let price = meta
            .as_ref()
            .and_then(|m| m.regular_market_price)
            .ok_or_else(|| SourceError::Permanent(format!("no data available for {}", symbol)))?;

        // Fall back to receipt time when the payload omits the quote time.
        let as_of = meta
            .and_then(|m| m.regular_market_time)
            .and_then(|t| DateTime::from_timestamp(t, 0))
            .unwrap_or_else(Utc::now);

        Ok(Quote { price, as_of })
    }
}
