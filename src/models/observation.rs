//! Price observation model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single sampled price for a symbol. Immutable once created; appended to
/// the history store and never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub symbol: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

impl PriceObservation {
    pub fn new(symbol: impl Into<String>, price: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            timestamp,
        }
    }
}
