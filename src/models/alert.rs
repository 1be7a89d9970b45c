//! Alert direction and notification event models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which side of the threshold band a price crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertDirection {
    Above,
    Below,
}

impl AlertDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertDirection::Above => "above",
            AlertDirection::Below => "below",
        }
    }

    /// Headline word used in notification messages.
    pub fn alert_word(&self) -> &'static str {
        match self {
            AlertDirection::Above => "UP",
            AlertDirection::Below => "DOWN",
        }
    }
}

impl std::fmt::Display for AlertDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload handed to the notification dispatcher when a breach fires.
/// Transient; not persisted beyond delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub symbol: String,
    pub direction: AlertDirection,
    pub price: f64,
    pub threshold: f64,
    pub observed_at: DateTime<Utc>,
}
