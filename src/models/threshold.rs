//! Per-symbol threshold configuration

use crate::error::WatchError;
use serde::{Deserialize, Serialize};

/// Upper/lower alert thresholds for one symbol.
///
/// Invariant: `up > down > 0`. Enforced at load and update time so the
/// evaluator never sees an inverted pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdLimits {
    pub up: f64,
    pub down: f64,
}

impl ThresholdLimits {
    pub fn new(up: f64, down: f64) -> Self {
        Self { up, down }
    }

    pub fn validate(&self) -> Result<(), WatchError> {
        if !self.up.is_finite() || !self.down.is_finite() {
            return Err(WatchError::Config(format!(
                "thresholds must be finite numbers, got up={} down={}",
                self.up, self.down
            )));
        }
        if self.up <= self.down || self.down <= 0.0 {
            return Err(WatchError::Config(format!(
                "invalid thresholds: up ({}) must be > down ({}) > 0",
                self.up, self.down
            )));
        }
        Ok(())
    }
}

/// Validate a Bursa Malaysia ticker: four digits followed by `.KL`
/// (e.g. `5285.KL`).
pub fn is_valid_symbol(symbol: &str) -> bool {
    let Some(code) = symbol.strip_suffix(".KL") else {
        return false;
    };
    code.len() == 4 && code.chars().all(|c| c.is_ascii_digit())
}
