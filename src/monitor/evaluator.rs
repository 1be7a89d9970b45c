//! Pure threshold evaluation
//!
//! No I/O and no side effects here: breach detection and the cooldown rule
//! are plain functions of their inputs, so the decisions are independently
//! testable and replaying the same observation yields the same result.

use crate::models::{AlertDirection, PriceObservation, ThresholdLimits};
use chrono::{DateTime, Duration, Utc};

/// One threshold crossing found in an observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Breach {
    pub direction: AlertDirection,
    pub threshold: f64,
    /// Signed distance from the crossed threshold, in percent. Reporting
    /// only, never a gating condition.
    pub percent_distance: f64,
}

/// Compare an observation against its limits. Comparisons are inclusive: a
/// price sitting exactly on a threshold counts as a breach.
///
/// Both directions are checked independently, so a degenerate (inverted)
/// pair reports two breaches; config validation keeps such pairs out of the
/// registry in the first place.
pub fn evaluate(observation: &PriceObservation, limits: &ThresholdLimits) -> Vec<Breach> {
    let mut breaches = Vec::new();

    if observation.price >= limits.up {
        breaches.push(Breach {
            direction: AlertDirection::Above,
            threshold: limits.up,
            percent_distance: percent_distance(observation.price, limits.up),
        });
    }
    if observation.price <= limits.down {
        breaches.push(Breach {
            direction: AlertDirection::Below,
            threshold: limits.down,
            percent_distance: percent_distance(observation.price, limits.down),
        });
    }

    breaches
}

pub fn percent_distance(price: f64, threshold: f64) -> f64 {
    (price - threshold) / threshold * 100.0
}

/// Cooldown rule: eligible when there is no prior fire, or when at least
/// `cooldown` has elapsed since it. Boundary inclusive.
pub fn cooldown_elapsed(
    last_fired: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> bool {
    match last_fired {
        None => true,
        Some(last) => now - last >= cooldown,
    }
}
