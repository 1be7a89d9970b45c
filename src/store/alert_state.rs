//! Durable last-fired alert state
//!
//! Authoritative source of "when did we last alert for this symbol and
//! direction". The in-memory map is seeded from a JSON file at startup and
//! every update is persisted (write temp file, atomic rename) before
//! `record_fired` returns, so a crash right after a fired alert cannot
//! trigger a duplicate alert storm on restart.

use crate::error::WatchError;
use crate::models::AlertDirection;
use crate::monitor::evaluator::cooldown_elapsed;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Last-fired timestamps for the two directions of one symbol.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct DirectionTimestamps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub above: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub below: Option<DateTime<Utc>>,
}

impl DirectionTimestamps {
    pub fn get(&self, direction: AlertDirection) -> Option<DateTime<Utc>> {
        match direction {
            AlertDirection::Above => self.above,
            AlertDirection::Below => self.below,
        }
    }

    fn set(&mut self, direction: AlertDirection, timestamp: DateTime<Utc>) {
        match direction {
            AlertDirection::Above => self.above = Some(timestamp),
            AlertDirection::Below => self.below = Some(timestamp),
        }
    }
}

pub struct AlertStateTracker {
    path: PathBuf,
    cooldown: chrono::Duration,
    state: Mutex<HashMap<String, DirectionTimestamps>>,
}

impl AlertStateTracker {
    /// Open the tracker, seeding from the state file if present. An
    /// unreadable file is logged and treated as empty rather than refusing
    /// to start.
    pub fn load(path: impl Into<PathBuf>, cooldown: chrono::Duration) -> Result<Self, WatchError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| WatchError::Storage(format!("creating state directory: {}", e)))?;
            }
        }

        let state = if path.exists() {
            match std::fs::read_to_string(&path)
                .map_err(WatchError::from)
                .and_then(|raw| serde_json::from_str(&raw).map_err(WatchError::from))
            {
                Ok(map) => map,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "AlertStateTracker: cannot read state file, starting empty");
                    HashMap::new()
                }
            }
        } else {
            info!(path = %path.display(), "AlertStateTracker: created new alert state at {}", path.display());
            HashMap::new()
        };

        Ok(Self {
            path,
            cooldown,
            state: Mutex::new(state),
        })
    }

    pub async fn is_eligible(
        &self,
        symbol: &str,
        direction: AlertDirection,
        now: DateTime<Utc>,
    ) -> bool {
        let state = self.state.lock().await;
        let last = state.get(symbol).and_then(|t| t.get(direction));
        cooldown_elapsed(last, now, self.cooldown)
    }

    pub async fn last_fired(
        &self,
        symbol: &str,
        direction: AlertDirection,
    ) -> Option<DateTime<Utc>> {
        let state = self.state.lock().await;
        state.get(symbol).and_then(|t| t.get(direction))
    }

    /// Record a fired alert and persist the full map before returning.
    /// A stored timestamp only moves forward in time.
    pub async fn record_fired(
        &self,
        symbol: &str,
        direction: AlertDirection,
        now: DateTime<Utc>,
    ) -> Result<(), WatchError> {
        let mut state = self.state.lock().await;
        let entry = state.entry(symbol.to_string()).or_default();

        if let Some(existing) = entry.get(direction) {
            if existing >= now {
                debug!(
                    symbol = %symbol,
                    direction = %direction,
                    "AlertStateTracker: keeping newer timestamp for {} {}",
                    symbol,
                    direction
                );
                return Ok(());
            }
        }
        entry.set(direction, now);

        self.persist(&state)
    }

    fn persist(&self, state: &HashMap<String, DirectionTimestamps>) -> Result<(), WatchError> {
        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| WatchError::Storage(format!("writing alert state: {}", e)))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| WatchError::Storage(format!("replacing alert state: {}", e)))?;
        Ok(())
    }

    pub async fn snapshot(&self) -> HashMap<String, DirectionTimestamps> {
        self.state.lock().await.clone()
    }
}
