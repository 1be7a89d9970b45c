//! Bursa stock watch engine
//!
//! Periodically samples Bursa Malaysia equity prices, evaluates them against
//! per-symbol thresholds, and dispatches deduplicated alerts over email and
//! Telegram. State lives in flat files: an append-only price history with
//! size-triggered rotation and a JSON map of last-fired alert timestamps.

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod monitor;
pub mod notify;
pub mod services;
pub mod store;
