//! Durable flat-file state: price history and alert cooldown tracking.

pub mod alert_state;
pub mod history;

pub use alert_state::{AlertStateTracker, DirectionTimestamps};
pub use history::HistoryStore;
