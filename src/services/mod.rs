//! External capability adapters and shared remote-call policies.

pub mod price_source;
pub mod retry;

pub use price_source::{PriceSource, Quote, SourceError, YahooChartSource};
pub use retry::RetryPolicy;
