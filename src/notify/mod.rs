//! Notification dispatch across independent channels
//!
//! Each enabled channel gets its own retried delivery attempt; one channel
//! failing never blocks the others. The caller records the alert as fired
//! based on the dispatch being attempted, not on every channel succeeding.

pub mod email;
pub mod telegram;

pub use email::EmailChannel;
pub use telegram::TelegramChannel;

use crate::models::AlertEvent;
use crate::services::retry::RetryPolicy;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum NotifyError {
    /// Network/timeout/5xx failure; retried per the backoff policy.
    #[error("transient delivery failure: {0}")]
    Transient(String),

    /// Bad credentials, recipient or request; fails fast so operators can
    /// tell "will self-heal" from "needs a configuration fix".
    #[error("permanent delivery failure: {0}")]
    Permanent(String),
}

impl NotifyError {
    pub fn is_transient(&self) -> bool {
        matches!(self, NotifyError::Transient(_))
    }

    pub fn from_http(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            return NotifyError::Transient(err.to_string());
        }
        match err.status() {
            Some(status) if status.is_server_error() || status.as_u16() == 429 => {
                NotifyError::Transient(err.to_string())
            }
            Some(_) => NotifyError::Permanent(err.to_string()),
            None => NotifyError::Transient(err.to_string()),
        }
    }
}

pub(crate) fn classify_status(channel: &str, status: reqwest::StatusCode) -> NotifyError {
    let msg = format!("{} endpoint returned {}", channel, status);
    if status.is_server_error() || status.as_u16() == 429 {
        NotifyError::Transient(msg)
    } else {
        NotifyError::Permanent(msg)
    }
}

/// A notification delivery mechanism (email, chat bot, ...).
#[async_trait]
pub trait AlertChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, event: &AlertEvent) -> Result<(), NotifyError>;
}

/// Delivery result for one channel within one dispatch.
#[derive(Debug)]
pub struct ChannelOutcome {
    pub channel: String,
    pub attempts: u32,
    pub result: Result<(), NotifyError>,
}

impl ChannelOutcome {
    pub fn delivered(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-channel outcomes of one `dispatch` call.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<ChannelOutcome>,
}

impl DispatchReport {
    pub fn delivered_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.delivered()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.delivered_count()
    }

    pub fn any_delivered(&self) -> bool {
        self.delivered_count() > 0
    }

    pub fn is_partial(&self) -> bool {
        self.any_delivered() && self.failed_count() > 0
    }
}

/// Fans an alert event out to every enabled channel, wrapping each send in
/// the retry policy. No retry state is kept between distinct events.
pub struct Dispatcher {
    channels: Vec<Arc<dyn AlertChannel>>,
    retry: RetryPolicy,
}

impl Dispatcher {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            channels: Vec::new(),
            retry,
        }
    }

    pub fn with_channel(mut self, channel: Arc<dyn AlertChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub async fn dispatch(&self, event: &AlertEvent) -> DispatchReport {
        let mut report = DispatchReport::default();

        for channel in &self.channels {
            let attempts = AtomicU32::new(0u32);
            let result = self
                .retry
                .run(channel.name(), NotifyError::is_transient, || {
                    attempts.fetch_add(1, Ordering::Relaxed);
                    let channel = Arc::clone(channel);
                    async move { channel.send(event).await }
                })
                .await;

            match &result {
                Ok(()) => {
                    info!(
                        channel = channel.name(),
                        symbol = %event.symbol,
                        direction = %event.direction,
                        attempts = attempts.load(Ordering::Relaxed),
                        "Dispatcher: {} alert for {} delivered via {}",
                        event.direction.alert_word(),
                        event.symbol,
                        channel.name()
                    );
                }
                Err(e @ NotifyError::Transient(_)) => {
                    error!(
                        channel = channel.name(),
                        symbol = %event.symbol,
                        attempts = attempts.load(Ordering::Relaxed),
                        error = %e,
                        "Dispatcher: {} delivery failed after {} attempts",
                        channel.name(),
                        attempts.load(Ordering::Relaxed)
                    );
                }
                Err(e @ NotifyError::Permanent(_)) => {
                    error!(
                        channel = channel.name(),
                        symbol = %event.symbol,
                        error = %e,
                        "Dispatcher: {} delivery failed permanently, check channel configuration",
                        channel.name()
                    );
                }
            }

            report.outcomes.push(ChannelOutcome {
                channel: channel.name().to_string(),
                attempts: attempts.load(Ordering::Relaxed),
                result,
            });
        }

        report
    }
}
