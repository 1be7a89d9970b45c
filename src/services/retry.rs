//! Reusable retry policy for unreliable remote calls
//!
//! Applied uniformly to the price source and each notification channel.
//! Only errors the caller classifies as transient are retried; permanent
//! failures surface immediately.

use backon::{ExponentialBuilder, Retryable};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            min_delay,
            max_delay,
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_attempts.saturating_sub(1))
    }

    /// Run `op`, retrying with exponential backoff while `is_transient`
    /// holds. Delays double between attempts up to `max_delay`.
    pub async fn run<T, E, F, Fut>(
        &self,
        label: &str,
        is_transient: impl FnMut(&E) -> bool,
        op: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        op.retry(self.backoff())
            .when(is_transient)
            .notify(|err: &E, delay: Duration| {
                warn!(
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "{}: transient failure, retrying in {:?}",
                    label,
                    delay
                );
            })
            .await
    }
}
