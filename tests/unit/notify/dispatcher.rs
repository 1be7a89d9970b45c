//! Unit tests for the notification dispatcher

use async_trait::async_trait;
use bursawatch::models::{AlertDirection, AlertEvent};
use bursawatch::notify::{AlertChannel, Dispatcher, NotifyError};
use bursawatch::services::retry::RetryPolicy;
use chrono::{TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Channel whose next results are scripted; once the script is exhausted
/// every send succeeds.
struct ScriptedChannel {
    name: &'static str,
    script: Mutex<VecDeque<Result<(), NotifyError>>>,
    calls: AtomicU32,
}

impl ScriptedChannel {
    fn new(name: &'static str, script: Vec<Result<(), NotifyError>>) -> Arc<Self> {
        Arc::new(Self {
            name,
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AlertChannel for ScriptedChannel {
    fn name(&self) -> &str {
        self.name
    }

    async fn send(&self, _event: &AlertEvent) -> Result<(), NotifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.lock().await.pop_front().unwrap_or(Ok(()))
    }
}

fn event() -> AlertEvent {
    AlertEvent {
        symbol: "5285.KL".to_string(),
        direction: AlertDirection::Above,
        price: 10.55,
        threshold: 10.50,
        observed_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 0).unwrap(),
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(5), Duration::from_millis(20))
}

#[tokio::test]
async fn all_channels_delivered() {
    let email = ScriptedChannel::new("email", vec![]);
    let telegram = ScriptedChannel::new("telegram", vec![]);
    let dispatcher = Dispatcher::new(fast_retry())
        .with_channel(email.clone())
        .with_channel(telegram.clone());

    let report = dispatcher.dispatch(&event()).await;

    assert_eq!(report.delivered_count(), 2);
    assert_eq!(report.failed_count(), 0);
    assert!(!report.is_partial());
    assert_eq!(email.calls(), 1);
    assert_eq!(telegram.calls(), 1);
}

#[tokio::test]
async fn permanent_failure_does_not_block_other_channels() {
    let email = ScriptedChannel::new(
        "email",
        vec![Err(NotifyError::Permanent("bad credentials".to_string()))],
    );
    let telegram = ScriptedChannel::new("telegram", vec![]);
    let dispatcher = Dispatcher::new(fast_retry())
        .with_channel(email.clone())
        .with_channel(telegram.clone());

    let report = dispatcher.dispatch(&event()).await;

    assert!(report.is_partial());
    assert_eq!(report.delivered_count(), 1);
    assert_eq!(report.failed_count(), 1);

    // Permanent errors fail fast: a single attempt, no backoff.
    let email_outcome = &report.outcomes[0];
    assert_eq!(email_outcome.channel, "email");
    assert_eq!(email_outcome.attempts, 1);
    assert!(matches!(
        email_outcome.result,
        Err(NotifyError::Permanent(_))
    ));

    assert!(report.outcomes[1].delivered());
    assert_eq!(telegram.calls(), 1);
}

#[tokio::test]
async fn transient_failures_retry_then_deliver() {
    let telegram = ScriptedChannel::new(
        "telegram",
        vec![
            Err(NotifyError::Transient("timeout".to_string())),
            Err(NotifyError::Transient("timeout".to_string())),
        ],
    );
    let dispatcher = Dispatcher::new(fast_retry()).with_channel(telegram.clone());

    let report = dispatcher.dispatch(&event()).await;

    assert_eq!(report.delivered_count(), 1);
    assert_eq!(report.outcomes[0].attempts, 3);
    assert_eq!(telegram.calls(), 3);
}

#[tokio::test]
async fn exhausted_retries_fail_the_channel_only() {
    let email = ScriptedChannel::new(
        "email",
        vec![
            Err(NotifyError::Transient("timeout".to_string())),
            Err(NotifyError::Transient("timeout".to_string())),
            Err(NotifyError::Transient("timeout".to_string())),
        ],
    );
    let telegram = ScriptedChannel::new("telegram", vec![]);
    let dispatcher = Dispatcher::new(fast_retry())
        .with_channel(email.clone())
        .with_channel(telegram.clone());

    let report = dispatcher.dispatch(&event()).await;

    assert!(report.is_partial());
    assert_eq!(report.outcomes[0].attempts, 3);
    assert!(matches!(
        report.outcomes[0].result,
        Err(NotifyError::Transient(_))
    ));
    assert!(report.outcomes[1].delivered());
}

#[tokio::test]
async fn no_retry_state_is_kept_between_events() {
    let email = ScriptedChannel::new(
        "email",
        vec![Err(NotifyError::Transient("timeout".to_string()))],
    );
    let dispatcher = Dispatcher::new(fast_retry()).with_channel(email.clone());

    let first = dispatcher.dispatch(&event()).await;
    assert_eq!(first.outcomes[0].attempts, 2);

    let second = dispatcher.dispatch(&event()).await;
    assert_eq!(second.outcomes[0].attempts, 1);
}
