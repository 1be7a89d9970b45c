//! Periodic driver for the monitoring cycle
//!
//! One tokio task owns the cadence. The timer tick and the manual-refresh
//! trigger feed the same loop, so cycles are serialized by construction;
//! `Notify` holds at most one pending permit, which coalesces refresh
//! requests that arrive while a cycle is running.

use crate::error::WatchError;
use crate::monitor::engine::MonitorEngine;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

pub struct MonitorScheduler {
    engine: Arc<MonitorEngine>,
    interval: Duration,
    running: Arc<AtomicBool>,
    trigger: Arc<Notify>,
    stop_signal: Arc<Notify>,
    handle: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
}

impl MonitorScheduler {
    pub fn new(engine: Arc<MonitorEngine>, interval: Duration) -> Result<Self, WatchError> {
        if interval.is_zero() {
            return Err(WatchError::Config(
                "scheduler disabled: check interval is zero".to_string(),
            ));
        }
        Ok(Self {
            engine,
            interval,
            running: Arc::new(AtomicBool::new(false)),
            trigger: Arc::new(Notify::new()),
            stop_signal: Arc::new(Notify::new()),
            handle: Arc::new(RwLock::new(None)),
        })
    }

    pub fn engine(&self) -> &Arc<MonitorEngine> {
        &self.engine
    }

    /// Start the periodic loop. The first cycle runs immediately.
    pub async fn start(&self) {
        {
            let handle = self.handle.read().await;
            if handle.is_some() {
                debug!("MonitorScheduler: already running");
                return;
            }
        }

        self.running.store(true, Ordering::SeqCst);
        let engine = self.engine.clone();
        let interval = self.interval;
        let running = self.running.clone();
        let trigger = self.trigger.clone();
        let stop_signal = self.stop_signal.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                interval_secs = interval.as_secs(),
                "MonitorScheduler: started with interval {:?}",
                interval
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = trigger.notified() => {
                        debug!("MonitorScheduler: manual refresh requested");
                    }
                    _ = stop_signal.notified() => break,
                }
                if !running.load(Ordering::SeqCst) {
                    break;
                }

                let report = engine.run_cycle().await;
                debug!(
                    alerts_fired = report.alerts_fired,
                    fetch_failures = report.fetch_failures,
                    "MonitorScheduler: cycle finished"
                );

                if !running.load(Ordering::SeqCst) {
                    break;
                }
            }

            info!("MonitorScheduler: loop exited");
        });

        let mut handle = self.handle.write().await;
        *handle = Some(task);
    }

    /// Request an immediate out-of-band cycle. Requests are coalesced: if a
    /// cycle is already running, at most one extra cycle follows it.
    pub fn trigger_now(&self) {
        self.trigger.notify_one();
    }

    /// Cooperative stop: prevents scheduling of the next cycle and waits for
    /// an in-flight cycle to finish, so no partial state is left behind.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.stop_signal.notify_one();

        let task = self.handle.write().await.take();
        if let Some(task) = task {
            let _ = task.await;
            info!("MonitorScheduler: stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.handle.read().await.is_some()
    }
}
