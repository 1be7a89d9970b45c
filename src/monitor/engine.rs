//! Monitoring cycle: fetch → record → evaluate → notify

use crate::config::ThresholdRegistry;
use crate::metrics::Metrics;
use crate::models::threshold::is_valid_symbol;
use crate::models::{AlertEvent, PriceObservation, ThresholdLimits};
use crate::monitor::evaluator;
use crate::notify::Dispatcher;
use crate::services::price_source::{PriceSource, Quote, SourceError};
use crate::services::retry::RetryPolicy;
use crate::store::{AlertStateTracker, HistoryStore};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Counters accumulated over one cycle, for logging and metrics.
#[derive(Debug, Default, Clone)]
pub struct CycleReport {
    pub symbols_checked: usize,
    pub fetch_failures: usize,
    pub observations_recorded: usize,
    pub alerts_fired: usize,
    pub storage_errors: usize,
}

pub struct MonitorEngine {
    registry: Arc<ThresholdRegistry>,
    source: Arc<dyn PriceSource>,
    history: Arc<HistoryStore>,
    tracker: Arc<AlertStateTracker>,
    dispatcher: Arc<Dispatcher>,
    latest: RwLock<HashMap<String, PriceObservation>>,
    metrics: Option<Arc<Metrics>>,
    retry: RetryPolicy,
    fetch_timeout: Duration,
    cycle_guard: Mutex<()>,
}

impl MonitorEngine {
    pub fn new(
        registry: Arc<ThresholdRegistry>,
        source: Arc<dyn PriceSource>,
        history: Arc<HistoryStore>,
        tracker: Arc<AlertStateTracker>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            registry,
            source,
            history,
            tracker,
            dispatcher,
            latest: RwLock::new(HashMap::new()),
            metrics: None,
            retry: RetryPolicy::default(),
            fetch_timeout: Duration::from_secs(10),
            cycle_guard: Mutex::new(()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<ThresholdRegistry> {
        &self.registry
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    pub fn tracker(&self) -> &Arc<AlertStateTracker> {
        &self.tracker
    }

    /// Latest observation seen for a symbol, if any cycle has fetched it.
    pub async fn latest_observation(&self, symbol: &str) -> Option<PriceObservation> {
        self.latest.read().await.get(symbol).cloned()
    }

    pub async fn latest_snapshot(&self) -> HashMap<String, PriceObservation> {
        self.latest.read().await.clone()
    }

    /// One full pass across the configured symbol set.
    ///
    /// The symbol set is snapshotted at cycle start; registry changes apply
    /// next cycle. Cycles never overlap: a second caller waits on the guard
    /// until the running cycle completes.
    pub async fn run_cycle(&self) -> CycleReport {
        let _guard = self.cycle_guard.lock().await;
        let started = Instant::now();

        let thresholds = self.registry.snapshot().await;
        info!(
            symbol_count = thresholds.len(),
            "MonitorEngine: starting cycle for {} symbols",
            thresholds.len()
        );

        let mut symbols: Vec<(String, ThresholdLimits)> = thresholds.into_iter().collect();
        symbols.sort_by(|a, b| a.0.cmp(&b.0));

        let mut report = CycleReport::default();
        for (symbol, limits) in symbols {
            self.check_symbol(&symbol, limits, &mut report).await;
        }

        let duration = started.elapsed();
        if let Some(metrics) = &self.metrics {
            metrics.cycles_total.inc();
            metrics
                .cycle_duration_seconds
                .observe(duration.as_secs_f64());
        }
        info!(
            checked = report.symbols_checked,
            fetch_failures = report.fetch_failures,
            alerts_fired = report.alerts_fired,
            duration_ms = duration.as_millis() as u64,
            "MonitorEngine: cycle complete, {} symbols checked, {} alerts fired",
            report.symbols_checked,
            report.alerts_fired
        );

        report
    }

    /// Process one symbol. Failures are isolated: an error here skips this
    /// symbol for this cycle only and never aborts the rest of the pass.
    async fn check_symbol(
        &self,
        symbol: &str,
        limits: ThresholdLimits,
        report: &mut CycleReport,
    ) {
        report.symbols_checked += 1;

        if !is_valid_symbol(symbol) {
            warn!(symbol = %symbol, "MonitorEngine: invalid stock symbol: {}", symbol);
            return;
        }
        if let Err(e) = limits.validate() {
            warn!(symbol = %symbol, error = %e, "MonitorEngine: invalid threshold for {}: {}", symbol, e);
            return;
        }

        let quote = match self.fetch_with_retry(symbol).await {
            Ok(quote) => quote,
            Err(e) => {
                warn!(
                    symbol = %symbol,
                    error = %e,
                    "MonitorEngine: failed to fetch {} price, skipping this cycle",
                    symbol
                );
                report.fetch_failures += 1;
                if let Some(metrics) = &self.metrics {
                    metrics.fetch_failures_total.inc();
                }
                return;
            }
        };

        let observation = PriceObservation::new(symbol, quote.price, quote.as_of);
        info!(
            symbol = %symbol,
            price = observation.price,
            "MonitorEngine: {} price: {:.2}",
            symbol,
            observation.price
        );

        match self.history.append(&observation).await {
            Ok(()) => {
                report.observations_recorded += 1;
                if let Some(metrics) = &self.metrics {
                    metrics.observations_recorded_total.inc();
                }
            }
            Err(e) => {
                // History durability is degraded but missing a log line must
                // not suppress an alert; keep evaluating.
                error!(
                    symbol = %symbol,
                    error = %e,
                    "MonitorEngine: failed to record observation for {}",
                    symbol
                );
                report.storage_errors += 1;
                if let Some(metrics) = &self.metrics {
                    metrics.storage_errors_total.inc();
                }
            }
        }

        self.latest
            .write()
            .await
            .insert(symbol.to_string(), observation.clone());

        let now = Utc::now();
        for breach in evaluator::evaluate(&observation, &limits) {
            if !self.tracker.is_eligible(symbol, breach.direction, now).await {
                debug!(
                    symbol = %symbol,
                    direction = %breach.direction,
                    "MonitorEngine: alert for {} {} suppressed by cooldown",
                    symbol,
                    breach.direction
                );
                continue;
            }

            let event = AlertEvent {
                symbol: symbol.to_string(),
                direction: breach.direction,
                price: observation.price,
                threshold: breach.threshold,
                observed_at: observation.timestamp,
            };
            info!(
                symbol = %symbol,
                direction = %breach.direction,
                price = event.price,
                threshold = event.threshold,
                distance_pct = breach.percent_distance,
                "MonitorEngine: alert triggered for {}: {} at {:.2}",
                symbol,
                breach.direction.alert_word(),
                event.price
            );

            let dispatch = self.dispatcher.dispatch(&event).await;
            if let Some(metrics) = &self.metrics {
                metrics
                    .notification_failures_total
                    .inc_by(dispatch.failed_count() as u64);
            }

            // Cooldown is keyed to "attempted", not "delivered": a channel
            // that is persistently down must not cause a retry storm of
            // fresh alerts every cycle.
            if let Err(e) = self
                .tracker
                .record_fired(symbol, breach.direction, now)
                .await
            {
                error!(
                    symbol = %symbol,
                    direction = %breach.direction,
                    error = %e,
                    "MonitorEngine: failed to persist alert state for {} {}",
                    symbol,
                    breach.direction
                );
                report.storage_errors += 1;
                if let Some(metrics) = &self.metrics {
                    metrics.storage_errors_total.inc();
                }
            }

            report.alerts_fired += 1;
            if let Some(metrics) = &self.metrics {
                metrics.alerts_fired_total.inc();
            }
        }
    }

    /// Fetch wrapped in the shared retry policy; each attempt is bounded by
    /// the fetch timeout, and a timeout counts as a transient failure.
    async fn fetch_with_retry(&self, symbol: &str) -> Result<Quote, SourceError> {
        let label = format!("fetch {}", symbol);
        let timeout = self.fetch_timeout;
        self.retry
            .run(&label, SourceError::is_transient, || {
                let source = Arc::clone(&self.source);
                async move {
                    match tokio::time::timeout(timeout, source.fetch_price(symbol)).await {
                        Ok(result) => result,
                        Err(_) => Err(SourceError::Transient(format!(
                            "price fetch for {} timed out after {:?}",
                            symbol, timeout
                        ))),
                    }
                }
            })
            .await
    }
}
