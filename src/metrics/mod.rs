//! Prometheus metrics for the monitor and the HTTP surface

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder,
};

pub struct Metrics {
    registry: Registry,

    pub cycles_total: IntCounter,
    pub cycle_duration_seconds: Histogram,
    pub fetch_failures_total: IntCounter,
    pub observations_recorded_total: IntCounter,
    pub alerts_fired_total: IntCounter,
    pub notification_failures_total: IntCounter,
    pub storage_errors_total: IntCounter,

    pub http_requests_total: IntCounter,
    pub http_requests_in_flight: IntGauge,
    pub http_request_duration_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let cycles_total = IntCounter::new("monitor_cycles_total", "Completed monitoring cycles")?;
        let cycle_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "monitor_cycle_duration_seconds",
            "Wall time of one monitoring cycle",
        ))?;
        let fetch_failures_total = IntCounter::new(
            "price_fetch_failures_total",
            "Price fetches that failed after retries",
        )?;
        let observations_recorded_total = IntCounter::new(
            "observations_recorded_total",
            "Price observations appended to the history store",
        )?;
        let alerts_fired_total =
            IntCounter::new("alerts_fired_total", "Threshold alerts dispatched")?;
        let notification_failures_total = IntCounter::new(
            "notification_failures_total",
            "Channel deliveries that failed permanently or exhausted retries",
        )?;
        let storage_errors_total = IntCounter::new(
            "storage_errors_total",
            "History append or alert-state persistence failures",
        )?;

        let http_requests_total =
            IntCounter::new("http_requests_total", "HTTP requests received")?;
        let http_requests_in_flight =
            IntGauge::new("http_requests_in_flight", "HTTP requests currently in flight")?;
        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency",
        ))?;

        registry.register(Box::new(cycles_total.clone()))?;
        registry.register(Box::new(cycle_duration_seconds.clone()))?;
        registry.register(Box::new(fetch_failures_total.clone()))?;
        registry.register(Box::new(observations_recorded_total.clone()))?;
        registry.register(Box::new(alerts_fired_total.clone()))?;
        registry.register(Box::new(notification_failures_total.clone()))?;
        registry.register(Box::new(storage_errors_total.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            cycles_total,
            cycle_duration_seconds,
            fetch_failures_total,
            observations_recorded_total,
            alerts_fired_total,
            notification_failures_total,
            storage_errors_total,
            http_requests_total,
            http_requests_in_flight,
            http_request_duration_seconds,
        })
    }

    /// Render all registered metrics in the Prometheus text format.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| prometheus::Error::Msg(format!("metrics are not valid UTF-8: {}", e)))
    }
}
