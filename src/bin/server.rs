//! Bursawatch server
//!
//! Runs the monitoring engine alongside the REST surface the dashboard
//! polls. One process: the scheduler drives periodic price checks while
//! Axum serves queries and the manual refresh trigger.

use bursawatch::config::{self, AppConfig, ThresholdRegistry};
use bursawatch::core::http::{create_router, AppState, HealthStatus};
use bursawatch::core::scheduler::MonitorScheduler;
use bursawatch::logging;
use bursawatch::metrics::Metrics;
use bursawatch::monitor::engine::MonitorEngine;
use bursawatch::notify::{Dispatcher, EmailChannel, TelegramChannel};
use bursawatch::services::price_source::YahooChartSource;
use bursawatch::services::retry::RetryPolicy;
use bursawatch::store::{AlertStateTracker, HistoryStore};
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal;
use tokio::sync::RwLock;
use tracing::{info, warn};

const CHANNEL_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    logging::init_logging();

    let config = AppConfig::from_env();
    let env = config::get_environment();
    info!("Starting Bursawatch Server");
    info!(environment = %env, "Environment");
    config.validate()?;

    let thresholds = config::load_thresholds(&config.thresholds_path())?;
    if thresholds.is_empty() {
        return Err("no valid stock thresholds configured in thresholds.json".into());
    }
    info!(
        symbol_count = thresholds.len(),
        "Monitoring {} stocks",
        thresholds.len()
    );
    info!(
        interval_secs = config.monitor.check_interval.as_secs(),
        "Check interval: {:?}",
        config.monitor.check_interval
    );
    info!(
        cooldown_hours = config.monitor.cooldown.num_hours(),
        "Alert cooldown: {} hour(s)",
        config.monitor.cooldown.num_hours()
    );

    let metrics = Arc::new(Metrics::new()?);
    let registry = Arc::new(ThresholdRegistry::new(thresholds));
    let history = Arc::new(HistoryStore::open(
        config.monitor.data_dir.join("history.csv"),
        config.monitor.max_log_bytes,
    )?);
    let tracker = Arc::new(AlertStateTracker::load(
        config.monitor.data_dir.join("last_alerts.json"),
        config.monitor.cooldown,
    )?);

    let retry = RetryPolicy::default();
    let mut dispatcher = Dispatcher::new(retry);
    if config.email.is_configured() {
        dispatcher =
            dispatcher.with_channel(Arc::new(EmailChannel::new(&config.email, CHANNEL_TIMEOUT)?));
        info!("Email channel enabled");
    } else {
        warn!("Email channel disabled: MAIL_API_URL/MAIL_API_KEY/EMAIL_ADDRESS not fully set");
    }
    if config.telegram.is_configured() {
        dispatcher = dispatcher.with_channel(Arc::new(TelegramChannel::new(
            &config.telegram,
            CHANNEL_TIMEOUT,
        )?));
        info!("Telegram channel enabled");
    } else {
        warn!("Telegram channel disabled: TELEGRAM_BOT_TOKEN/TELEGRAM_CHAT_ID not set");
    }

    info!(
        channels = dispatcher.channel_count(),
        "Notification channels configured: {}",
        dispatcher.channel_count()
    );

    let source = Arc::new(YahooChartSource::new(
        config.price_api_url.clone(),
        config.monitor.fetch_timeout,
    )?);

    let engine = Arc::new(
        MonitorEngine::new(registry, source, history, tracker, Arc::new(dispatcher))
            .with_metrics(metrics.clone())
            .with_retry(retry)
            .with_fetch_timeout(config.monitor.fetch_timeout),
    );

    let scheduler = Arc::new(MonitorScheduler::new(
        engine.clone(),
        config.monitor.check_interval,
    )?);
    scheduler.start().await;
    info!("Stock monitoring started");

    let state = AppState {
        health: Arc::new(RwLock::new(HealthStatus::default())),
        metrics: metrics.clone(),
        start_time: Arc::new(Instant::now()),
        engine,
        scheduler: scheduler.clone(),
    };
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!(port = config.port, "HTTP server listening on port {}", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down stock monitoring...");
    scheduler.stop().await;
    info!("Bursawatch stopped");

    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    info!("Shutdown signal received");
}
