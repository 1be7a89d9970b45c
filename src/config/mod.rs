//! Configuration loaded from environment variables and thresholds.json
//!
//! Environment variables follow the deployment's `.env` file (loaded with
//! dotenvy by the binary). Thresholds live in a JSON mapping of symbol to
//! `{up, down}` limits and can be updated at runtime through the registry.

use crate::error::WatchError;
use crate::models::threshold::{is_valid_symbol, ThresholdLimits};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::warn;

/// Deployment environment name, used to pick log formatting.
pub fn get_environment() -> String {
    env::var("ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Tunables for the monitoring cycle.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between periodic cycles.
    pub check_interval: Duration,
    /// Minimum time between two fired alerts for the same (symbol, direction).
    pub cooldown: chrono::Duration,
    /// Active history file size that triggers rotation.
    pub max_log_bytes: u64,
    /// Per-attempt cap on a price fetch.
    pub fetch_timeout: Duration,
    /// Directory holding history.csv, last_alerts.json and thresholds.json.
    pub data_dir: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(5 * 60),
            cooldown: chrono::Duration::hours(1),
            max_log_bytes: 10 * 1024 * 1024,
            fetch_timeout: Duration::from_secs(10),
            data_dir: PathBuf::from("data"),
        }
    }
}

impl MonitorConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            check_interval: Duration::from_secs(env_parse("CHECK_INTERVAL_MINUTES", 5u64) * 60),
            cooldown: chrono::Duration::hours(env_parse("ALERT_COOLDOWN_HOURS", 1i64)),
            max_log_bytes: env_parse("MAX_CSV_SIZE_MB", 10u64) * 1024 * 1024,
            fetch_timeout: Duration::from_secs(env_parse("FETCH_TIMEOUT_SECONDS", 10u64)),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
        }
    }
}

/// Mail gateway credentials. The alert address is used as both sender and
/// recipient, matching the original deployment.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: String,
    pub address: String,
}

impl EmailConfig {
    pub fn from_env() -> Self {
        Self {
            api_url: env::var("MAIL_API_URL").unwrap_or_default(),
            api_key: env::var("MAIL_API_KEY").unwrap_or_default(),
            address: env::var("EMAIL_ADDRESS").unwrap_or_default(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_url.is_empty() && !self.api_key.is_empty() && !self.address.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub api_url: String,
    pub bot_token: String,
    pub chat_id: String,
}

impl TelegramConfig {
    pub fn from_env() -> Self {
        Self {
            api_url: env::var("TELEGRAM_API_URL")
                .unwrap_or_else(|_| "https://api.telegram.org".to_string()),
            bot_token: env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
            chat_id: env::var("TELEGRAM_CHAT_ID").unwrap_or_default(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }
}

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub email: EmailConfig,
    pub telegram: TelegramConfig,
    pub price_api_url: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            monitor: MonitorConfig::from_env(),
            email: EmailConfig::from_env(),
            telegram: TelegramConfig::from_env(),
            price_api_url: env::var("PRICE_API_URL")
                .unwrap_or_else(|_| "https://query1.finance.yahoo.com".to_string()),
            port: env_parse("PORT", 8000u16),
        }
    }

    /// Aggregate configuration problems into a single error so operators see
    /// everything that needs fixing at once. At least one notification
    /// channel must be fully configured.
    pub fn validate(&self) -> Result<(), WatchError> {
        let mut errors = Vec::new();

        if !self.email.is_configured() && !self.telegram.is_configured() {
            errors.push(
                "no notification channel configured: set MAIL_API_URL/MAIL_API_KEY/EMAIL_ADDRESS \
                 and/or TELEGRAM_BOT_TOKEN/TELEGRAM_CHAT_ID"
                    .to_string(),
            );
        }
        if self.monitor.check_interval.is_zero() {
            errors.push("CHECK_INTERVAL_MINUTES must be > 0".to_string());
        }
        if self.monitor.max_log_bytes == 0 {
            errors.push("MAX_CSV_SIZE_MB must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(WatchError::Config(errors.join("; ")))
        }
    }

    pub fn thresholds_path(&self) -> PathBuf {
        self.monitor.data_dir.join("thresholds.json")
    }
}

/// Load the symbol → thresholds mapping from a JSON file.
///
/// Entries with an invalid symbol or an inverted threshold pair are dropped
/// with a warning; they must never reach the evaluator.
pub fn load_thresholds(path: &Path) -> Result<HashMap<String, ThresholdLimits>, WatchError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        WatchError::Config(format!("cannot read thresholds file {}: {}", path.display(), e))
    })?;
    let parsed: HashMap<String, ThresholdLimits> = serde_json::from_str(&raw)
        .map_err(|e| WatchError::Config(format!("invalid JSON in {}: {}", path.display(), e)))?;

    let mut thresholds = HashMap::new();
    for (symbol, limits) in parsed {
        if !is_valid_symbol(&symbol) {
            warn!(symbol = %symbol, "Dropping threshold entry with invalid symbol: {}", symbol);
            continue;
        }
        if let Err(e) = limits.validate() {
            warn!(symbol = %symbol, error = %e, "Dropping invalid threshold entry for {}: {}", symbol, e);
            continue;
        }
        thresholds.insert(symbol, limits);
    }
    Ok(thresholds)
}

/// Shared, runtime-mutable symbol configuration.
///
/// The monitor snapshots this at cycle start, so updates take effect on the
/// next cycle. Updates are validated here and are in-memory only; the
/// thresholds file is read once at startup.
pub struct ThresholdRegistry {
    inner: RwLock<HashMap<String, ThresholdLimits>>,
}

impl ThresholdRegistry {
    pub fn new(thresholds: HashMap<String, ThresholdLimits>) -> Self {
        Self {
            inner: RwLock::new(thresholds),
        }
    }

    pub async fn snapshot(&self) -> HashMap<String, ThresholdLimits> {
        self.inner.read().await.clone()
    }

    pub async fn get(&self, symbol: &str) -> Option<ThresholdLimits> {
        self.inner.read().await.get(symbol).copied()
    }

    /// Swap in a whole new mapping, e.g. after re-reading the thresholds
    /// file. Callers are expected to pass an already-validated map (such as
    /// the output of [`load_thresholds`]).
    pub async fn replace(&self, thresholds: HashMap<String, ThresholdLimits>) {
        *self.inner.write().await = thresholds;
    }

    pub async fn update(
        &self,
        symbol: &str,
        limits: ThresholdLimits,
    ) -> Result<(), WatchError> {
        if !is_valid_symbol(symbol) {
            return Err(WatchError::Config(format!(
                "invalid stock symbol format: {}",
                symbol
            )));
        }
        limits.validate()?;
        self.inner.write().await.insert(symbol.to_string(), limits);
        Ok(())
    }
}
