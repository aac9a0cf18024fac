use crate::error::{AppError, Result};
use crate::exchanges::{self, ExchangeCredentials};
use crate::types::{ExchangeId, TradeMode};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Settlement polling bounds for the live executor.
#[derive(Debug, Clone, Deserialize)]
pub struct SettlementConfig {
    /// Maximum time to wait for a bought asset to become free (seconds).
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
    /// Interval between balance polls (seconds).
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_max_wait_secs() -> u64 {
    15
}

fn default_poll_interval_secs() -> u64 {
    1
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            max_wait_secs: default_max_wait_secs(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl SettlementConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Background scanner cadence.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// Balance scan interval (seconds). Default 5 minutes.
    #[serde(default = "default_balance_interval_secs")]
    pub balance_interval_secs: u64,
    /// Listings scan interval (seconds). Default 4 hours.
    #[serde(default = "default_listings_interval_secs")]
    pub listings_interval_secs: u64,
}

fn default_balance_interval_secs() -> u64 {
    5 * 60
}

fn default_listings_interval_secs() -> u64 {
    4 * 60 * 60
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            balance_interval_secs: default_balance_interval_secs(),
            listings_interval_secs: default_listings_interval_secs(),
        }
    }
}

impl ScanConfig {
    pub fn balance_interval(&self) -> Duration {
        Duration::from_secs(self.balance_interval_secs)
    }

    pub fn listings_interval(&self) -> Duration {
        Duration::from_secs(self.listings_interval_secs)
    }
}

/// Application configuration: trading parameters from `config.json`,
/// credentials from the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mode: TradeMode,
    pub trade_amount_usdt: f64,
    pub profit_margin_percent: f64,
    pub cooldown_period_hours: i64,
    /// Ranked preference used to break ties among eligible exchanges.
    pub exchange_priority: Vec<ExchangeId>,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub settlement: SettlementConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    /// Per-venue API credentials, loaded from the environment.
    #[serde(skip)]
    pub credentials: HashMap<ExchangeId, ExchangeCredentials>,
    /// Telegram bot token, loaded from the environment.
    #[serde(skip)]
    pub telegram_token: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Config {
    /// Load and validate the full configuration. Fails fast on a missing or
    /// malformed file, a missing bot token, or inconsistent trade settings.
    pub fn load(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("could not read {}: {}", path, e)))?;
        let mut config: Config = serde_json::from_str(&raw)
            .map_err(|e| AppError::Config(format!("could not parse {}: {}", path, e)))?;

        config.telegram_token = env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| AppError::Config("TELEGRAM_BOT_TOKEN not set".to_string()))?;
        config.credentials = exchanges::credentials_from_env();

        config.validate()?;
        Ok(config)
    }

    /// Check the enumerated settings once at startup instead of per request.
    pub fn validate(&self) -> Result<()> {
        if self.trade_amount_usdt <= 0.0 {
            return Err(AppError::Config(format!(
                "trade_amount_usdt must be positive, got {}",
                self.trade_amount_usdt
            )));
        }
        if self.profit_margin_percent < 0.0 {
            return Err(AppError::Config(format!(
                "profit_margin_percent must not be negative, got {}",
                self.profit_margin_percent
            )));
        }
        if self.cooldown_period_hours < 0 {
            return Err(AppError::Config(format!(
                "cooldown_period_hours must not be negative, got {}",
                self.cooldown_period_hours
            )));
        }
        if self.exchange_priority.is_empty() {
            return Err(AppError::Config(
                "exchange_priority must list at least one exchange".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for exchange in &self.exchange_priority {
            if !seen.insert(exchange) {
                return Err(AppError::Config(format!(
                    "exchange_priority lists {} more than once",
                    exchange
                )));
            }
        }
        if self.settlement.poll_interval_secs == 0 {
            return Err(AppError::Config(
                "settlement.poll_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.mode == TradeMode::Live
            && !self
                .exchange_priority
                .iter()
                .any(|exchange| self.credentials.contains_key(exchange))
        {
            return Err(AppError::Config(
                "live mode requires credentials for at least one priority exchange".to_string(),
            ));
        }
        Ok(())
    }

    /// Cooldown window as a chrono duration.
    pub fn cooldown_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.cooldown_period_hours)
    }
}
