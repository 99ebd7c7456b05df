//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching config.toml structure.
//! Decimal values are written as strings to keep them exact.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::domain::{FuturesTiers, SpotTiers};

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub telegram: TelegramSection,
    pub bybit: BybitSection,
    #[serde(default)]
    pub market_cap: MarketCapSection,
    pub trading: TradingSection,
    pub futures: FuturesSection,
    pub spot: SpotSection,
    #[serde(default)]
    pub supervisor: SupervisorSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Telegram announcement source
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramSection {
    /// Bot token; falls back to TELEGRAM_BOT_TOKEN
    #[serde(default)]
    pub bot_token: Option<String>,
    /// Channel ids whose posts are traded; everything else is ignored
    pub channels: Vec<i64>,
    /// Long-poll timeout for getUpdates
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u32,
}

/// Bybit v5 REST API
#[derive(Debug, Clone, Deserialize)]
pub struct BybitSection {
    #[serde(default = "default_bybit_url")]
    pub api_url: String,
    /// Falls back to BYBIT_API_KEY
    #[serde(default)]
    pub api_key: Option<String>,
    /// Falls back to BYBIT_API_SECRET
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default = "default_recv_window_ms")]
    pub recv_window_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Account type queried for balances
    #[serde(default = "default_account_type")]
    pub account_type: String,
}

/// Market capitalization providers
#[derive(Debug, Clone, Deserialize)]
pub struct MarketCapSection {
    #[serde(default = "default_cmc_url")]
    pub cmc_api_url: String,
    /// Falls back to CMC_API_KEY; primary provider is skipped without a key
    #[serde(default)]
    pub cmc_api_key: Option<String>,
    #[serde(default = "default_coingecko_url")]
    pub coingecko_api_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for MarketCapSection {
    fn default() -> Self {
        Self {
            cmc_api_url: default_cmc_url(),
            cmc_api_key: None,
            coingecko_api_url: default_coingecko_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Buy budget, cooldown and timing
#[derive(Debug, Clone, Deserialize)]
pub struct TradingSection {
    /// Quote amount spent per message, split evenly across its tickers
    pub initial_target: Decimal,
    /// Quote asset of every traded pair
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,
    /// Minimum seconds between two buys of one instrument
    pub cooldown_seconds: u64,
    /// Wait after a confirmed buy before reading the wallet
    #[serde(default = "default_settlement_delay_ms")]
    pub settlement_delay_ms: u64,
    /// Wait after pricing before placing the take-profit order
    #[serde(default = "default_order_delay_ms")]
    pub order_delay_ms: u64,
    /// Candle lookback window ending `kline_end_offset_secs` before now
    #[serde(default = "default_kline_window_secs")]
    pub kline_window_secs: u64,
    /// Gap before now, so the still-forming candle is left out
    #[serde(default = "default_kline_end_offset_secs")]
    pub kline_end_offset_secs: u64,
    #[serde(default = "default_kline_interval")]
    pub kline_interval: String,
    #[serde(default = "default_kline_limit")]
    pub kline_limit: u32,
}

impl TradingSection {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }

    pub fn settlement_delay(&self) -> Duration {
        Duration::from_millis(self.settlement_delay_ms)
    }

    pub fn order_delay(&self) -> Duration {
        Duration::from_millis(self.order_delay_ms)
    }
}

/// Futures-launch tier table
#[derive(Debug, Clone, Deserialize)]
pub struct FuturesSection {
    pub base_multiplier: Decimal,
    pub increase: Decimal,
    pub decrease: Decimal,
    /// Below this: no take-profit order at all
    pub ultralow_cap: Decimal,
    /// Between ultralow and this: multiplier increased
    pub low_cap: Decimal,
    /// Between this and max: multiplier decreased
    pub mid_cap: Decimal,
    /// At or above this: market sell immediately
    pub max_cap: Decimal,
}

impl From<&FuturesSection> for FuturesTiers {
    fn from(s: &FuturesSection) -> Self {
        FuturesTiers {
            base_multiplier: s.base_multiplier,
            increase: s.increase,
            decrease: s.decrease,
            ultralow_cap: s.ultralow_cap,
            low_cap: s.low_cap,
            mid_cap: s.mid_cap,
            max_cap: s.max_cap,
        }
    }
}

/// Spot-listing tier table
#[derive(Debug, Clone, Deserialize)]
pub struct SpotSection {
    pub base_multiplier: Decimal,
    pub increase: Decimal,
    pub decrease: Decimal,
    /// At or below this: multiplier increased
    pub low_threshold: Decimal,
    /// At or above this: multiplier decreased
    pub high_threshold: Decimal,
}

impl From<&SpotSection> for SpotTiers {
    fn from(s: &SpotSection) -> Self {
        SpotTiers {
            base_multiplier: s.base_multiplier,
            increase: s.increase,
            decrease: s.decrease,
            low_threshold: s.low_threshold,
            high_threshold: s.high_threshold,
        }
    }
}

/// Ingestion loop supervision
#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorSection {
    #[serde(default = "default_restart_delay_secs")]
    pub restart_delay_secs: u64,
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            restart_delay_secs: default_restart_delay_secs(),
        }
    }
}

impl SupervisorSection {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay_secs)
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_poll_timeout_secs() -> u32 {
    30
}

fn default_bybit_url() -> String {
    "https://api.bybit.com".to_string()
}

fn default_recv_window_ms() -> u64 {
    5000
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_account_type() -> String {
    "UNIFIED".to_string()
}

fn default_cmc_url() -> String {
    "https://pro-api.coinmarketcap.com".to_string()
}

fn default_coingecko_url() -> String {
    "https://api.coingecko.com".to_string()
}

fn default_quote_asset() -> String {
    "USDT".to_string()
}

fn default_settlement_delay_ms() -> u64 {
    5000
}

fn default_order_delay_ms() -> u64 {
    2000
}

fn default_kline_window_secs() -> u64 {
    180
}

fn default_kline_end_offset_secs() -> u64 {
    30
}

fn default_kline_interval() -> String {
    "1".to_string()
}

fn default_kline_limit() -> u32 {
    100
}

fn default_restart_delay_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Missing secret: set {0} in the config file or environment")]
    MissingSecret(&'static str),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Telegram
        if self.telegram.channels.is_empty() {
            return Err(ConfigError::ValidationError(
                "telegram.channels cannot be empty".to_string(),
            ));
        }

        // Trading
        if self.trading.initial_target <= Decimal::ZERO {
            return Err(ConfigError::ValidationError(format!(
                "initial_target must be > 0, got {}",
                self.trading.initial_target
            )));
        }

        if self.trading.quote_asset.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "quote_asset cannot be empty".to_string(),
            ));
        }

        if self.trading.kline_end_offset_secs >= self.trading.kline_window_secs {
            return Err(ConfigError::ValidationError(format!(
                "kline_end_offset_secs ({}) must be smaller than kline_window_secs ({})",
                self.trading.kline_end_offset_secs, self.trading.kline_window_secs
            )));
        }

        if self.trading.kline_limit == 0 {
            return Err(ConfigError::ValidationError(
                "kline_limit must be > 0".to_string(),
            ));
        }

        // Futures tiers
        let f = &self.futures;
        if !(f.ultralow_cap < f.low_cap && f.low_cap <= f.mid_cap && f.mid_cap < f.max_cap) {
            return Err(ConfigError::ValidationError(format!(
                "futures caps must satisfy ultralow < low <= mid < max, got {} / {} / {} / {}",
                f.ultralow_cap, f.low_cap, f.mid_cap, f.max_cap
            )));
        }
        validate_multiplier("futures", f.base_multiplier, f.increase, f.decrease)?;

        // Spot tiers
        let s = &self.spot;
        if s.low_threshold >= s.high_threshold {
            return Err(ConfigError::ValidationError(format!(
                "spot low_threshold ({}) must be below high_threshold ({})",
                s.low_threshold, s.high_threshold
            )));
        }
        validate_multiplier("spot", s.base_multiplier, s.increase, s.decrease)?;

        // Bybit
        if self.bybit.api_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "bybit.api_url cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn validate_multiplier(
    table: &str,
    base: Decimal,
    increase: Decimal,
    decrease: Decimal,
) -> Result<(), ConfigError> {
    if base <= Decimal::ZERO {
        return Err(ConfigError::ValidationError(format!(
            "{} base_multiplier must be > 0, got {}",
            table, base
        )));
    }
    if increase < Decimal::ZERO || decrease < Decimal::ZERO {
        return Err(ConfigError::ValidationError(format!(
            "{} increase/decrease must be >= 0, got {} / {}",
            table, increase, decrease
        )));
    }
    if base - decrease <= Decimal::ZERO {
        return Err(ConfigError::ValidationError(format!(
            "{} decrease {} would make the multiplier non-positive",
            table, decrease
        )));
    }
    Ok(())
}

/// Config value if set and non-empty, otherwise the environment variable
fn secret(value: &Option<String>, env_var: &'static str) -> Option<String> {
    if let Some(ref v) = value {
        if !v.is_empty() {
            return Some(v.clone());
        }
    }
    std::env::var(env_var).ok().filter(|v| !v.is_empty())
}

impl TelegramSection {
    pub fn get_bot_token(&self) -> Result<String, ConfigError> {
        secret(&self.bot_token, "TELEGRAM_BOT_TOKEN")
            .ok_or(ConfigError::MissingSecret("TELEGRAM_BOT_TOKEN"))
    }
}

impl BybitSection {
    pub fn get_api_key(&self) -> Result<String, ConfigError> {
        secret(&self.api_key, "BYBIT_API_KEY").ok_or(ConfigError::MissingSecret("BYBIT_API_KEY"))
    }

    pub fn get_api_secret(&self) -> Result<String, ConfigError> {
        secret(&self.api_secret, "BYBIT_API_SECRET")
            .ok_or(ConfigError::MissingSecret("BYBIT_API_SECRET"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl MarketCapSection {
    /// CoinMarketCap key, `None` disables the primary provider
    pub fn get_cmc_api_key(&self) -> Option<String> {
        secret(&self.cmc_api_key, "CMC_API_KEY")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VALID_CONFIG: &str = r#"
[telegram]
channels = [-1001124574831]

[bybit]
api_url = "https://api.bybit.com"

[market_cap]
cmc_api_key = "cmc-test"

[trading]
initial_target = "600"
quote_asset = "USDT"
cooldown_seconds = 60

[futures]
base_multiplier = "1.45"
increase = "0.3"
decrease = "0.2"
ultralow_cap = "100000000"
low_cap = "150000000"
mid_cap = "180000000"
max_cap = "250000000"

[spot]
base_multiplier = "3"
increase = "4"
decrease = "1.5"
low_threshold = "150000000"
high_threshold = "500000000"

[supervisor]
restart_delay_secs = 30

[logging]
level = "info"
"#;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let file = write_config(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.telegram.channels, vec![-1001124574831]);
        assert_eq!(config.trading.initial_target, dec!(600));
        assert_eq!(config.trading.cooldown(), Duration::from_secs(60));
        assert_eq!(config.futures.base_multiplier, dec!(1.45));
        assert_eq!(config.spot.high_threshold, dec!(500000000));
        assert_eq!(config.supervisor.restart_delay(), Duration::from_secs(30));
    }

    #[test]
    fn test_defaults_applied() {
        let file = write_config(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.bybit.account_type, "UNIFIED");
        assert_eq!(config.bybit.recv_window_ms, 5000);
        assert_eq!(config.trading.settlement_delay(), Duration::from_secs(5));
        assert_eq!(config.trading.order_delay(), Duration::from_secs(2));
        assert_eq!(config.trading.kline_window_secs, 180);
        assert_eq!(config.trading.kline_end_offset_secs, 30);
        assert_eq!(config.trading.kline_interval, "1");
        assert_eq!(config.trading.kline_limit, 100);
        assert_eq!(config.market_cap.coingecko_api_url, "https://api.coingecko.com");
    }

    #[test]
    fn test_optional_sections() {
        let trimmed: String = VALID_CONFIG
            .split("[supervisor]")
            .next()
            .unwrap()
            .replace("[market_cap]\ncmc_api_key = \"cmc-test\"\n", "");
        let file = write_config(&trimmed);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.supervisor.restart_delay_secs, 30);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.market_cap.cmc_api_url, "https://pro-api.coinmarketcap.com");
    }

    #[test]
    fn test_tier_conversion() {
        let file = write_config(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();

        let futures = FuturesTiers::from(&config.futures);
        assert_eq!(futures.ultralow_cap, dec!(100000000));
        assert_eq!(futures.increase, dec!(0.3));

        let spot = SpotTiers::from(&config.spot);
        assert_eq!(spot.increase, dec!(4));
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/path/config.toml");
        assert!(matches!(result.unwrap_err(), ConfigError::IoError(_)));
    }

    #[test]
    fn test_invalid_toml() {
        let file = write_config("[telegram\nchannels = ");
        assert!(matches!(
            load_config(file.path()).unwrap_err(),
            ConfigError::ParseError(_)
        ));
    }

    #[test]
    fn test_empty_channels_rejected() {
        let file = write_config(&VALID_CONFIG.replace("[-1001124574831]", "[]"));
        assert!(matches!(
            load_config(file.path()).unwrap_err(),
            ConfigError::ValidationError(_)
        ));
    }

    #[test]
    fn test_unordered_futures_caps_rejected() {
        let file = write_config(
            &VALID_CONFIG.replace("mid_cap = \"180000000\"", "mid_cap = \"120000000\""),
        );
        assert!(matches!(
            load_config(file.path()).unwrap_err(),
            ConfigError::ValidationError(_)
        ));
    }

    #[test]
    fn test_non_positive_spot_multiplier_rejected() {
        let file = write_config(&VALID_CONFIG.replace("decrease = \"1.5\"", "decrease = \"3\""));
        assert!(matches!(
            load_config(file.path()).unwrap_err(),
            ConfigError::ValidationError(_)
        ));
    }

    #[test]
    fn test_zero_budget_rejected() {
        let file = write_config(&VALID_CONFIG.replace("initial_target = \"600\"", "initial_target = \"0\""));
        assert!(matches!(
            load_config(file.path()).unwrap_err(),
            ConfigError::ValidationError(_)
        ));
    }

    #[test]
    fn test_config_secret_wins_over_env() {
        let file = write_config(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.market_cap.get_cmc_api_key(), Some("cmc-test".to_string()));
    }
}
