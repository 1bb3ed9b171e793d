//! Configuration management for the stream manager
//!
//! Loads configuration from config.toml at startup.
//! Values are read once at construction; nothing is reloaded at runtime.

use crate::core::MarketType;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration
///
/// Loaded from config.toml at startup. Every section falls back to defaults
/// when omitted.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Streaming connection settings
    #[serde(default)]
    pub stream: StreamConfig,

    /// REST data source settings
    #[serde(default)]
    pub rest: RestConfig,

    /// Symbols the binary subscribes at startup
    #[serde(default = "default_subscriptions")]
    pub subscriptions: Vec<SubscriptionConfig>,
}

/// Upper bound for the keep-alive interval (one day)
pub const MAX_KEEPALIVE_INTERVAL_SECS: u64 = 86_400;

/// Streaming connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    /// First reconnect delay; attempt n waits base * 2^(n-1)
    #[serde(default = "default_base_reconnect_delay_ms")]
    pub base_reconnect_delay_ms: u64,

    /// Reconnect attempts before a subscription is abandoned
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Keep-alive ping interval while a connection is open
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,

    /// Timeout for the WebSocket handshake
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// How long unsubscribe/close wait for a graceful close before aborting
    #[serde(default = "default_close_timeout_ms")]
    pub close_timeout_ms: u64,

    /// Combined-stream endpoint for spot; the stream path is appended
    #[serde(default = "default_spot_endpoint")]
    pub spot_endpoint: String,

    /// Combined-stream endpoint for USD-M futures
    #[serde(default = "default_futures_endpoint")]
    pub futures_endpoint: String,
}

/// REST data source configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RestConfig {
    #[serde(default = "default_spot_base_url")]
    pub spot_base_url: String,

    #[serde(default = "default_futures_base_url")]
    pub futures_base_url: String,

    /// Per-request timeout
    #[serde(default = "default_rest_timeout_secs")]
    pub timeout_secs: u64,
}

/// Startup subscription entry
///
/// Stream names stay as strings so unsupported kinds are reported by
/// `subscribe` like any other caller input error.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionConfig {
    pub symbol: String,
    pub market: MarketType,
    pub streams: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            rest: RestConfig::default(),
            subscriptions: default_subscriptions(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            base_reconnect_delay_ms: default_base_reconnect_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            keepalive_interval_secs: default_keepalive_interval_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            close_timeout_ms: default_close_timeout_ms(),
            spot_endpoint: default_spot_endpoint(),
            futures_endpoint: default_futures_endpoint(),
        }
    }
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            spot_base_url: default_spot_base_url(),
            futures_base_url: default_futures_base_url(),
            timeout_secs: default_rest_timeout_secs(),
        }
    }
}

fn default_base_reconnect_delay_ms() -> u64 {
    5000
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_keepalive_interval_secs() -> u64 {
    180 // 3 minutes
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_close_timeout_ms() -> u64 {
    1000
}

fn default_spot_endpoint() -> String {
    "wss://stream.binance.com:9443/stream?streams=".to_string()
}

fn default_futures_endpoint() -> String {
    "wss://fstream.binance.com/stream?streams=".to_string()
}

fn default_spot_base_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_futures_base_url() -> String {
    "https://fapi.binance.com".to_string()
}

fn default_rest_timeout_secs() -> u64 {
    10
}

fn default_subscriptions() -> Vec<SubscriptionConfig> {
    vec![SubscriptionConfig {
        symbol: "BTCUSDT".to_string(),
        market: MarketType::Spot,
        streams: vec!["trade".to_string(), "bookTicker".to_string()],
    }]
}

impl StreamConfig {
    #[inline]
    pub fn base_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.base_reconnect_delay_ms)
    }

    #[inline]
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    #[inline]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[inline]
    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    /// Base combined-stream endpoint for a market
    pub fn endpoint(&self, market: MarketType) -> &str {
        match market {
            MarketType::Spot => &self.spot_endpoint,
            MarketType::Futures => &self.futures_endpoint,
        }
    }

    /// Reject values the connection tasks cannot run with
    ///
    /// # Errors
    /// `ConfigError::InvalidValue` naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_KEEPALIVE_INTERVAL_SECS).contains(&self.keepalive_interval_secs) {
            return Err(ConfigError::InvalidValue(format!(
                "stream.keepalive_interval_secs must be in 1..={}, got {}",
                MAX_KEEPALIVE_INTERVAL_SECS, self.keepalive_interval_secs
            )));
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "stream.connect_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl RestConfig {
    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from config.toml file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// # Errors
    /// Returns error if file exists but cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File not found - use defaults
                Ok(Config::default())
            }
            Err(e) => Err(ConfigError::IoError(e)),
        }
    }

    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.stream.validate()?;
        Ok(config)
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading file
    IoError(std::io::Error),
    /// Parse error (invalid TOML)
    ParseError(String),
    /// Well-formed but unusable value
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::ParseError(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::InvalidValue(e) => write!(f, "Invalid config value: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError(e) => Some(e),
            ConfigError::ParseError(_) | ConfigError::InvalidValue(_) => None,
        }
    }
}

impl From<ConfigError> for crate::StreamError {
    fn from(e: ConfigError) -> Self {
        crate::StreamError::Config(e.to_string())
    }
}
