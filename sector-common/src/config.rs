//! Configuration management for the sector hunter.
//!
//! The service reads a single JSON file at `~/.sector-hunter/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (SECTOR_HUNTER_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `SECTOR_HUNTER_HOST` → server.host
//! - `SECTOR_HUNTER_PORT` → server.port
//! - `SECTOR_HUNTER_LOG_LEVEL` → observability.log_level
//! - `SECTOR_HUNTER_LOG_FORMAT` → observability.log_format
//! - `SECTOR_HUNTER_TOP_N` → screener.top_n
//! - `SECTOR_HUNTER_CAP_LIMIT_YI` → screener.cap_limit_yi

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".sector-hunter"),
        |dirs| dirs.home_dir().join(".sector-hunter"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Screening thresholds and refresh defaults
    #[serde(default)]
    pub screener: ScreenerConfig,

    /// Upstream market data source settings
    #[serde(default)]
    pub source: SourceConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides applied.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Values that fail to parse are ignored and the file value is kept.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("SECTOR_HUNTER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("SECTOR_HUNTER_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(level) = lookup("SECTOR_HUNTER_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("SECTOR_HUNTER_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Some(top_n) = lookup("SECTOR_HUNTER_TOP_N").and_then(|v| v.parse().ok()) {
            self.screener.top_n = top_n;
        }
        if let Some(cap) = lookup("SECTOR_HUNTER_CAP_LIMIT_YI").and_then(|v| v.parse().ok()) {
            self.screener.cap_limit_yi = cap;
        }
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<()> {
        let dir = config_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        }

        self.save_to(&config_path())
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Address the HTTP server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

// ============================================================================
// Server Configuration
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host. Default is `127.0.0.1` (local only).
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4480
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets pinned to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

// ============================================================================
// Screener Configuration
// ============================================================================

/// Thresholds for cohort classification and refresh defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenerConfig {
    /// Number of top-ranked sectors analysed per refresh
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Laggard market cap ceiling, in units of 100 million (亿)
    #[serde(default = "default_cap_limit_yi")]
    pub cap_limit_yi: f64,

    /// Signals applied when a request does not choose any
    #[serde(default = "default_signals")]
    pub default_signals: Vec<String>,

    /// Maximum in-flight constituent requests
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Leaders: minimum change percentage
    #[serde(default = "default_leader_min_change_pct")]
    pub leader_min_change_pct: f64,

    /// Leaders: names containing this marker are excluded
    #[serde(default = "default_risk_flag")]
    pub risk_flag: String,

    /// Laggards: maximum change percentage (minimum is always 0)
    #[serde(default = "default_laggard_max_change_pct")]
    pub laggard_max_change_pct: f64,

    /// Laggards: turnover rate must exceed this
    #[serde(default = "default_laggard_min_turnover")]
    pub laggard_min_turnover: f64,

    /// Amplitude cohort: minimum intraday amplitude
    #[serde(default = "default_amplitude_min")]
    pub amplitude_min: f64,

    /// Amplitude cohort: turnover rate must exceed this
    #[serde(default = "default_amplitude_min_turnover")]
    pub amplitude_min_turnover: f64,

    /// Size of the market-wide hot stock list
    #[serde(default = "default_hot_stock_count")]
    pub hot_stock_count: usize,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            cap_limit_yi: default_cap_limit_yi(),
            default_signals: default_signals(),
            max_concurrency: default_max_concurrency(),
            leader_min_change_pct: default_leader_min_change_pct(),
            risk_flag: default_risk_flag(),
            laggard_max_change_pct: default_laggard_max_change_pct(),
            laggard_min_turnover: default_laggard_min_turnover(),
            amplitude_min: default_amplitude_min(),
            amplitude_min_turnover: default_amplitude_min_turnover(),
            hot_stock_count: default_hot_stock_count(),
        }
    }
}

fn default_top_n() -> usize {
    9
}

fn default_cap_limit_yi() -> f64 {
    200.0
}

fn default_signals() -> Vec<String> {
    vec!["vol_ratio".to_string()]
}

fn default_max_concurrency() -> usize {
    10
}

fn default_leader_min_change_pct() -> f64 {
    9.0
}

fn default_risk_flag() -> String {
    "ST".to_string()
}

fn default_laggard_max_change_pct() -> f64 {
    4.0
}

fn default_laggard_min_turnover() -> f64 {
    3.0
}

fn default_amplitude_min() -> f64 {
    6.0
}

fn default_amplitude_min_turnover() -> f64 {
    10.0
}

fn default_hot_stock_count() -> usize {
    10
}

// ============================================================================
// Source Configuration
// ============================================================================

/// Upstream data source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Provider name (currently only "eastmoney")
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Request budget shared by all upstream calls
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Cache TTL for the sector ranking
    #[serde(default = "default_ranking_ttl_secs")]
    pub ranking_ttl_secs: i64,

    /// Cache TTL for the market snapshot
    #[serde(default = "default_snapshot_ttl_secs")]
    pub snapshot_ttl_secs: i64,

    /// Cache TTL for sector constituents
    #[serde(default = "default_constituents_ttl_secs")]
    pub constituents_ttl_secs: i64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            requests_per_minute: default_requests_per_minute(),
            timeout_secs: default_timeout_secs(),
            ranking_ttl_secs: default_ranking_ttl_secs(),
            snapshot_ttl_secs: default_snapshot_ttl_secs(),
            constituents_ttl_secs: default_constituents_ttl_secs(),
        }
    }
}

fn default_provider() -> String {
    "eastmoney".to_string()
}

fn default_requests_per_minute() -> u32 {
    600
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_ranking_ttl_secs() -> i64 {
    300
}

fn default_snapshot_ttl_secs() -> i64 {
    60
}

fn default_constituents_ttl_secs() -> i64 {
    60
}

// ============================================================================
// Tests
// ============================================================================
