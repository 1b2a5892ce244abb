//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::poller::PollSettings;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub dashboard: DashboardConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Dashboard polling and display configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_last_n")]
    pub last_n: usize,

    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_ms: u64,

    #[serde(default = "default_health_interval")]
    pub health_interval_ms: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_chart_width")]
    pub chart_width: usize,

    #[serde(default = "default_chart_height")]
    pub chart_height: usize,
}

fn default_address() -> String {
    "http://localhost:3000".to_string()
}

fn default_last_n() -> usize {
    100
}

fn default_refresh_interval() -> u64 {
    1000 // 1 second
}

fn default_health_interval() -> u64 {
    1000 // 1 second
}

fn default_request_timeout() -> u64 {
    5000
}

fn default_chart_width() -> usize {
    72
}

fn default_chart_height() -> usize {
    16
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            last_n: default_last_n(),
            refresh_interval_ms: default_refresh_interval(),
            health_interval_ms: default_health_interval(),
            request_timeout_ms: default_request_timeout(),
            chart_width: default_chart_width(),
            chart_height: default_chart_height(),
        }
    }
}

impl DashboardConfig {
    /// Poller timer settings derived from this config
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            address: self.address.clone(),
            refresh_interval: Duration::from_millis(self.refresh_interval_ms),
            health_interval: Duration::from_millis(self.health_interval_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Sensor server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_csv_path")]
    pub csv_path: String,

    /// Serve synthetic readings instead of the CSV file
    #[serde(default)]
    pub mock: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_csv_path() -> String {
    "values.csv".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            csv_path: default_csv_path(),
            mock: false,
        }
    }
}

impl ServerConfig {
    /// Get the server bind address
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("co2-dashboard").join("config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Load the given file if any, otherwise the default locations
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_with_env(path),
            None => Ok(Self::load_default()),
        }
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Dashboard overrides
        if let Some(address) = var("CO2_DASHBOARD_ADDRESS") {
            self.dashboard.address = address;
        }
        if let Some(Ok(n)) = var("CO2_DASHBOARD_LAST_N").map(|v| v.parse::<usize>()) {
            self.dashboard.last_n = n;
        }
        if let Some(Ok(ms)) = var("CO2_DASHBOARD_REFRESH_MS").map(|v| v.parse::<u64>()) {
            self.dashboard.refresh_interval_ms = ms;
        }
        if let Some(Ok(ms)) = var("CO2_DASHBOARD_HEALTH_MS").map(|v| v.parse::<u64>()) {
            self.dashboard.health_interval_ms = ms;
        }

        // Server overrides
        if let Some(Ok(port)) = var("CO2_SERVER_PORT").map(|v| v.parse::<u16>()) {
            self.server.port = port;
        }
        if let Some(path) = var("CO2_VALUES_CSV") {
            self.server.csv_path = path;
        }

        // Logging overrides
        if let Some(level) = var("CO2_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("CO2_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# CO2 Dashboard Configuration
#
# Environment variables override these settings:
# - CO2_DASHBOARD_ADDRESS
# - CO2_DASHBOARD_LAST_N
# - CO2_DASHBOARD_REFRESH_MS
# - CO2_DASHBOARD_HEALTH_MS
# - CO2_SERVER_PORT
# - CO2_VALUES_CSV
# - CO2_LOG_LEVEL
# - CO2_LOG_FORMAT

[dashboard]
# Sensor server base URL
address = "http://localhost:3000"

# Number of most recent readings to draw
last_n = 100

# How often to poll /data (ms)
refresh_interval_ms = 1000

# How often to poll /health (ms)
health_interval_ms = 1000

# Per-request timeout (ms)
request_timeout_ms = 5000

# Plot area size in characters
chart_width = 72
chart_height = 16

[server]
# Sensor server host
host = "0.0.0.0"

# Sensor server port
port = 3000

# CSV file with `timestamp,ppm` rows served on /data
csv_path = "values.csv"

# Serve synthetic readings instead of the CSV file
mock = false

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.dashboard.address, "http://localhost:3000");
        assert_eq!(config.dashboard.last_n, 100);
        assert_eq!(config.dashboard.refresh_interval_ms, 1000);
        assert_eq!(config.dashboard.health_interval_ms, 1000);
        assert_eq!(config.server.addr(), "0.0.0.0:3000");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_generated_config_parses_to_defaults() {
        let config = Config::parse(&generate_default_config()).unwrap();
        let defaults = Config::default();
        assert_eq!(config.dashboard.address, defaults.dashboard.address);
        assert_eq!(config.dashboard.last_n, defaults.dashboard.last_n);
        assert_eq!(config.server.port, defaults.server.port);
        assert_eq!(config.server.csv_path, defaults.server.csv_path);
    }

    #[test]
    fn test_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[dashboard]\naddress = \"http://pi.local:3000\"\nlast_n = 20").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.dashboard.address, "http://pi.local:3000");
        assert_eq!(config.dashboard.last_n, 20);
        assert_eq!(config.dashboard.refresh_interval_ms, 1000);
        assert!(!config.server.mock);
    }

    #[test]
    fn test_load_errors() {
        let err = Config::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[dashboard\nlast_n = ").unwrap();
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CO2_DASHBOARD_ADDRESS", "http://10.0.0.5:3000"),
            ("CO2_DASHBOARD_LAST_N", "25"),
            ("CO2_DASHBOARD_REFRESH_MS", "not-a-number"),
            ("CO2_SERVER_PORT", "8080"),
            ("CO2_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.dashboard.address, "http://10.0.0.5:3000");
        assert_eq!(config.dashboard.last_n, 25);
        // Unparseable values leave the setting alone
        assert_eq!(config.dashboard.refresh_interval_ms, 1000);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_poll_settings() {
        let settings = DashboardConfig::default().poll_settings();
        assert_eq!(settings, PollSettings::default());
    }
}
