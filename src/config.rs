use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, Result};

pub const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart/";

/// Sent on every vendor request.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Body of `GET /`.
pub const SERVICE_BANNER: &str = "Market Data Service is running!";

/// How long in-flight requests get to finish after a shutdown signal.
pub const SHUTDOWN_GRACE_SECS: u64 = 10;

/// Directories searched, in order, for `config.yaml` / `config.yml`.
const CONFIG_DIRS: &[&str] = &["./config", "."];
const CONFIG_NAMES: &[&str] = &["config.yaml", "config.yml"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub migrations: MigrationsConfig,
    pub yahoo_finance: YahooFinanceConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub sslmode: String,
    pub max_connections: u32,
    pub connection_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            dbname: "market_data".to_string(),
            sslmode: "disable".to_string(),
            max_connections: 10,
            connection_timeout_seconds: 10,
        }
    }
}

impl DatabaseConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Console,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Stdout,
    Stderr,
    File,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of debug, info, warn, error.
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Only read when `output` is `file`.
    pub file_path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            output: LogOutput::Stdout,
            file_path: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MigrationsConfig {
    pub enabled: bool,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct YahooFinanceConfig {
    pub base_url: String,
    /// Per-attempt HTTP timeout, seconds.
    pub request_timeout: u64,
    /// Retries after the first attempt.
    pub retry_count: u32,
    pub retry_wait_time_ms: u64,
    /// Seeded by the auto-updater when not yet persisted.
    pub default_symbols: Vec<String>,
    pub update_interval_minutes: u64,
    pub enable_auto_update: bool,
    /// Upper bound on concurrent ingests within one auto-update pass.
    pub max_concurrent_ingests: usize,
}

impl Default for YahooFinanceConfig {
    fn default() -> Self {
        Self {
            base_url: YAHOO_CHART_URL.to_string(),
            request_timeout: 10,
            retry_count: 3,
            retry_wait_time_ms: 500,
            default_symbols: vec!["AAPL".to_string(), "MSFT".to_string(), "GOOG".to_string()],
            update_interval_minutes: 15,
            enable_auto_update: true,
            max_concurrent_ingests: 4,
        }
    }
}

impl YahooFinanceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn retry_wait(&self) -> Duration {
        Duration::from_millis(self.retry_wait_time_ms)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_minutes * 60)
    }
}

impl Config {
    /// Load from the first config file found, then apply environment overrides.
    /// A missing file falls back to defaults; an unreadable or malformed one is fatal.
    pub fn load() -> Result<Self> {
        let mut cfg = match find_config_file() {
            Some(path) => Self::from_file(&path)?,
            None => {
                eprintln!("Warning: no config.yaml found in ./config or ., using defaults");
                Self::default()
            }
        };
        cfg.apply_env(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&raw)
            .map_err(|e| AppError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Overlay environment variables. `lookup` is injected so tests never touch
    /// the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PORT") {
            self.server.port = parse_env("PORT", &v)?;
        }
        if let Some(v) = lookup("HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("DATABASE_HOST") {
            self.database.host = v;
        }
        if let Some(v) = lookup("DATABASE_PORT") {
            self.database.port = parse_env("DATABASE_PORT", &v)?;
        }
        if let Some(v) = lookup("DATABASE_USER") {
            self.database.user = v;
        }
        if let Some(v) = lookup("DATABASE_PASSWORD") {
            self.database.password = v;
        }
        if let Some(v) = lookup("DATABASE_NAME") {
            self.database.dbname = v;
        }
        if let Some(v) = lookup("DATABASE_SSLMODE") {
            self.database.sslmode = v;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = lookup("LOG_FORMAT") {
            self.logging.format = match v.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "console" => LogFormat::Console,
                other => {
                    return Err(AppError::Config(format!(
                        "LOG_FORMAT must be json or console, got {other:?}"
                    )))
                }
            };
        }
        if let Some(v) = lookup("MIGRATIONS_ENABLED") {
            self.migrations.enabled = parse_env("MIGRATIONS_ENABLED", &v)?;
        }
        if let Some(v) = lookup("YAHOO_BASE_URL") {
            self.yahoo_finance.base_url = v;
        }
        if let Some(v) = lookup("ENABLE_AUTO_UPDATE") {
            self.yahoo_finance.enable_auto_update = parse_env("ENABLE_AUTO_UPDATE", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(self.logging.level.as_str(), "debug" | "info" | "warn" | "error") {
            return Err(AppError::Config(format!(
                "logging.level must be one of debug, info, warn, error (got {:?})",
                self.logging.level
            )));
        }
        if self.logging.output == LogOutput::File && self.logging.file_path.trim().is_empty() {
            return Err(AppError::Config(
                "logging.file_path is required when logging.output is file".to_string(),
            ));
        }
        reqwest::Url::parse(&self.yahoo_finance.base_url).map_err(|e| {
            AppError::Config(format!(
                "yahoo_finance.base_url {:?} is not a valid URL: {e}",
                self.yahoo_finance.base_url
            ))
        })?;
        if self.yahoo_finance.update_interval_minutes == 0 && self.yahoo_finance.enable_auto_update {
            return Err(AppError::Config(
                "yahoo_finance.update_interval_minutes must be positive when auto update is enabled"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

fn find_config_file() -> Option<PathBuf> {
    CONFIG_DIRS
        .iter()
        .flat_map(|dir| CONFIG_NAMES.iter().map(move |name| Path::new(dir).join(name)))
        .find(|p| p.is_file())
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| AppError::Config(format!("{key} has an invalid value: {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = Config::from_yaml_str("").unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.yahoo_finance.retry_count, 3);
        assert_eq!(cfg.yahoo_finance.default_symbols, vec!["AAPL", "MSFT", "GOOG"]);
        assert!(cfg.migrations.enabled);
        assert_eq!(cfg.logging.format, LogFormat::Json);
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let raw = r#"
server:
  port: 9090
database:
  host: tsdb
  max_connections: 3
logging:
  level: debug
  format: console
yahoo_finance:
  retry_count: 1
  retry_wait_time_ms: 20
  default_symbols: [IBM]
"#;
        let cfg = Config::from_yaml_str(raw).unwrap();
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.database.host, "tsdb");
        assert_eq!(cfg.database.port, 5432);
        assert_eq!(cfg.database.max_connections, 3);
        assert_eq!(cfg.logging.format, LogFormat::Console);
        assert_eq!(cfg.yahoo_finance.retry_wait(), Duration::from_millis(20));
        assert_eq!(cfg.yahoo_finance.default_symbols, vec!["IBM"]);
        assert_eq!(cfg.yahoo_finance.base_url, YAHOO_CHART_URL);
    }

    #[test]
    fn malformed_yaml_is_config_error() {
        let err = Config::from_yaml_str("server: [not, a, map").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn port_env_overrides_file() {
        let mut cfg = Config::from_yaml_str("server:\n  port: 9090\n").unwrap();
        cfg.apply_env(env(&[("PORT", "7000"), ("DATABASE_NAME", "prices")]))
            .unwrap();
        assert_eq!(cfg.server.port, 7000);
        assert_eq!(cfg.database.dbname, "prices");
    }

    #[test]
    fn bad_env_value_is_rejected() {
        let mut cfg = Config::default();
        let err = cfg.apply_env(env(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        let err = cfg
            .apply_env(env(&[("MIGRATIONS_ENABLED", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn validate_rejects_unknown_level_and_missing_file_path() {
        let mut cfg = Config::default();
        cfg.logging.level = "trace".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.logging.output = LogOutput::File;
        assert!(cfg.validate().is_err());
        cfg.logging.file_path = "/tmp/market-data.log".to_string();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_relative_base_url() {
        let mut cfg = Config::default();
        cfg.yahoo_finance.base_url = "query1.finance.yahoo.com/chart".to_string();
        assert!(matches!(cfg.validate(), Err(AppError::Config(_))));
    }
}
