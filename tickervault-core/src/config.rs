//! Application and fetch configuration.
//!
//! Stored as TOML, by default at `~/.tickervault.toml`:
//!
//! ```toml
//! data_dir = "/home/me/data/yfinance"
//! tickers = ["AAPL", "MSFT"]
//! period = "max"
//! interval = "1d"
//! log_level = "info"
//!
//! [fetch]
//! base_timeout = 30.0
//! max_retries = 5
//! batch_size = 50
//! daily_limit = 400
//! ```

use crate::data::provider::{VALID_INTERVALS, VALID_PERIODS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors from loading, editing or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("write config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("unknown config key '{0}'")]
    UnknownKey(String),

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Rate-limit and batching knobs for the fetch orchestrator.
///
/// Durations are written to TOML as seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Base wait after a rate-limit response; doubled per attempt.
    #[serde(with = "secs")]
    pub base_timeout: Duration,
    /// Attempts per remote call before giving up.
    pub max_retries: u32,
    /// Symbols per combined request.
    pub batch_size: usize,
    /// Symbols per daily quota chunk.
    pub daily_limit: usize,
    /// Pause between individual requests.
    #[serde(with = "secs")]
    pub request_delay: Duration,
    /// Pause after each combined request.
    #[serde(with = "secs")]
    pub batch_delay: Duration,
    /// Pause between daily chunks.
    #[serde(with = "secs")]
    pub day_delay: Duration,
    /// Stored prices older than this many days are refetched.
    pub max_cache_age_days: u32,
    /// Upper bound of the uniform jitter added to rate-limit backoff.
    #[serde(with = "secs")]
    pub jitter_max: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_timeout: Duration::from_secs(30),
            max_retries: 5,
            batch_size: 50,
            daily_limit: 400,
            request_delay: Duration::from_secs(2),
            batch_delay: Duration::from_secs(5),
            day_delay: Duration::from_secs(60),
            max_cache_age_days: 1,
            jitter_max: Duration::from_secs(5),
        }
    }
}

impl FetchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("fetch.max_retries", self.max_retries as usize),
            ("fetch.batch_size", self.batch_size),
            ("fetch.daily_limit", self.daily_limit),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.into(),
                    reason: "must be greater than zero".into(),
                });
            }
        }
        Ok(())
    }

    fn set(&mut self, field: &str, value: &str) -> Result<(), ConfigError> {
        let key = format!("fetch.{field}");
        match field {
            "base_timeout" => self.base_timeout = parse_secs(&key, value)?,
            "request_delay" => self.request_delay = parse_secs(&key, value)?,
            "batch_delay" => self.batch_delay = parse_secs(&key, value)?,
            "day_delay" => self.day_delay = parse_secs(&key, value)?,
            "jitter_max" => self.jitter_max = parse_secs(&key, value)?,
            "max_retries" => self.max_retries = parse_num(&key, value)?,
            "batch_size" => self.batch_size = parse_num(&key, value)?,
            "daily_limit" => self.daily_limit = parse_num(&key, value)?,
            "max_cache_age_days" => self.max_cache_age_days = parse_num(&key, value)?,
            _ => return Err(ConfigError::UnknownKey(key)),
        }
        self.validate()
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub tickers: Vec<String>,
    pub period: String,
    pub interval: String,
    pub log_level: String,
    pub fetch: FetchConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: home_dir().join("data").join("yfinance"),
            tickers: ["AAPL", "MSFT", "GOOGL", "AMZN", "META"]
                .into_iter()
                .map(String::from)
                .collect(),
            period: "max".into(),
            interval: "1d".into(),
            log_level: "info".into(),
            fetch: FetchConfig::default(),
        }
    }
}

impl AppConfig {
    /// `~/.tickervault.toml`
    pub fn default_path() -> PathBuf {
        home_dir().join(".tickervault.toml")
    }

    /// Parse a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load the config at `path`, writing the defaults there if it does not exist.
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            tracing::info!(path = %path.display(), "no config file found, wrote defaults");
            return Ok(config);
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        std::fs::write(path, self.to_toml()?).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_PERIODS.contains(&self.period.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "period".into(),
                reason: format!("expected one of {}", VALID_PERIODS.join(", ")),
            });
        }
        if !VALID_INTERVALS.contains(&self.interval.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "interval".into(),
                reason: format!("expected one of {}", VALID_INTERVALS.join(", ")),
            });
        }
        self.fetch.validate()
    }

    /// Set one key from its string form, e.g. `("fetch.batch_size", "25")`.
    ///
    /// `tickers` accepts a comma-separated list or a TOML array literal.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "data_dir" => self.data_dir = PathBuf::from(value),
            "tickers" => self.tickers = parse_list(value)?,
            "period" => self.period = value.to_string(),
            "interval" => self.interval = value.to_string(),
            "log_level" => self.log_level = value.to_ascii_lowercase(),
            _ => match key.strip_prefix("fetch.") {
                Some(field) => self.fetch.set(field, value)?,
                None => return Err(ConfigError::UnknownKey(key.to_string())),
            },
        }
        self.validate()
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn parse_secs(key: &str, value: &str) -> Result<Duration, ConfigError> {
    let secs: f64 = parse_num(key, value)?;
    Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::InvalidValue {
        key: key.into(),
        reason: e.to_string(),
    })
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.into(),
        reason: e.to_string(),
    })
}

fn parse_list(value: &str) -> Result<Vec<String>, ConfigError> {
    let trimmed = value.trim();
    if trimmed.starts_with('[') {
        #[derive(Deserialize)]
        struct Wrapper {
            v: Vec<String>,
        }
        let w: Wrapper = toml::from_str(&format!("v = {trimmed}"))?;
        return Ok(w.v);
    }
    Ok(trimmed
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect())
}

/// Serde adapter: `Duration` as fractional seconds.
mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
