//! Runtime configuration: CLI flags for the per-run surface, environment
//! variables for operational knobs.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{Datelike, Local, NaiveDate};
use thiserror::Error;

use crate::cli::Cli;

pub const DEFAULT_BASE_URL: &str = "https://www.instagram.com";
const DEFAULT_DESTINATION_ROOT: &str = "photos";
const DEFAULT_WORKER_CONCURRENCY: usize = 10;
const DEFAULT_RETRY_BACKOFF_SECS: u64 = 5;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Feed endpoint root, overridable via `FEED_BASE_URL` (mock servers in
    /// tests, mirrors in deployments).
    pub base_url: String,
    /// Root directory holding one subdirectory per account.
    pub destination_root: PathBuf,
    /// CSV output path.
    pub output_path: PathBuf,
    /// Download worker pool width.
    pub worker_concurrency: usize,
    /// Fixed wait before the single download retry.
    pub retry_backoff: Duration,
    pub request_timeout: Duration,
    pub credentials: Option<Credentials>,
}

impl Config {
    /// Assemble configuration from parsed CLI arguments plus environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment override fails to parse.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: env_or_default("FEED_BASE_URL", DEFAULT_BASE_URL),
            destination_root: cli
                .destination
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DESTINATION_ROOT)),
            output_path: cli
                .output
                .clone()
                .unwrap_or_else(|| PathBuf::from(default_output_name(Local::now().date_naive()))),
            worker_concurrency: parse_env_usize("WORKER_CONCURRENCY", DEFAULT_WORKER_CONCURRENCY)?,
            retry_backoff: Duration::from_secs(parse_env_u64(
                "DOWNLOAD_RETRY_BACKOFF_SECS",
                DEFAULT_RETRY_BACKOFF_SECS,
            )?),
            request_timeout: Duration::from_secs(parse_env_u64(
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            credentials: cli.credentials(),
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                name: "WORKER_CONCURRENCY".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.base_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "FEED_BASE_URL".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if let Err(e) = url::Url::parse(&self.base_url) {
            return Err(ConfigError::InvalidValue {
                name: "FEED_BASE_URL".to_string(),
                message: format!("not a valid URL: {e}"),
            });
        }
        Ok(())
    }

    /// Baseline configuration for tests; override fields with struct update
    /// syntax.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            base_url: "http://127.0.0.1:0".to_string(),
            destination_root: PathBuf::from("./photos"),
            output_path: PathBuf::from("./results-test.csv"),
            worker_concurrency: 4,
            retry_backoff: Duration::from_millis(50),
            request_timeout: Duration::from_secs(10),
            credentials: None,
        }
    }
}

/// Default date-stamped results filename, `results-YYYY-M-D.csv` with no
/// zero padding on month or day.
#[must_use]
pub fn default_output_name(date: NaiveDate) -> String {
    format!(
        "results-{}-{}-{}.csv",
        date.year(),
        date.month(),
        date.day()
    )
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}
