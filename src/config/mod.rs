//! Typed configuration.
//!
//! [`Config`] comes from environment variables and is loaded once at
//! startup, failing fast on malformed values. [`EngineConfig`] holds the
//! engine's timing and threshold tunables, with defaults, optionally
//! overridden from a TOML file named by `ENGINE_CONFIG`.

pub mod engine;

pub use engine::EngineConfig;

use crate::error::{Error, Result};
use secrecy::SecretString;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_ANALYZER_URL: &str = "http://127.0.0.1:5000/ask";
pub const DEFAULT_CACHE_DIR: &str = ".verdict-cache";
const DEFAULT_ANALYZER_TIMEOUT_SECS: u64 = 30;

#[derive(Debug)]
pub struct Config {
    pub analyzer_url: String,
    pub analyzer_timeout: Duration,
    /// Directory for the file cache backend. Ignored when `database_url` is set.
    pub cache_dir: PathBuf,
    /// Postgres cache backend, if configured.
    pub database_url: Option<SecretString>,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    /// TOML file with [`EngineConfig`] overrides.
    pub engine_config: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let timeout_secs =
            parsed_var::<u64>("ANALYZER_TIMEOUT_SECS")?.unwrap_or(DEFAULT_ANALYZER_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(Error::Config(
                "ANALYZER_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            analyzer_url: std::env::var("ANALYZER_URL")
                .unwrap_or_else(|_| DEFAULT_ANALYZER_URL.to_string()),
            analyzer_timeout: Duration::from_secs(timeout_secs),
            cache_dir: std::env::var("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CACHE_DIR)),
            database_url: std::env::var("DATABASE_URL").ok().map(SecretString::from),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            engine_config: std::env::var("ENGINE_CONFIG").ok().map(PathBuf::from),
        })
    }

    /// Engine tunables: defaults, or the TOML file if one is configured.
    pub fn engine(&self) -> Result<EngineConfig> {
        match &self.engine_config {
            Some(path) => EngineConfig::load(path),
            None => Ok(EngineConfig::default()),
        }
    }
}

fn parsed_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid value for {name}: {e}"))),
        Err(_) => Ok(None),
    }
}
