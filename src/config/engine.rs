//! Engine tunables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Timing and threshold knobs. Any field missing from a TOML file keeps its
/// default.
///
/// ```toml
/// debounce_ms = 250
/// tick_interval_ms = 10000
/// min_content_chars = 20
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Cache entries older than this are invalid.
    pub cache_ttl_ms: u64,
    /// Period of the expiry sweep.
    pub eviction_interval_ms: u64,
    /// Delay before the startup cycle.
    pub warmup_ms: u64,
    /// Quiet period a mutation burst must settle for before a cycle runs.
    pub debounce_ms: u64,
    /// Period of the unconditional rescan.
    pub tick_interval_ms: u64,
    /// Candidates need strictly more extracted characters than this.
    pub min_content_chars: usize,
    /// How much normalized content feeds an item identity fingerprint.
    pub identity_prefix_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl_ms: 24 * 60 * 60 * 1000,
            eviction_interval_ms: 60 * 60 * 1000,
            warmup_ms: 1000,
            debounce_ms: 500,
            tick_interval_ms: 30_000,
            min_content_chars: 10,
            identity_prefix_chars: 100,
        }
    }
}

impl EngineConfig {
    /// Load overrides from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read engine config {}: {e}", path.display()))
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            Error::Config(msg) => {
                Error::Config(format!("bad engine config {}: {msg}", path.display()))
            }
            other => other,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let periods = [
            ("cache_ttl_ms", self.cache_ttl_ms),
            ("eviction_interval_ms", self.eviction_interval_ms),
            ("tick_interval_ms", self.tick_interval_ms),
        ];
        for (name, value) in periods {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be greater than zero")));
            }
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_millis(self.eviction_interval_ms)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
