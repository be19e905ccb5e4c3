//! Engine configuration loading

use crate::error::{Result, RlsError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding [`EngineConfig::store_timeout_ms`]
pub const ENV_STORE_TIMEOUT_MS: &str = "RLS_STORE_TIMEOUT_MS";

/// Environment variable overriding [`EngineConfig::top_n`]
pub const ENV_TOP_N: &str = "RLS_TOP_N";

/// Decision engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Deadline for each store fetch on the decision path. `0` waits forever.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Length of the top-policy and top-rule rankings in statistics
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_store_timeout_ms() -> u64 {
    2_000
}

fn default_top_n() -> usize {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_timeout_ms: default_store_timeout_ms(),
            top_n: default_top_n(),
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document. Missing keys fall back to defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| RlsError::Config(format!("Invalid config: {}", e)))
    }

    /// Load a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| RlsError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Apply `RLS_STORE_TIMEOUT_MS` and `RLS_TOP_N` from the process environment
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(raw) = lookup(ENV_STORE_TIMEOUT_MS) {
            self.store_timeout_ms = raw.trim().parse().map_err(|_| {
                RlsError::Config(format!("{} must be an integer, got '{}'", ENV_STORE_TIMEOUT_MS, raw))
            })?;
        }

        if let Some(raw) = lookup(ENV_TOP_N) {
            self.top_n = raw.trim().parse().map_err(|_| {
                RlsError::Config(format!("{} must be an integer, got '{}'", ENV_TOP_N, raw))
            })?;
        }

        Ok(self)
    }

    /// Store fetch deadline as a [`Duration`]
    pub fn store_timeout(&self) -> Option<Duration> {
        (self.store_timeout_ms > 0).then(|| Duration::from_millis(self.store_timeout_ms))
    }
}
