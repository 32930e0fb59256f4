// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `config.toml` loading.
//!
//! Every section and field is optional; a missing file yields defaults.

use crate::priority::ScoreConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scoring: ScoreConfig,
    pub store: StoreConfig,
    pub tiers: TierConfig,
    pub checkpoints: CheckpointConfig,
    pub mailbox: MailboxConfig,
}

/// Versioned-write retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub max_attempts: u32,
    /// Base of the exponential backoff between attempts.
    pub backoff_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    /// Hot agents kept in L1 besides the focused one.
    pub l1_slots: usize,
    pub l1_token_budget: usize,
    pub l2_slots: usize,
    pub l2_token_budget: usize,
    /// Fraction of a budget at which eviction starts.
    pub pressure: f64,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            l1_slots: 4,
            l1_token_budget: 8_000,
            l2_slots: 32,
            l2_token_budget: 32_000,
            pressure: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    pub keep_last: usize,
    pub interval_secs: u64,
}

impl CheckpointConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            keep_last: 20,
            interval_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    pub default_ttl_secs: u64,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 24 * 60 * 60,
        }
    }
}

impl Config {
    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.max_attempts == 0 {
            return Err(ConfigError::Invalid("store.max_attempts must be at least 1".into()));
        }
        if !(self.tiers.pressure > 0.0 && self.tiers.pressure <= 1.0) {
            return Err(ConfigError::Invalid("tiers.pressure must be in (0, 1]".into()));
        }
        if self.checkpoints.keep_last == 0 {
            return Err(ConfigError::Invalid("checkpoints.keep_last must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
