// src/config.rs

//! Manages gateway configuration: loading from TOML, defaults, and validation.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use tracing::warn;

/// Settings that govern session lifetime and login behaviour.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Sessions idle for longer than this are evicted on the next lookup or sweep.
    #[serde(with = "humantime_serde", default = "default_ttl")]
    pub ttl: Duration,
    /// Minimum time between two full expiry scans of the store.
    #[serde(with = "humantime_serde", default = "default_cleanup_interval")]
    pub cleanup_interval: Duration,
    /// Upper bound on the blocking phase of `connect`.
    #[serde(with = "humantime_serde", default = "default_login_timeout")]
    pub login_timeout: Duration,
    /// The name used by `connect` when neither the request nor the resolver supply one.
    #[serde(default = "default_session_name")]
    pub default_session_name: String,
}

fn default_ttl() -> Duration {
    Duration::from_secs(4 * 60 * 60) // 4 hours
}
fn default_cleanup_interval() -> Duration {
    Duration::from_secs(30 * 60) // 30 minutes
}
fn default_login_timeout() -> Duration {
    Duration::from_secs(45)
}
fn default_session_name() -> String {
    "default".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: default_ttl(),
            cleanup_interval: default_cleanup_interval(),
            login_timeout: default_login_timeout(),
            default_session_name: default_session_name(),
        }
    }
}

/// A raw representation of the config file before validation.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    sessions: SessionConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Represents the final, validated gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub log_level: String,
    #[serde(default)]
    pub sessions: SessionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            sessions: SessionConfig::default(),
        }
    }
}

impl Config {
    /// Loads and validates the configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml_str(&contents).with_context(|| format!("Invalid config in '{path}'"))
    }

    /// Parses and validates the configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let raw_config: RawConfig =
            toml::from_str(contents).context("Failed to parse TOML configuration")?;

        let config = Config {
            log_level: raw_config.log_level,
            sessions: raw_config.sessions,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.log_level.trim().is_empty() {
            return Err(anyhow!("log_level cannot be empty"));
        }

        let sessions = &self.sessions;
        if sessions.ttl.is_zero() {
            return Err(anyhow!("sessions.ttl cannot be 0"));
        }
        if sessions.cleanup_interval.is_zero() {
            return Err(anyhow!("sessions.cleanup_interval cannot be 0"));
        }
        if sessions.login_timeout.is_zero() {
            return Err(anyhow!("sessions.login_timeout cannot be 0"));
        }
        if sessions.default_session_name.trim().is_empty() {
            return Err(anyhow!("sessions.default_session_name cannot be empty"));
        }

        if sessions.cleanup_interval > sessions.ttl {
            warn!(
                "sessions.cleanup_interval ({:?}) is longer than sessions.ttl ({:?}); idle sessions may linger until their next lookup.",
                sessions.cleanup_interval, sessions.ttl
            );
        }

        Ok(())
    }
}
