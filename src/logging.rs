// src/logging.rs

//! Sets up `tracing` output for processes embedding the gateway.

use crate::config::Config;
use anyhow::{Result, anyhow};
use std::sync::Arc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{filter::EnvFilter, reload};

/// A handle to change the log filter of a running process.
pub type LogReloadHandle = Arc<reload::Handle<EnvFilter, tracing_subscriber::Registry>>;

/// Installs the global subscriber: a reloadable filter plus a compact fmt layer.
///
/// `RUST_LOG` takes precedence over `config.log_level`. Fails if a global
/// subscriber is already installed.
pub fn init(config: &Config) -> Result<LogReloadHandle> {
    let initial_log_level =
        std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());

    let (filter, reload_handle) = reload::Layer::new(EnvFilter::new(initial_log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact() // Use the compact, single-line format.
                .with_ansi(true),
        )
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))?;

    Ok(Arc::new(reload_handle))
}

/// Changes the active filter, e.g. `"debug"` or `"info,plmgate::core::session=trace"`.
pub fn set_log_level(handle: &LogReloadHandle, level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level).map_err(|e| anyhow!("Invalid log level '{level}': {e}"))?;
    handle
        .reload(filter)
        .map_err(|e| anyhow!("Failed to reload log filter: {e}"))
}

/// Installs a quiet subscriber that writes through the test harness.
/// Safe to call from every test; only the first call has an effect.
pub fn init_for_tests() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("warn"))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
