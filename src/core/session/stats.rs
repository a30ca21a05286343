// src/core/session/stats.rs

//! Per-store counters, kept alongside the process-wide Prometheus metrics so
//! that one store instance can be observed in isolation.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
pub struct StoreStats {
    /// Number of full expiry scans actually performed.
    sweeps: AtomicU64,
    /// Number of sessions removed because their TTL ran out.
    evictions: AtomicU64,
    /// Number of logout attempts that failed and were swallowed.
    logout_failures: AtomicU64,
}

impl Default for StoreStats {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreStats {
    pub fn new() -> Self {
        Self {
            sweeps: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            logout_failures: AtomicU64::new(0),
        }
    }

    pub(crate) fn increment_sweeps(&self) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_sweeps(&self) -> u64 {
        self.sweeps.load(Ordering::Relaxed)
    }

    pub(crate) fn increment_evictions(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub(crate) fn increment_logout_failures(&self) {
        self.logout_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_logout_failures(&self) -> u64 {
        self.logout_failures.load(Ordering::Relaxed)
    }
}
