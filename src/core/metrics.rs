// src/core/metrics.rs

//! Defines and registers Prometheus metrics for session monitoring.
//!
//! This module uses `lazy_static` so the metrics are registered once for the
//! whole process, no matter how many stores are created.

use crate::core::errors::ErrorKind;
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, TextEncoder, register_counter, register_counter_vec,
    register_gauge, register_histogram,
};
use strum::IntoEnumIterator;

lazy_static! {
    /// The number of sessions currently held across all stores.
    pub static ref ACTIVE_SESSIONS: Gauge =
        register_gauge!("plmgate_active_sessions", "Number of sessions currently stored.").unwrap();

    /// Login attempts, labeled by outcome (`success`, `rejected`, `failed`, `timeout`, `cancelled`).
    pub static ref LOGINS_TOTAL: CounterVec =
        register_counter_vec!("plmgate_logins_total", "Total number of login attempts, labeled by outcome.", &["outcome"]).unwrap();
    /// Sessions removed from a store, labeled by reason (`expired`, `disconnect`).
    pub static ref SESSIONS_REMOVED_TOTAL: CounterVec =
        register_counter_vec!("plmgate_sessions_removed_total", "Total number of sessions removed, labeled by reason.", &["reason"]).unwrap();
    /// Logout calls that failed during teardown and were ignored.
    pub static ref LOGOUT_FAILURES_TOTAL: Counter =
        register_counter!("plmgate_logout_failures_total", "Total number of swallowed logout failures.").unwrap();
    /// Units of work run through `execute`, labeled by outcome (`ok` or the error kind).
    pub static ref EXECUTE_TOTAL: CounterVec =
        register_counter_vec!("plmgate_execute_total", "Total number of executed units of work, labeled by outcome.", &["outcome"]).unwrap();

    /// Time spent inside `execute`, lock wait included.
    pub static ref EXECUTE_LATENCY_SECONDS: Histogram =
        register_histogram!("plmgate_execute_latency_seconds", "Latency of executed units of work in seconds.").unwrap();
}

/// Creates a zero-valued `plmgate_execute_total` series for every outcome, so
/// a scrape shows all of them before the first failure of each kind.
pub fn init_execute_outcomes() {
    EXECUTE_TOTAL.with_label_values(&["ok"]);
    for kind in ErrorKind::iter() {
        let outcome: &'static str = kind.into();
        EXECUTE_TOTAL.with_label_values(&[outcome]);
    }
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
