// src/core/session/store.rs

//! Implements the concurrent, TTL-bounded map from session name to `Session`.
//!
//! Expiry is lazy: a lookup evicts the session it finds expired, and any store
//! access may trigger a full sweep, throttled to one per `cleanup_interval`.
//! There is no background timer.

use super::record::Session;
use super::responses::SessionInfo;
use super::stats::StoreStats;
use crate::config::SessionConfig;
use crate::core::connection::ConnectionHandle;
use crate::core::errors::GatewayError;
use crate::core::metrics;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Owns every live `Session` for the lifetime of the store.
///
/// Distinct names never contend on a store-wide lock: the map is sharded, and
/// each `Session` carries its own lock for the connection handle.
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, Arc<Session>>,
    ttl: Duration,
    cleanup_interval: Duration,
    last_sweep: Mutex<Instant>,
    stats: StoreStats,
}

impl SessionStore {
    /// Creates an empty store using the limits from `config`.
    pub fn new(config: &SessionConfig) -> Self {
        Self::with_limits(config.ttl, config.cleanup_interval)
    }

    /// Creates an empty store with an explicit TTL and sweep interval.
    pub fn with_limits(ttl: Duration, cleanup_interval: Duration) -> Self {
        metrics::init_execute_outcomes();
        Self {
            sessions: DashMap::new(),
            ttl,
            cleanup_interval,
            last_sweep: Mutex::new(Instant::now()),
            stats: StoreStats::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn cleanup_interval(&self) -> Duration {
        self.cleanup_interval
    }

    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Number of stored sessions, expired-but-not-yet-evicted ones included.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Checks for a name without refreshing its access time or evicting it.
    pub fn contains(&self, name: &str) -> bool {
        self.sessions.contains_key(name)
    }

    /// Inserts `session` under its own name, replacing any previous record.
    ///
    /// A replaced record is dropped without logging out its connection. A due
    /// sweep runs first and logs out expired sessions on the calling thread, so
    /// async callers should invoke this from the blocking pool.
    pub fn add_session(&self, session: Session) -> Arc<Session> {
        self.maybe_sweep();

        let session = Arc::new(session);
        let name = session.name();
        if self
            .sessions
            .insert(name.to_string(), Arc::clone(&session))
            .is_some()
        {
            debug!("Session '{}' replaced by a new connection.", name);
        } else {
            metrics::ACTIVE_SESSIONS.inc();
        }
        session
    }

    /// Looks up a live session and refreshes its last-accessed time.
    ///
    /// Returns `None` for an empty or unknown name, and for a session idle longer
    /// than the TTL, which is evicted as a side effect.
    pub fn get_session(&self, name: &str) -> Option<Arc<Session>> {
        if name.is_empty() {
            return None;
        }
        self.maybe_sweep();

        let now = Instant::now();
        let entry = self.sessions.get(name)?;
        if entry.is_expired(now, self.ttl) {
            drop(entry);
            debug!("Session '{}' found expired on lookup.", name);
            self.evict_expired(name, now);
            return None;
        }
        // Refreshed while the shard guard is held, so a concurrent sweep cannot
        // evict the session between the expiry check and the refresh.
        entry.touch(now);
        Some(Arc::clone(entry.value()))
    }

    /// Removes a session and logs out its connection. Returns whether it existed.
    ///
    /// A failing logout is logged and ignored: removal always succeeds.
    pub fn remove_session(&self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        self.maybe_sweep();

        match self.sessions.remove(name) {
            Some((_, session)) => {
                metrics::ACTIVE_SESSIONS.dec();
                metrics::SESSIONS_REMOVED_TOTAL
                    .with_label_values(&["disconnect"])
                    .inc();
                info!("Session '{}' removed.", name);
                self.logout_quietly(&session);
                true
            }
            None => {
                debug!("Session '{}' was not present on removal.", name);
                false
            }
        }
    }

    /// True if `name` still maps to this exact record.
    pub(crate) fn is_registered(&self, name: &str, session: &Arc<Session>) -> bool {
        self.sessions
            .get(name)
            .is_some_and(|entry| Arc::ptr_eq(entry.value(), session))
    }

    /// Returns a snapshot of every live session, sorted by name.
    ///
    /// No entry is marked current; that is up to the caller.
    pub fn get_all_sessions(&self) -> Vec<SessionInfo> {
        self.maybe_sweep();

        let now = Instant::now();
        let mut sessions: Vec<SessionInfo> = self
            .sessions
            .iter()
            .filter(|entry| !entry.is_expired(now, self.ttl))
            .map(|entry| SessionInfo {
                name: entry.key().clone(),
                server_info: entry.server_info().clone(),
                is_current: false,
                created_at: entry.created_at(),
            })
            .collect();
        sessions.sort_by(|a, b| a.name.cmp(&b.name));
        sessions
    }

    /// Runs a full expiry scan regardless of when the last one happened.
    /// Returns the number of sessions evicted.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        *self.last_sweep.lock() = now;
        self.sweep(now)
    }

    /// Runs a full expiry scan if at least `cleanup_interval` has passed since the last one.
    fn maybe_sweep(&self) {
        let now = Instant::now();
        {
            let mut last_sweep = self.last_sweep.lock();
            if now.saturating_duration_since(*last_sweep) < self.cleanup_interval {
                return;
            }
            *last_sweep = now;
        }
        self.sweep(now);
    }

    fn sweep(&self, now: Instant) -> usize {
        self.stats.increment_sweeps();

        // Names are collected first so no shard guard is held while evicting.
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.is_expired(now, self.ttl))
            .map(|entry| entry.key().clone())
            .collect();

        let mut evicted = 0;
        for name in &expired {
            if self.evict_expired(name, now) {
                evicted += 1;
            }
        }

        if evicted > 0 {
            info!(
                "Session sweep evicted {} expired session(s); {} remain.",
                evicted,
                self.sessions.len()
            );
        } else {
            debug!("Session sweep found nothing to evict.");
        }
        evicted
    }

    /// Removes `name` only if it is still expired, then logs out its connection.
    fn evict_expired(&self, name: &str, now: Instant) -> bool {
        let removed = self
            .sessions
            .remove_if(name, |_, session| session.is_expired(now, self.ttl));

        let Some((_, session)) = removed else {
            return false;
        };

        metrics::ACTIVE_SESSIONS.dec();
        metrics::SESSIONS_REMOVED_TOTAL
            .with_label_values(&["expired"])
            .inc();
        self.stats.increment_evictions();
        info!(
            "Session '{}' evicted after being idle for more than {:?}.",
            name, self.ttl
        );
        self.logout_quietly(&session);
        true
    }

    /// Best-effort logout. Waits for any in-flight unit of work on the session.
    fn logout_quietly(&self, session: &Session) {
        let mut state = session.lock();
        self.logout_handle(session.name(), state.handle.as_mut());
    }

    /// Logs out `handle`, counting and logging a failure instead of returning it.
    pub(crate) fn logout_handle(&self, name: &str, handle: &mut dyn ConnectionHandle) {
        let failure = match catch_unwind(AssertUnwindSafe(|| handle.logout())) {
            Ok(Ok(())) => {
                debug!("Logged out connection of session '{}'.", name);
                return;
            }
            Ok(Err(e)) => GatewayError::classify(e, "Logout failed"),
            Err(payload) => GatewayError::from_panic(payload, "Logout panicked"),
        };

        self.stats.increment_logout_failures();
        metrics::LOGOUT_FAILURES_TOTAL.inc();
        warn!("Ignoring logout failure for session '{}': {}", name, failure);
    }
}
