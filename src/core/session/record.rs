// src/core/session/record.rs

//! Defines the in-memory record bound to one named session.

use crate::core::connection::ConnectionHandle;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tokio::time::Instant;

/// Server metadata captured at login time. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub database: String,
    pub user_id: String,
    pub user_name: String,
    pub url: String,
}

/// The part of a session that is only touched under the session lock.
pub struct SessionState {
    pub(crate) handle: Box<dyn ConnectionHandle>,
    pub(crate) variables: HashMap<String, Value>,
    pub(crate) logs: Vec<String>,
}

/// A named, authenticated binding to the remote server.
///
/// The `state` mutex is the per-session lock: the connection handle, the variable
/// store and the log are only ever accessed while it is held.
pub struct Session {
    name: String,
    server_info: ServerInfo,
    created_at: DateTime<Utc>,
    last_accessed: Mutex<Instant>,
    state: Mutex<SessionState>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.name)
            .field("server_info", &self.server_info)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates a new record that takes exclusive ownership of `handle`.
    pub fn new(
        name: impl Into<String>,
        handle: Box<dyn ConnectionHandle>,
        server_info: ServerInfo,
    ) -> Self {
        Self {
            name: name.into(),
            server_info,
            created_at: Utc::now(),
            last_accessed: Mutex::new(Instant::now()),
            state: Mutex::new(SessionState {
                handle,
                variables: HashMap::new(),
                logs: Vec::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_accessed(&self) -> Instant {
        *self.last_accessed.lock()
    }

    pub(crate) fn touch(&self, now: Instant) {
        *self.last_accessed.lock() = now;
    }

    /// True if the session has been idle for strictly longer than `ttl` at `now`.
    pub(crate) fn is_expired(&self, now: Instant, ttl: std::time::Duration) -> bool {
        now.saturating_duration_since(self.last_accessed()) > ttl
    }

    /// Acquires the per-session lock.
    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock()
    }

    /// Sets or removes (`None` / JSON `null`) a session variable. Last write wins.
    pub fn set_variable(&self, name: &str, value: Option<Value>) {
        let mut state = self.lock();
        match value {
            Some(v) if !v.is_null() => {
                state.variables.insert(name.to_string(), v);
            }
            _ => {
                state.variables.remove(name);
            }
        }
    }

    pub fn variable(&self, name: &str) -> Option<Value> {
        self.lock().variables.get(name).cloned()
    }

    pub fn variables(&self) -> HashMap<String, Value> {
        self.lock().variables.clone()
    }

    /// Appends a timestamped line to the session log.
    pub fn add_log(&self, message: &str) {
        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        self.lock().logs.push(format!("[{stamp}] {message}"));
    }

    pub fn logs(&self) -> Vec<String> {
        self.lock().logs.clone()
    }
}
