// src/core/session/execute.rs

//! The single chokepoint through which work reaches a connection handle.

use super::store::SessionStore;
use crate::core::connection::ConnectionHandle;
use crate::core::errors::GatewayError;
use crate::core::metrics;
use serde_json::Value;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;
use tracing::debug;

/// The error raised when work is submitted for a name with no live session.
pub const SESSION_NOT_ACTIVE: &str = "Session is not active.";

impl SessionStore {
    /// Runs `unit_of_work` against the connection of session `name`, holding that
    /// session's lock for the whole call.
    ///
    /// Calls against one session are totally ordered; calls against different
    /// sessions run in parallel. A `GatewayError` returned by the unit of work is
    /// passed through as-is; any other error, or a panic, comes back as
    /// `GatewayError::Infrastructure`.
    pub fn execute<T, F>(&self, name: &str, unit_of_work: F) -> Result<T, GatewayError>
    where
        F: FnOnce(&mut dyn ConnectionHandle) -> anyhow::Result<T>,
    {
        let started = Instant::now();
        let result = self.execute_locked(name, unit_of_work);

        metrics::EXECUTE_LATENCY_SECONDS.observe(started.elapsed().as_secs_f64());
        let outcome: &'static str = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind().into(),
        };
        metrics::EXECUTE_TOTAL.with_label_values(&[outcome]).inc();
        result
    }

    fn execute_locked<T, F>(&self, name: &str, unit_of_work: F) -> Result<T, GatewayError>
    where
        F: FnOnce(&mut dyn ConnectionHandle) -> anyhow::Result<T>,
    {
        let session = self
            .get_session(name)
            .ok_or_else(|| GatewayError::auth(SESSION_NOT_ACTIVE))?;

        // The guard is released on every exit path, unwinding included.
        let mut state = session.lock();
        // Removal or eviction may have won the lock and logged the handle out.
        if !self.is_registered(name, &session) {
            debug!("Session '{}' was removed while waiting for its lock.", name);
            return Err(GatewayError::auth(SESSION_NOT_ACTIVE));
        }
        match catch_unwind(AssertUnwindSafe(|| unit_of_work(state.handle.as_mut()))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                let err = GatewayError::classify(e, "Remote call failed");
                debug!("Unit of work on session '{}' failed: {}", name, err);
                Err(err)
            }
            Err(payload) => Err(GatewayError::from_panic(payload, "Remote call panicked")),
        }
    }

    /// Sets (or, for `None`/`null`, removes) a variable on session `name` under its lock.
    pub fn set_variable(
        &self,
        name: &str,
        variable: &str,
        value: Option<Value>,
    ) -> Result<(), GatewayError> {
        let session = self
            .get_session(name)
            .ok_or_else(|| GatewayError::auth(SESSION_NOT_ACTIVE))?;
        session.set_variable(variable, value);
        Ok(())
    }

    /// Appends a line to the log of session `name`. Does nothing if the session is gone.
    pub fn add_log(&self, name: &str, message: &str) -> bool {
        match self.get_session(name) {
            Some(session) => {
                session.add_log(message);
                true
            }
            None => {
                debug!("Dropping log line for inactive session '{}'.", name);
                false
            }
        }
    }
}
