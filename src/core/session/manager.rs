// src/core/session/manager.rs

//! Orchestrates the session lifecycle on behalf of one caller: connect,
//! disconnect, listing, status, validation, and execution against the caller's
//! current session.

use super::execute::SESSION_NOT_ACTIVE;
use super::record::{ServerInfo, Session};
use super::resolver::SessionResolver;
use super::responses::{
    AllSessionsResponse, ConnectionResponse, ConnectionStatus, ConnectionStatusResponse,
};
use super::store::SessionStore;
use crate::config::SessionConfig;
use crate::core::connection::{
    ConnectionHandle, ConnectionRequest, Connector, ItemRequest, UserIdentity,
};
use crate::core::errors::GatewayError;
use crate::core::metrics;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type LoginTask = JoinHandle<(Box<dyn ConnectionHandle>, anyhow::Result<UserIdentity>)>;

/// A cheap, cloneable view of the shared store, bound to one caller's resolver.
///
/// Web front-ends typically build one per request with [`SessionManager::with_resolver`].
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<SessionStore>,
    connector: Arc<dyn Connector>,
    resolver: Arc<dyn SessionResolver>,
    login_timeout: Duration,
    default_session_name: String,
}

impl SessionManager {
    pub fn new(
        store: Arc<SessionStore>,
        connector: Arc<dyn Connector>,
        resolver: Arc<dyn SessionResolver>,
        config: &SessionConfig,
    ) -> Self {
        Self {
            store,
            connector,
            resolver,
            login_timeout: config.login_timeout,
            default_session_name: config.default_session_name.clone(),
        }
    }

    /// Returns a manager sharing this one's store and connector but resolving
    /// the current session through `resolver`.
    pub fn with_resolver(&self, resolver: Arc<dyn SessionResolver>) -> Self {
        Self {
            resolver,
            ..self.clone()
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn login_timeout(&self) -> Duration {
        self.login_timeout
    }

    /// The resolved current session name. Empty names count as absent.
    pub fn current_session_name(&self) -> Option<String> {
        self.resolver.session_id().filter(|name| !name.is_empty())
    }

    fn current_session(&self) -> Option<Arc<Session>> {
        let name = self.current_session_name()?;
        self.store.get_session(&name)
    }

    pub fn is_connected(&self) -> bool {
        self.current_session().is_some()
    }

    pub fn current_server_info(&self) -> Option<ServerInfo> {
        self.current_session().map(|s| s.server_info().clone())
    }

    /// Logs in to the remote server and stores the resulting session.
    ///
    /// The blocking login runs on the blocking pool and is raced against
    /// `login_timeout` and `cancel`. A login that loses the race is abandoned,
    /// not killed: it may still finish in the background, in which case its
    /// connection is logged out and never stored.
    pub async fn connect(
        &self,
        request: ConnectionRequest,
        cancel: &CancellationToken,
    ) -> Result<ConnectionResponse, GatewayError> {
        let session_name = request
            .session_name
            .clone()
            .filter(|name| !name.is_empty())
            .or_else(|| self.current_session_name())
            .unwrap_or_else(|| self.default_session_name.clone());

        let mut handle = self.connector.create(&request).map_err(|e| {
            metrics::LOGINS_TOTAL.with_label_values(&["failed"]).inc();
            GatewayError::classify(e, "Connection failed")
        })?;

        info!(
            "Connecting session '{}' to {} (database '{}') as '{}'.",
            session_name, request.url, request.database, request.username
        );

        let mut login = tokio::task::spawn_blocking(move || {
            let outcome = handle.login();
            (handle, outcome)
        });

        let timeout = self.login_timeout;
        let raced = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                Err(GatewayError::cancelled("Connection attempt was cancelled."))
            }
            _ = tokio::time::sleep(timeout) => Err(GatewayError::infrastructure(format!(
                "Connection timed out after {timeout:?}."
            ))),
            joined = &mut login => Ok(joined),
        };
        let joined = match raced {
            Ok(joined) => joined,
            Err(err) => {
                let label = if matches!(err, GatewayError::Cancelled(_)) {
                    "cancelled"
                } else {
                    "timeout"
                };
                metrics::LOGINS_TOTAL.with_label_values(&[label]).inc();
                warn!("Abandoning login for session '{}': {}", session_name, err);
                self.abandon_login(login, session_name);
                return Err(err);
            }
        };

        let (handle, outcome) = joined.map_err(|e| {
            metrics::LOGINS_TOTAL.with_label_values(&["failed"]).inc();
            GatewayError::infrastructure(format!("Connection failed: login task {e}"))
        })?;

        let identity = match outcome {
            Ok(identity) => identity,
            Err(e) => {
                let err = GatewayError::classify(e, "Connection failed");
                let label = if matches!(err, GatewayError::Auth(_)) {
                    "rejected"
                } else {
                    "failed"
                };
                metrics::LOGINS_TOTAL.with_label_values(&[label]).inc();
                warn!("Login for session '{}' failed: {}", session_name, err);
                return Err(err);
            }
        };

        let server_info = ServerInfo {
            database: request.database,
            user_id: identity.user_id,
            user_name: request.username,
            url: request.url,
        };
        // Inserting may run a due sweep, whose logouts block.
        let store = Arc::clone(&self.store);
        let session = Session::new(session_name.as_str(), handle, server_info.clone());
        tokio::task::spawn_blocking(move || store.add_session(session))
            .await
            .map_err(|e| {
                metrics::LOGINS_TOTAL.with_label_values(&["failed"]).inc();
                GatewayError::infrastructure(format!("Connection failed: store task {e}"))
            })?;
        metrics::LOGINS_TOTAL.with_label_values(&["success"]).inc();
        info!("Session '{}' connected.", session_name);

        Ok(ConnectionResponse {
            success: true,
            message: "Successfully connected".to_string(),
            server_info: Some(server_info),
            session_name: Some(session_name),
        })
    }

    /// Waits out an abandoned login in the background and logs out its
    /// connection if it succeeds after all.
    fn abandon_login(&self, login: LoginTask, session_name: String) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let Ok((mut handle, Ok(_))) = login.await else {
                debug!("Abandoned login for session '{}' did not succeed.", session_name);
                return;
            };
            info!(
                "Abandoned login for session '{}' succeeded late; logging it out.",
                session_name
            );
            let logout = tokio::task::spawn_blocking(move || {
                store.logout_handle(&session_name, handle.as_mut());
            });
            if let Err(e) = logout.await {
                warn!("Logout of an abandoned login did not complete: {}", e);
            }
        });
    }

    /// Disconnects the current session. Succeeds even when there is none.
    pub fn disconnect(&self) -> ConnectionResponse {
        match self.current_session_name() {
            Some(name) => self.disconnect_session(&name),
            None => ConnectionResponse::ok("Already disconnected"),
        }
    }

    /// Disconnects session `name`. Idempotent: an unknown name is not an error.
    pub fn disconnect_session(&self, name: &str) -> ConnectionResponse {
        self.store.remove_session(name);
        ConnectionResponse::ok(format!("Session '{name}' disconnected"))
    }

    /// Lists live sessions, marking the caller's current one.
    pub fn get_all_sessions(&self) -> AllSessionsResponse {
        let current = self.current_session_name().unwrap_or_default();
        let mut sessions = self.store.get_all_sessions();
        for session in sessions.iter_mut() {
            session.is_current = session.name == current;
        }
        AllSessionsResponse {
            sessions,
            current_session: current,
        }
    }

    /// Reports whether the caller's current session is live. Never fails.
    pub fn get_status(&self) -> ConnectionStatusResponse {
        match self.current_session() {
            Some(session) => ConnectionStatusResponse {
                is_connected: true,
                status: ConnectionStatus::Connected,
                server_info: Some(session.server_info().clone()),
            },
            None => ConnectionStatusResponse {
                is_connected: false,
                status: ConnectionStatus::Disconnected,
                server_info: None,
            },
        }
    }

    /// Confirms the current session still works by fetching the logged-in user.
    pub fn validate_connection(&self) -> Result<ConnectionResponse, GatewayError> {
        let session = self
            .current_session()
            .ok_or_else(|| GatewayError::auth("Not connected"))?;
        let name = session.name().to_string();

        let user_name = self.store.execute(&name, |handle| {
            let user_id = handle
                .user_id()
                .ok_or_else(|| GatewayError::auth("Validation failed: no logged-in user"))?;
            let result = handle.apply(&ItemRequest::get_by_id("User", user_id))?;
            if let Some(fault) = result.fault {
                return Err(GatewayError::auth(format!("Validation failed: {fault}")).into());
            }
            Ok(result
                .items
                .first()
                .and_then(|user| user.property("keyed_name"))
                .unwrap_or("Unknown")
                .to_string())
        })?;

        debug!("Session '{}' validated for user '{}'.", name, user_name);
        Ok(ConnectionResponse {
            success: true,
            message: format!("Valid. User: {user_name}"),
            server_info: Some(session.server_info().clone()),
            session_name: Some(name),
        })
    }

    /// Runs `unit_of_work` against the current session. See [`SessionStore::execute`].
    pub fn execute<T, F>(&self, unit_of_work: F) -> Result<T, GatewayError>
    where
        F: FnOnce(&mut dyn ConnectionHandle) -> anyhow::Result<T>,
    {
        let name = self.current_name_or_inactive()?;
        self.store.execute(&name, unit_of_work)
    }

    /// Like [`execute`](Self::execute), but runs on the blocking pool so async
    /// callers do not stall a runtime worker while waiting for the lock or the server.
    pub async fn run<T, F>(&self, unit_of_work: F) -> Result<T, GatewayError>
    where
        F: FnOnce(&mut dyn ConnectionHandle) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let name = self.current_name_or_inactive()?;
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.execute(&name, unit_of_work))
            .await
            .map_err(|e| GatewayError::infrastructure(format!("Remote call failed: {e}")))?
    }

    /// Sets or clears a variable on the current session.
    pub fn set_variable(&self, name: &str, value: Option<Value>) -> Result<(), GatewayError> {
        let session = self.current_name_or_inactive()?;
        self.store.set_variable(&session, name, value)
    }

    /// Appends a line to the current session's log. A no-op without a session.
    pub fn add_log(&self, message: &str) {
        if let Some(name) = self.current_session_name() {
            self.store.add_log(&name, message);
        }
    }

    fn current_name_or_inactive(&self) -> Result<String, GatewayError> {
        self.current_session_name()
            .ok_or_else(|| GatewayError::auth(SESSION_NOT_ACTIVE))
    }
}
