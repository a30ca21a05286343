// src/core/connection.rs

//! The seam between the session core and the vendor SDK.
//!
//! A `ConnectionHandle` is one authenticated link to the remote PLM server. It is
//! stateful and not safe to share between threads; the core only ever touches it
//! while holding the owning session's lock. A `Connector` builds unauthenticated
//! handles from a `ConnectionRequest`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The parameters of a `connect` call.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequest {
    pub url: String,
    pub database: String,
    pub username: String,
    pub password: String,
    /// The name to register the session under. Falls back to the resolved
    /// current session, then to the configured default name.
    #[serde(default)]
    pub session_name: Option<String>,
}

impl ConnectionRequest {
    pub fn new(
        url: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            database: database.into(),
            username: username.into(),
            password: password.into(),
            session_name: None,
        }
    }

    pub fn with_session_name(mut self, name: impl Into<String>) -> Self {
        self.session_name = Some(name.into());
        self
    }
}

// Hand-written so the password never ends up in a log line.
impl fmt::Debug for ConnectionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRequest")
            .field("url", &self.url)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("session_name", &self.session_name)
            .finish()
    }
}

/// The identity the server hands back after a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_id: String,
}

/// A single remote item as returned by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub item_type: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Item {
    pub fn new(item_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            item_type: item_type.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

/// A request applied against the server through `ConnectionHandle::apply`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemRequest {
    pub item_type: String,
    /// The server-side action, e.g. `get`, `add`, `edit`, `delete`, `lock`.
    pub action: String,
    pub id: Option<String>,
    pub properties: BTreeMap<String, String>,
    /// Per-property comparison operators (e.g. `like`) for `get` requests.
    pub conditions: BTreeMap<String, String>,
    /// Request attributes such as `select`, `page` or `pagesize`.
    pub attributes: BTreeMap<String, String>,
}

impl ItemRequest {
    pub fn new(item_type: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            item_type: item_type.into(),
            action: action.into(),
            ..Default::default()
        }
    }

    pub fn get_by_id(item_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(item_type, "get").with_id(id)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_condition(mut self, name: impl Into<String>, op: impl Into<String>) -> Self {
        self.conditions.insert(name.into(), op.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// The result of an `apply` call. A server-reported fault is data, not an `Err`:
/// the transport worked, the server just said no.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemResult {
    pub items: Vec<Item>,
    pub fault: Option<String>,
}

impl ItemResult {
    pub fn items(items: Vec<Item>) -> Self {
        Self { items, fault: None }
    }

    pub fn fault(message: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            fault: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.fault.is_some()
    }

    pub fn first(&self) -> Option<&Item> {
        self.items.first()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

/// One authenticated, stateful link to the remote server.
///
/// Every method may block for as long as the server takes to answer. A rejected
/// login should be reported as `GatewayError::Auth` inside the `anyhow::Error`;
/// any other error is treated as an infrastructure fault. The raw passthroughs
/// (`apply_aml`, `apply_sql`) are optional and fail unless overridden.
pub trait ConnectionHandle: Send {
    /// Authenticates against the server.
    fn login(&mut self) -> anyhow::Result<UserIdentity>;

    /// Ends the server-side session.
    fn logout(&mut self) -> anyhow::Result<()>;

    /// The id of the logged-in user, once `login` has succeeded.
    fn user_id(&self) -> Option<String>;

    /// Sends one request to the server.
    fn apply(&mut self, request: &ItemRequest) -> anyhow::Result<ItemResult>;

    /// Sends a raw AML document, already wrapped in `<AML>`, to the server.
    fn apply_aml(&mut self, _aml: &str) -> anyhow::Result<ItemResult> {
        anyhow::bail!("raw AML is not supported by this connection")
    }

    /// Runs a raw SQL statement on the server.
    fn apply_sql(&mut self, _sql: &str) -> anyhow::Result<ItemResult> {
        anyhow::bail!("raw SQL is not supported by this connection")
    }
}

/// Builds unauthenticated handles. Must be cheap and must not contact the server.
pub trait Connector: Send + Sync {
    fn create(&self, request: &ConnectionRequest) -> anyhow::Result<Box<dyn ConnectionHandle>>;
}
