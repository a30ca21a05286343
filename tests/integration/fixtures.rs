// tests/integration/fixtures.rs

//! Common test fixtures: an in-memory stand-in for the PLM server.
//!
//! `FakeServer` holds the items and the knobs that scripted tests turn
//! (login and logout delays, rejected or hanging logins, failing logouts). `FakeHandle`
//! is the connection handle it hands out. Requests against `PROBE_TYPE`
//! record enter/exit events so tests can observe how units of work overlap.
//!
//! **Note:** Some fixtures may not be used in all tests yet,
//! but they are available for use when needed.

#![allow(dead_code)]

use anyhow::{anyhow, bail};
use parking_lot::{Condvar, Mutex};
use plmgate::core::GatewayError;
use plmgate::core::connection::{
    ConnectionHandle, ConnectionRequest, Connector, Item, ItemRequest, ItemResult, UserIdentity,
};
use plmgate::core::session::{ServerInfo, Session};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

pub const TEST_URL: &str = "http://plm.test/InnovatorServer";
pub const TEST_DATABASE: &str = "PLM_TEST";
pub const TEST_USER: &str = "admin";
pub const TEST_PASSWORD: &str = "innovator";
/// A password the fake server always rejects.
pub const BAD_PASSWORD: &str = "wrong";
pub const ADMIN_ID: &str = "30B991F927274FA3829655F50C99472E";
pub const ADMIN_KEYED_NAME: &str = "Super User";

/// `apply` on this type sleeps for the probe delay and records enter/exit.
pub const PROBE_TYPE: &str = "Probe";
/// `apply` on this type fails like a dropped transport.
pub const BROKEN_TYPE: &str = "Broken";
/// `apply` on this type panics.
pub const PANIC_TYPE: &str = "Panic";

/// Upper bound on a hanging login, so a forgotten release cannot wedge the suite.
const HANG_LIMIT: Duration = Duration::from_secs(30);

pub fn request() -> ConnectionRequest {
    ConnectionRequest::new(TEST_URL, TEST_DATABASE, TEST_USER, TEST_PASSWORD)
}

pub fn request_as(username: &str) -> ConnectionRequest {
    ConnectionRequest::new(TEST_URL, TEST_DATABASE, username, TEST_PASSWORD)
}

pub fn user_id_for(username: &str) -> String {
    if username == TEST_USER {
        ADMIN_ID.to_string()
    } else {
        format!("ID-{}", username.to_uppercase())
    }
}

pub fn server_info(username: &str) -> ServerInfo {
    ServerInfo {
        database: TEST_DATABASE.to_string(),
        user_id: user_id_for(username),
        user_name: username.to_string(),
        url: TEST_URL.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Enter,
    Exit,
}

pub struct FakeServer {
    items: Mutex<BTreeMap<(String, String), Item>>,
    next_id: AtomicUsize,
    events: Mutex<Vec<(String, Phase)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    logins: AtomicUsize,
    logouts: AtomicUsize,
    login_delay: Mutex<Duration>,
    logout_delay: Mutex<Duration>,
    probe_delay: Mutex<Duration>,
    fail_logouts: AtomicBool,
    hang_logins: Mutex<bool>,
    released: Condvar,
    raw_calls: Mutex<Vec<String>>,
}

impl FakeServer {
    pub fn new() -> Arc<Self> {
        let server = Self {
            items: Mutex::new(BTreeMap::new()),
            next_id: AtomicUsize::new(1),
            events: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            logins: AtomicUsize::new(0),
            logouts: AtomicUsize::new(0),
            login_delay: Mutex::new(Duration::from_millis(10)),
            logout_delay: Mutex::new(Duration::ZERO),
            probe_delay: Mutex::new(Duration::from_millis(50)),
            fail_logouts: AtomicBool::new(false),
            hang_logins: Mutex::new(false),
            released: Condvar::new(),
            raw_calls: Mutex::new(Vec::new()),
        };
        server.seed(Item::new("User", ADMIN_ID).with_property("keyed_name", ADMIN_KEYED_NAME));
        Arc::new(server)
    }

    pub fn seed(&self, item: Item) {
        self.items
            .lock()
            .insert((item.item_type.clone(), item.id.clone()), item);
    }

    pub fn item(&self, item_type: &str, id: &str) -> Option<Item> {
        self.items
            .lock()
            .get(&(item_type.to_string(), id.to_string()))
            .cloned()
    }

    pub fn set_login_delay(&self, delay: Duration) {
        *self.login_delay.lock() = delay;
    }

    pub fn set_logout_delay(&self, delay: Duration) {
        *self.logout_delay.lock() = delay;
    }

    pub fn set_probe_delay(&self, delay: Duration) {
        *self.probe_delay.lock() = delay;
    }

    pub fn fail_logouts(&self) {
        self.fail_logouts.store(true, Ordering::SeqCst);
    }

    /// Makes every subsequent login block until `release_logins` is called.
    pub fn hang_logins(&self) {
        *self.hang_logins.lock() = true;
    }

    pub fn release_logins(&self) {
        *self.hang_logins.lock() = false;
        self.released.notify_all();
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<(String, Phase)> {
        self.events.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Raw AML documents and SQL statements received, in order.
    pub fn raw_calls(&self) -> Vec<String> {
        self.raw_calls.lock().clone()
    }

    fn wait_for_release(&self) {
        let deadline = Instant::now() + HANG_LIMIT;
        let mut hanging = self.hang_logins.lock();
        while *hanging {
            if self.released.wait_until(&mut hanging, deadline).timed_out() {
                break;
            }
        }
    }

    fn probe(&self, label: &str) -> ItemResult {
        self.events.lock().push((label.to_string(), Phase::Enter));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.probe_delay.lock();
        std::thread::sleep(delay);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.events.lock().push((label.to_string(), Phase::Exit));
        ItemResult::items(Vec::new())
    }

    fn dispatch(&self, request: &ItemRequest, user_id: &str) -> ItemResult {
        let item_type = request.item_type.clone();
        let mut items = self.items.lock();
        let key = |id: &str| (item_type.clone(), id.to_string());

        match request.action.as_str() {
            "get" => {
                let found: Vec<Item> = match &request.id {
                    Some(id) => items.get(&key(id)).cloned().into_iter().collect(),
                    None => items
                        .values()
                        .filter(|item| item.item_type == item_type && matches_all(item, request))
                        .cloned()
                        .collect(),
                };
                if found.is_empty() {
                    not_found(&item_type)
                } else {
                    ItemResult::items(found)
                }
            }
            "add" => {
                let id = format!("{:032X}", self.next_id.fetch_add(1, Ordering::SeqCst));
                let mut item = Item::new(&item_type, &id);
                item.properties.extend(request.properties.clone());
                item.properties
                    .entry("state".to_string())
                    .or_insert_with(|| "Preliminary".to_string());
                items.insert(key(&id), item.clone());
                ItemResult::items(vec![item])
            }
            action => {
                let Some(id) = request.id.as_deref() else {
                    return ItemResult::fault(format!("Action '{action}' requires an id."));
                };
                match action {
                    "delete" | "purge" => match items.remove(&key(id)) {
                        Some(item) => ItemResult::items(vec![item]),
                        None => not_found(&item_type),
                    },
                    "edit" | "lock" | "unlock" | "promoteItem" => {
                        let Some(item) = items.get_mut(&key(id)) else {
                            return not_found(&item_type);
                        };
                        match action {
                            "edit" => item.properties.extend(request.properties.clone()),
                            "lock" => {
                                item.properties
                                    .insert("locked_by_id".to_string(), user_id.to_string());
                            }
                            "unlock" => {
                                item.properties.remove("locked_by_id");
                            }
                            _ => {
                                let state = request.attributes.get("state").cloned();
                                item.properties
                                    .insert("state".to_string(), state.unwrap_or_default());
                            }
                        }
                        ItemResult::items(vec![item.clone()])
                    }
                    other => ItemResult::fault(format!("Unsupported action '{other}'.")),
                }
            }
        }
    }
}

fn not_found(item_type: &str) -> ItemResult {
    ItemResult::fault(format!("No items of type {item_type} found."))
}

fn matches_all(item: &Item, request: &ItemRequest) -> bool {
    request.properties.iter().all(|(name, wanted)| {
        let actual = item.property(name).unwrap_or_default();
        if request.conditions.get(name).map(String::as_str) == Some("like") {
            actual.contains(wanted.trim_matches('%'))
        } else {
            actual == wanted
        }
    })
}

/// A connection handle backed by a `FakeServer`.
pub struct FakeHandle {
    server: Arc<FakeServer>,
    username: String,
    password: String,
    user_id: Option<String>,
}

impl FakeHandle {
    pub fn new(server: Arc<FakeServer>, username: &str, password: &str) -> Self {
        Self {
            server,
            username: username.to_string(),
            password: password.to_string(),
            user_id: None,
        }
    }

    /// A handle that skips the login round-trip.
    pub fn logged_in(server: Arc<FakeServer>, username: &str) -> Self {
        Self {
            user_id: Some(user_id_for(username)),
            ..Self::new(server, username, TEST_PASSWORD)
        }
    }
}

impl ConnectionHandle for FakeHandle {
    fn login(&mut self) -> anyhow::Result<UserIdentity> {
        self.server.logins.fetch_add(1, Ordering::SeqCst);
        self.server.wait_for_release();
        let delay = *self.server.login_delay.lock();
        std::thread::sleep(delay);

        if self.password == BAD_PASSWORD {
            return Err(GatewayError::auth("Authentication failed for user").into());
        }
        let user_id = user_id_for(&self.username);
        self.user_id = Some(user_id.clone());
        Ok(UserIdentity { user_id })
    }

    fn logout(&mut self) -> anyhow::Result<()> {
        self.server.logouts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.server.logout_delay.lock();
        std::thread::sleep(delay);
        if self.server.fail_logouts.load(Ordering::SeqCst) {
            bail!("server went away during logout");
        }
        self.user_id = None;
        Ok(())
    }

    fn user_id(&self) -> Option<String> {
        self.user_id.clone()
    }

    fn apply(&mut self, request: &ItemRequest) -> anyhow::Result<ItemResult> {
        let user_id = self
            .user_id
            .clone()
            .ok_or_else(|| anyhow!("not logged in"))?;
        match request.item_type.as_str() {
            PROBE_TYPE => Ok(self.server.probe(&self.username)),
            BROKEN_TYPE => bail!("connection reset by peer"),
            PANIC_TYPE => panic!("handle state corrupted"),
            _ => Ok(self.server.dispatch(request, &user_id)),
        }
    }

    fn apply_aml(&mut self, aml: &str) -> anyhow::Result<ItemResult> {
        if self.user_id.is_none() {
            bail!("not logged in");
        }
        self.server.raw_calls.lock().push(aml.to_string());
        if aml.contains("action=\"explode\"") {
            return Ok(ItemResult::fault("AML could not be parsed."));
        }
        Ok(ItemResult::items(Vec::new()))
    }

    fn apply_sql(&mut self, sql: &str) -> anyhow::Result<ItemResult> {
        if self.user_id.is_none() {
            bail!("not logged in");
        }
        self.server.raw_calls.lock().push(sql.to_string());
        if !sql.trim_start().to_uppercase().starts_with("SELECT") {
            return Ok(ItemResult::fault("Only SELECT statements are allowed."));
        }
        Ok(ItemResult::items(Vec::new()))
    }
}

pub struct FakeConnector {
    server: Arc<FakeServer>,
}

impl FakeConnector {
    pub fn new(server: Arc<FakeServer>) -> Self {
        Self { server }
    }
}

impl Connector for FakeConnector {
    fn create(&self, request: &ConnectionRequest) -> anyhow::Result<Box<dyn ConnectionHandle>> {
        if request.url.trim().is_empty() {
            bail!("invalid server url");
        }
        Ok(Box::new(FakeHandle::new(
            Arc::clone(&self.server),
            &request.username,
            &request.password,
        )))
    }
}

/// A ready-made session record for store-level tests.
pub fn session(server: &Arc<FakeServer>, name: &str, username: &str) -> Session {
    Session::new(
        name,
        Box::new(FakeHandle::logged_in(Arc::clone(server), username)),
        server_info(username),
    )
}

/// A unit of work that runs one probe request.
pub fn probe(handle: &mut dyn ConnectionHandle) -> anyhow::Result<()> {
    handle.apply(&ItemRequest::new(PROBE_TYPE, "get"))?;
    Ok(())
}
