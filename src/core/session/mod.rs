// src/core/session/mod.rs

//! Named sessions: the record, the TTL-bounded store, the execute primitive,
//! and the manager that drives their lifecycle.

mod execute;
mod manager;
mod record;
mod resolver;
mod responses;
mod stats;
mod store;

pub use execute::SESSION_NOT_ACTIVE;
pub use manager::SessionManager;
pub use record::{ServerInfo, Session};
pub use resolver::{SessionResolver, StaticResolver};
pub use responses::*;
pub use stats::StoreStats;
pub use store::SessionStore;
