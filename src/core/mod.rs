// src/core/mod.rs

//! The central module containing the session core and the operations built on it.

pub mod connection;
pub mod errors;
pub mod metrics;
pub mod operations;
pub mod session;

pub use errors::{ErrorKind, GatewayError};
pub use session::{SessionManager, SessionStore};
