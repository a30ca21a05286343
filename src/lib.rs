// src/lib.rs

pub mod config;
pub mod core;
pub mod logging;

// Re-export
pub use crate::core::{GatewayError, SessionManager, SessionStore};
