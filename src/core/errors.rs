// src/core/errors.rs

//! Defines the error type that crosses the session core's public boundary.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::any::Any;
use strum_macros::{AsRefStr, Display, EnumIter, IntoStaticStr};
use thiserror::Error;

/// Every fault leaving `execute` or `connect` is one of these variants.
///
/// `Cancelled` is kept apart from `Infrastructure` so that a caller can tell
/// "the user gave up" from "the server never answered".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Infrastructure(String),

    #[error("{0}")]
    Cancelled(String),
}

/// The classification of a `GatewayError`, used by presentation layers to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, IntoStaticStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Auth,
    NotFound,
    Validation,
    Infrastructure,
    Cancelled,
}

impl ErrorKind {
    /// The HTTP status a web front-end is expected to answer with for this kind.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::Auth => 401,
            ErrorKind::NotFound => 404,
            ErrorKind::Validation => 400,
            ErrorKind::Infrastructure => 502,
            // Non-standard "client closed request", as popularised by nginx.
            ErrorKind::Cancelled => 499,
        }
    }
}

impl GatewayError {
    pub fn auth(msg: impl Into<String>) -> Self {
        GatewayError::Auth(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        GatewayError::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        GatewayError::Validation(msg.into())
    }

    pub fn infrastructure(msg: impl Into<String>) -> Self {
        GatewayError::Infrastructure(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        GatewayError::Cancelled(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Auth(_) => ErrorKind::Auth,
            GatewayError::NotFound(_) => ErrorKind::NotFound,
            GatewayError::Validation(_) => ErrorKind::Validation,
            GatewayError::Infrastructure(_) => ErrorKind::Infrastructure,
            GatewayError::Cancelled(_) => ErrorKind::Cancelled,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            GatewayError::Auth(m)
            | GatewayError::NotFound(m)
            | GatewayError::Validation(m)
            | GatewayError::Infrastructure(m)
            | GatewayError::Cancelled(m) => m,
        }
    }

    /// Re-tags an arbitrary failure coming out of a unit of work or a handle call.
    ///
    /// An error that already is a `GatewayError` passes through unchanged; anything
    /// else becomes `Infrastructure`, prefixed with `context`.
    pub fn classify(err: anyhow::Error, context: &str) -> Self {
        match err.downcast::<GatewayError>() {
            Ok(typed) => typed,
            Err(other) => GatewayError::Infrastructure(format!("{context}: {other}")),
        }
    }

    /// Converts a caught panic payload into an `Infrastructure` error.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>, context: &str) -> Self {
        let detail = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        GatewayError::Infrastructure(format!("{context}: {detail}"))
    }
}

/// The JSON body a web front-end sends back for a failed request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<&GatewayError> for ErrorResponse {
    fn from(err: &GatewayError) -> Self {
        // Infrastructure causes are reported as detail so the headline stays generic.
        let (message, detail) = match err {
            GatewayError::Infrastructure(cause) => {
                ("External system failure".to_string(), Some(cause.clone()))
            }
            other => (other.message().to_string(), None),
        };
        Self {
            success: false,
            message,
            detail,
            timestamp: Utc::now(),
        }
    }
}
