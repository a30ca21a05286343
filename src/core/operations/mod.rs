// src/core/operations/mod.rs

//! Thin operations built on the execute primitive.
//!
//! Each operation validates its request, turns it into a unit of work and runs
//! it against the caller's current session. A fault reported by the server is
//! part of the response (`success: false`), not an error; errors are reserved
//! for a missing session, a malformed request, or a broken transport.

mod assert;
mod item;
mod lifecycle;
mod lock;
mod raw;
mod utility;

pub use assert::{AssertExistsRequest, AssertPropertyRequest, AssertStateRequest};
pub use item::{
    CreateItemRequest, DeleteItemRequest, GetByIdRequest, GetByKeyedNameRequest, QueryRequest,
    UpdateItemRequest,
};
pub use lifecycle::PromoteRequest;
pub use lock::LockRequest;
pub use raw::{ApplyAmlRequest, ApplySqlRequest, wrap_aml};
pub use utility::{LogMessageRequest, MAX_WAIT, SetVariableRequest, WaitRequest};

use crate::core::connection::{ItemRequest, ItemResult};
use crate::core::errors::GatewayError;
use crate::core::session::SessionManager;
use serde::Serialize;
use serde_json::Value;

/// The outcome of an item-level operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub item_count: usize,
}

impl ItemResponse {
    pub fn ok(message: impl Into<String>, data: Option<Value>, item_count: usize) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            item_count,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            item_count: 0,
        }
    }

    /// Maps a raw `apply` result: a server fault becomes a failed response,
    /// otherwise the returned items are carried as JSON data.
    fn from_result(result: ItemResult, success_message: &str) -> anyhow::Result<Self> {
        if let Some(fault) = result.fault {
            return Ok(Self::failed(fault));
        }
        let item_count = result.items.len();
        let data = serde_json::to_value(&result.items)?;
        Ok(Self::ok(success_message, Some(data), item_count))
    }
}

/// The outcome of an assertion. `success` says whether the check could be run;
/// `passed` says whether it held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResponse {
    pub success: bool,
    pub passed: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<String>,
}

impl AssertionResponse {
    fn unavailable(message: impl Into<String>) -> Self {
        Self {
            success: false,
            passed: false,
            message: message.into(),
            actual_value: None,
            expected_value: None,
        }
    }

    fn checked(
        passed: bool,
        message: impl Into<String>,
        actual: impl Into<String>,
        expected: Option<String>,
    ) -> Self {
        Self {
            success: true,
            passed,
            message: message.into(),
            actual_value: Some(actual.into()),
            expected_value: expected,
        }
    }
}

/// Entry point for the operation layer, bound to one caller's `SessionManager`.
#[derive(Clone)]
pub struct Gateway {
    manager: SessionManager,
}

impl Gateway {
    pub fn new(manager: SessionManager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    /// Applies one request and maps the result into an `ItemResponse`.
    async fn apply_item(
        &self,
        request: ItemRequest,
        success_message: String,
    ) -> Result<ItemResponse, GatewayError> {
        self.manager
            .run(move |handle| {
                let result = handle.apply(&request)?;
                ItemResponse::from_result(result, &success_message)
            })
            .await
    }
}

/// Rejects an empty required field with a `Validation` error.
fn require(field: &str, value: &str) -> Result<(), GatewayError> {
    if value.trim().is_empty() {
        return Err(GatewayError::validation(format!("'{field}' is required")));
    }
    Ok(())
}
