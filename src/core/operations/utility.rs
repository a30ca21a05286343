// src/core/operations/utility.rs

//! Test-plan helpers that act on the session record rather than the server.

use super::{Gateway, ItemResponse, require};
use crate::core::errors::GatewayError;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// The longest pause `wait` accepts.
pub const MAX_WAIT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetVariableRequest {
    pub name: String,
    /// `None` or `null` removes the variable.
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogMessageRequest {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitRequest {
    pub duration_ms: u64,
}

impl Gateway {
    pub fn set_variable(&self, request: SetVariableRequest) -> Result<ItemResponse, GatewayError> {
        require("name", &request.name)?;
        let cleared = request.value.as_ref().is_none_or(Value::is_null);
        self.manager.set_variable(&request.name, request.value)?;
        let message = if cleared {
            format!("Variable '{}' cleared", request.name)
        } else {
            format!("Variable '{}' set", request.name)
        };
        Ok(ItemResponse::ok(message, None, 0))
    }

    pub fn log_message(&self, request: LogMessageRequest) -> Result<ItemResponse, GatewayError> {
        self.manager.add_log(&request.message);
        Ok(ItemResponse::ok("Message logged", None, 0))
    }

    /// Pauses the caller. Does not touch, or require, a session.
    ///
    /// Returns `GatewayError::Cancelled` as soon as `cancel` fires.
    pub async fn wait(
        &self,
        request: WaitRequest,
        cancel: &CancellationToken,
    ) -> Result<ItemResponse, GatewayError> {
        let duration = Duration::from_millis(request.duration_ms);
        if duration > MAX_WAIT {
            return Err(GatewayError::validation(format!(
                "'durationMs' cannot exceed {}",
                MAX_WAIT.as_millis()
            )));
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(GatewayError::cancelled("Wait was cancelled."));
            }
            _ = tokio::time::sleep(duration) => {}
        }
        Ok(ItemResponse::ok(
            format!("Waited {} ms", request.duration_ms),
            Some(json!({ "durationMs": request.duration_ms })),
            0,
        ))
    }
}
