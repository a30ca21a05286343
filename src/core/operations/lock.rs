// src/core/operations/lock.rs

//! Locking: lock, unlock, check-lock-status.

use super::{Gateway, ItemResponse, require};
use crate::core::connection::{ConnectionHandle, ItemRequest, ItemResult};
use crate::core::errors::GatewayError;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRequest {
    pub item_type: String,
    pub id: String,
}

impl LockRequest {
    fn validate(&self) -> Result<(), GatewayError> {
        require("itemType", &self.item_type)?;
        require("id", &self.id)
    }
}

/// Fetches the item first so a missing item reports the server's fault, then
/// applies `action` to it.
fn fetch_then(
    handle: &mut dyn ConnectionHandle,
    request: &LockRequest,
    action: &str,
) -> anyhow::Result<ItemResult> {
    let fetched = handle.apply(&ItemRequest::get_by_id(&request.item_type, &request.id))?;
    if fetched.is_error() {
        return Ok(fetched);
    }
    handle.apply(&ItemRequest::new(&request.item_type, action).with_id(&request.id))
}

impl Gateway {
    pub async fn lock_item(&self, request: LockRequest) -> Result<ItemResponse, GatewayError> {
        request.validate()?;
        self.manager
            .run(move |handle| {
                let result = fetch_then(handle, &request, "lock")?;
                ItemResponse::from_result(result, "Item locked successfully")
            })
            .await
    }

    pub async fn unlock_item(&self, request: LockRequest) -> Result<ItemResponse, GatewayError> {
        request.validate()?;
        self.manager
            .run(move |handle| {
                let result = fetch_then(handle, &request, "unlock")?;
                ItemResponse::from_result(result, "Item unlocked successfully")
            })
            .await
    }

    /// Reports whether the item is locked, and by whom, as `{isLocked, lockedById}`.
    pub async fn check_lock_status(
        &self,
        request: LockRequest,
    ) -> Result<ItemResponse, GatewayError> {
        request.validate()?;
        self.manager
            .run(move |handle| {
                let result =
                    handle.apply(&ItemRequest::get_by_id(&request.item_type, &request.id))?;
                if let Some(fault) = result.fault {
                    return Ok(ItemResponse::failed(fault));
                }
                let locked_by_id = result
                    .items
                    .first()
                    .and_then(|item| item.property("locked_by_id"))
                    .unwrap_or_default()
                    .to_string();
                let is_locked = !locked_by_id.is_empty();
                let message = if is_locked {
                    "Item is locked"
                } else {
                    "Item is unlocked"
                };
                Ok(ItemResponse::ok(
                    message,
                    Some(json!({ "isLocked": is_locked, "lockedById": locked_by_id })),
                    result.items.len(),
                ))
            })
            .await
    }
}
