// src/core/operations/lifecycle.rs

//! Lifecycle state: promotion and current-state lookup.

use super::item::GetByIdRequest;
use super::{Gateway, ItemResponse, require};
use crate::core::connection::ItemRequest;
use crate::core::errors::GatewayError;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoteRequest {
    pub item_type: String,
    pub id: String,
    pub target_state: String,
    #[serde(default)]
    pub comments: Option<String>,
}

impl Gateway {
    pub async fn promote_item(
        &self,
        request: PromoteRequest,
    ) -> Result<ItemResponse, GatewayError> {
        require("itemType", &request.item_type)?;
        require("id", &request.id)?;
        require("targetState", &request.target_state)?;

        let success_message = format!("Item promoted to {}", request.target_state);
        self.manager
            .run(move |handle| {
                let fetched =
                    handle.apply(&ItemRequest::get_by_id(&request.item_type, &request.id))?;
                if let Some(fault) = fetched.fault {
                    return Ok(ItemResponse::failed(fault));
                }
                let promote = ItemRequest::new(&request.item_type, "promoteItem")
                    .with_id(&request.id)
                    .with_attribute("state", &request.target_state)
                    .with_attribute("comments", request.comments.as_deref().unwrap_or_default());
                let result = handle.apply(&promote)?;
                ItemResponse::from_result(result, &success_message)
            })
            .await
    }

    pub async fn get_current_state(
        &self,
        request: GetByIdRequest,
    ) -> Result<ItemResponse, GatewayError> {
        require("itemType", &request.item_type)?;
        require("id", &request.id)?;
        self.manager
            .run(move |handle| {
                let result =
                    handle.apply(&ItemRequest::get_by_id(&request.item_type, &request.id))?;
                if let Some(fault) = result.fault {
                    return Ok(ItemResponse::failed(fault));
                }
                let state = result
                    .items
                    .first()
                    .and_then(|item| item.property("state"))
                    .unwrap_or("Unknown")
                    .to_string();
                Ok(ItemResponse::ok(
                    format!("Current state: {state}"),
                    Some(json!({ "state": state })),
                    result.items.len(),
                ))
            })
            .await
    }
}
