// src/core/operations/assert.rs

//! Assertions used by test plans to check server state.

use super::{AssertionResponse, Gateway, require};
use crate::core::connection::ItemRequest;
use crate::core::errors::GatewayError;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertExistsRequest {
    pub item_type: String,
    #[serde(default)]
    pub criteria: BTreeMap<String, String>,
}

impl AssertExistsRequest {
    fn to_item_request(&self) -> ItemRequest {
        let mut request = ItemRequest::new(&self.item_type, "get");
        for (name, value) in &self.criteria {
            request = request.with_property(name, value);
        }
        request
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertPropertyRequest {
    pub item_type: String,
    pub id: String,
    pub property: String,
    /// `None` expects the property to be empty or missing.
    #[serde(default)]
    pub expected: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertStateRequest {
    pub item_type: String,
    pub id: String,
    pub expected_state: String,
}

impl Gateway {
    pub async fn assert_item_exists(
        &self,
        request: AssertExistsRequest,
    ) -> Result<AssertionResponse, GatewayError> {
        require("itemType", &request.item_type)?;
        self.manager
            .run(move |handle| {
                let result = handle.apply(&request.to_item_request())?;
                // A fault counts as "nothing found".
                let count = if result.is_error() { 0 } else { result.item_count() };
                let passed = count > 0;
                let message = if passed {
                    format!("Found {count} matching item(s)")
                } else {
                    "No matching items found".to_string()
                };
                Ok(AssertionResponse::checked(
                    passed,
                    message,
                    count.to_string(),
                    Some(">0".to_string()),
                ))
            })
            .await
    }

    pub async fn assert_item_not_exists(
        &self,
        request: AssertExistsRequest,
    ) -> Result<AssertionResponse, GatewayError> {
        require("itemType", &request.item_type)?;
        self.manager
            .run(move |handle| {
                let result = handle.apply(&request.to_item_request())?;
                let count = if result.is_error() { 0 } else { result.item_count() };
                let passed = count == 0;
                let message = if passed {
                    "No matching items found (as expected)".to_string()
                } else {
                    format!("Found {count} matching item(s) - expected none")
                };
                Ok(AssertionResponse::checked(
                    passed,
                    message,
                    count.to_string(),
                    Some("0".to_string()),
                ))
            })
            .await
    }

    pub async fn assert_property_value(
        &self,
        request: AssertPropertyRequest,
    ) -> Result<AssertionResponse, GatewayError> {
        require("itemType", &request.item_type)?;
        require("id", &request.id)?;
        require("property", &request.property)?;
        self.manager
            .run(move |handle| {
                let result =
                    handle.apply(&ItemRequest::get_by_id(&request.item_type, &request.id))?;
                if let Some(fault) = result.fault {
                    return Ok(AssertionResponse::unavailable(fault));
                }
                let actual = result
                    .items
                    .first()
                    .and_then(|item| item.property(&request.property))
                    .unwrap_or_default()
                    .to_string();
                let expected = request.expected.clone().unwrap_or_default();
                let passed = actual == expected;
                let message = if passed {
                    "Property value matches".to_string()
                } else {
                    format!("Expected '{expected}' but got '{actual}'")
                };
                Ok(AssertionResponse::checked(
                    passed,
                    message,
                    actual,
                    request.expected,
                ))
            })
            .await
    }

    pub async fn assert_state(
        &self,
        request: AssertStateRequest,
    ) -> Result<AssertionResponse, GatewayError> {
        require("itemType", &request.item_type)?;
        require("id", &request.id)?;
        require("expectedState", &request.expected_state)?;
        self.manager
            .run(move |handle| {
                let result =
                    handle.apply(&ItemRequest::get_by_id(&request.item_type, &request.id))?;
                if let Some(fault) = result.fault {
                    return Ok(AssertionResponse::unavailable(fault));
                }
                let actual = result
                    .items
                    .first()
                    .and_then(|item| item.property("state"))
                    .unwrap_or_default()
                    .to_string();
                let passed = actual == request.expected_state;
                let message = if passed {
                    "State matches".to_string()
                } else {
                    format!(
                        "Expected state '{}' but got '{}'",
                        request.expected_state, actual
                    )
                };
                Ok(AssertionResponse::checked(
                    passed,
                    message,
                    actual,
                    Some(request.expected_state),
                ))
            })
            .await
    }
}
