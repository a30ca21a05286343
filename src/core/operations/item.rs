// src/core/operations/item.rs

//! Item CRUD: query, lookups, create, update, delete, purge.

use super::{Gateway, ItemResponse, require};
use crate::core::connection::ItemRequest;
use crate::core::errors::GatewayError;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub item_type: String,
    #[serde(default)]
    pub select: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Property filters; a value containing `%` is matched with `like`.
    #[serde(default)]
    pub criteria: BTreeMap<String, String>,
}

fn default_page() -> u32 {
    1
}
fn default_page_size() -> u32 {
    100
}

impl QueryRequest {
    pub fn new(item_type: impl Into<String>) -> Self {
        Self {
            item_type: item_type.into(),
            select: None,
            page: default_page(),
            page_size: default_page_size(),
            criteria: BTreeMap::new(),
        }
    }

    fn to_item_request(&self) -> ItemRequest {
        let mut request = ItemRequest::new(&self.item_type, "get")
            .with_attribute("page", self.page.to_string())
            .with_attribute("pagesize", self.page_size.to_string());
        if let Some(select) = self.select.as_deref().filter(|s| !s.is_empty()) {
            request = request.with_attribute("select", select);
        }
        for (name, value) in &self.criteria {
            request = request.with_property(name, value);
            if value.contains('%') {
                request = request.with_condition(name, "like");
            }
        }
        request
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetByIdRequest {
    pub item_type: String,
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetByKeyedNameRequest {
    pub item_type: String,
    pub keyed_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    pub item_type: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub item_type: String,
    pub id: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteItemRequest {
    pub item_type: String,
    pub id: String,
}

fn with_properties(mut request: ItemRequest, properties: &BTreeMap<String, String>) -> ItemRequest {
    for (name, value) in properties {
        request = request.with_property(name, value);
    }
    request
}

impl Gateway {
    pub async fn query_items(&self, request: QueryRequest) -> Result<ItemResponse, GatewayError> {
        require("itemType", &request.item_type)?;
        if request.page == 0 || request.page_size == 0 {
            return Err(GatewayError::validation(
                "'page' and 'pageSize' must be at least 1",
            ));
        }
        self.apply_item(request.to_item_request(), "Query successful".into())
            .await
    }

    pub async fn get_item_by_id(
        &self,
        request: GetByIdRequest,
    ) -> Result<ItemResponse, GatewayError> {
        require("itemType", &request.item_type)?;
        require("id", &request.id)?;
        self.apply_item(
            ItemRequest::get_by_id(request.item_type, request.id),
            "Item retrieved".into(),
        )
        .await
    }

    pub async fn get_item_by_keyed_name(
        &self,
        request: GetByKeyedNameRequest,
    ) -> Result<ItemResponse, GatewayError> {
        require("itemType", &request.item_type)?;
        require("keyedName", &request.keyed_name)?;
        self.apply_item(
            ItemRequest::new(request.item_type, "get").with_property("keyed_name", request.keyed_name),
            "Item retrieved".into(),
        )
        .await
    }

    pub async fn create_item(
        &self,
        request: CreateItemRequest,
    ) -> Result<ItemResponse, GatewayError> {
        require("itemType", &request.item_type)?;
        let item = with_properties(ItemRequest::new(&request.item_type, "add"), &request.properties);
        self.apply_item(item, "Item created successfully".into())
            .await
    }

    pub async fn update_item(
        &self,
        request: UpdateItemRequest,
    ) -> Result<ItemResponse, GatewayError> {
        require("itemType", &request.item_type)?;
        require("id", &request.id)?;
        let item = with_properties(
            ItemRequest::new(&request.item_type, "edit").with_id(&request.id),
            &request.properties,
        );
        self.apply_item(item, "Item updated successfully".into())
            .await
    }

    pub async fn delete_item(
        &self,
        request: DeleteItemRequest,
    ) -> Result<ItemResponse, GatewayError> {
        require("itemType", &request.item_type)?;
        require("id", &request.id)?;
        self.apply_item(
            ItemRequest::new(request.item_type, "delete").with_id(request.id),
            "Item deleted successfully".into(),
        )
        .await
    }

    /// Like `delete_item`, but bypasses versioning on the server.
    pub async fn purge_item(
        &self,
        request: DeleteItemRequest,
    ) -> Result<ItemResponse, GatewayError> {
        require("itemType", &request.item_type)?;
        require("id", &request.id)?;
        self.apply_item(
            ItemRequest::new(request.item_type, "purge").with_id(request.id),
            "Item purged successfully".into(),
        )
        .await
    }
}
