// src/core/operations/raw.rs

//! Raw AML and SQL passthrough.

use super::{Gateway, ItemResponse, require};
use crate::core::errors::GatewayError;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyAmlRequest {
    pub aml: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplySqlRequest {
    pub sql: String,
}

/// Trims `aml` and wraps it in an `<AML>` envelope unless it already has one.
pub fn wrap_aml(aml: &str) -> String {
    let aml = aml.trim();
    let wrapped = aml
        .get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("<AML>"));
    if wrapped {
        aml.to_string()
    } else {
        format!("<AML>{aml}</AML>")
    }
}

impl Gateway {
    pub async fn apply_aml(&self, request: ApplyAmlRequest) -> Result<ItemResponse, GatewayError> {
        require("aml", &request.aml)?;
        let aml = wrap_aml(&request.aml);
        self.manager
            .run(move |handle| {
                let result = handle.apply_aml(&aml)?;
                ItemResponse::from_result(result, "AML executed successfully")
            })
            .await
    }

    pub async fn apply_sql(&self, request: ApplySqlRequest) -> Result<ItemResponse, GatewayError> {
        require("sql", &request.sql)?;
        let sql = request.sql;
        self.manager
            .run(move |handle| {
                let result = handle.apply_sql(&sql)?;
                ItemResponse::from_result(result, "SQL executed successfully")
            })
            .await
    }
}
