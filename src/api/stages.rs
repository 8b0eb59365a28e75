//! Purpose: Stage (environment) management under one gateway.
//! Exports: `Stage`, `StageRelease`, `StageInput`.
//! Role: `GatewayHandle` methods for `/gateways/{id}/stages/`.
#![allow(clippy::result_large_err)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::client::ApiResult;
use super::gateways::{CreatedId, GatewayHandle, StatusBody};
use crate::core::task_key::Method;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
    #[serde(default)]
    pub release: Option<StageRelease>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub updated_time: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageRelease {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub resource_version_display: Option<String>,
}

/// Body for both create and update.
#[derive(Clone, Debug, Default, Serialize)]
pub struct StageInput {
    pub name: String,
    pub description: String,
    pub vars: BTreeMap<String, String>,
}

impl GatewayHandle {
    pub async fn list_stages(&self) -> ApiResult<Vec<Stage>> {
        self.fetch("stages/", &()).await
    }

    pub async fn get_stage(&self, stage_id: u64) -> ApiResult<Stage> {
        self.fetch(&format!("stages/{stage_id}/"), &()).await
    }

    pub async fn create_stage(&self, body: &StageInput) -> ApiResult<CreatedId> {
        self.mutate_json(Method::Post, "stages/", body).await
    }

    pub async fn update_stage(&self, stage_id: u64, body: &StageInput) -> ApiResult<()> {
        self.mutate(Method::Put, &format!("stages/{stage_id}/"), body)
            .await
    }

    pub async fn update_stage_status(&self, stage_id: u64, active: bool) -> ApiResult<()> {
        self.mutate(
            Method::Put,
            &format!("stages/{stage_id}/status/"),
            &StatusBody::from_active(active),
        )
        .await
    }

    pub async fn delete_stage(&self, stage_id: u64) -> ApiResult<()> {
        self.mutate(Method::Delete, &format!("stages/{stage_id}/"), &())
            .await
    }
}
