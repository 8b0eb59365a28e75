//! Purpose: Publish resource versions to stages and browse release history.
//! Exports: `PublishRequest`, `PublishResult`, `ReleaseHistory`, `ReleaseHistoryQuery`,
//! Exports: `StageRef`, `ResourceVersionRef`.
//! Role: `GatewayHandle` methods for `/gateways/{id}/releases/`.
#![allow(clippy::result_large_err)]

use serde::{Deserialize, Serialize};

use super::client::ApiResult;
use super::gateways::GatewayHandle;
use super::pagination::{Page, PageQuery};
use crate::core::task_key::Method;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageRef {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceVersionRef {
    pub id: u64,
    #[serde(default)]
    pub version: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct PublishRequest {
    pub stage_id: u64,
    pub resource_version_id: u64,
    pub comment: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublishResult {
    /// Release history id; poll history to follow progress.
    pub id: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReleaseHistory {
    pub id: u64,
    #[serde(default)]
    pub stage: Option<StageRef>,
    #[serde(default)]
    pub resource_version: Option<ResourceVersionRef>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ReleaseHistoryQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Unix seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_end: Option<i64>,
    #[serde(flatten)]
    pub page: PageQuery,
}

impl GatewayHandle {
    pub async fn publish(&self, request: &PublishRequest) -> ApiResult<PublishResult> {
        let result = self.mutate_json(Method::Post, "releases/", request).await?;
        tracing::info!(
            gateway = self.id(),
            stage = request.stage_id,
            version = request.resource_version_id,
            "release submitted"
        );
        Ok(result)
    }

    pub async fn list_release_histories(
        &self,
        query: &ReleaseHistoryQuery,
    ) -> ApiResult<Page<ReleaseHistory>> {
        self.fetch("releases/histories/", query).await
    }
}
