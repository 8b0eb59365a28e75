//! Purpose: Resource (route) management and export under one gateway.
//! Exports: `Resource`, `ResourceLabel`, `ResourceBackend`, `ResourceQuery`, `ResourceInput`,
//! Exports: `ResourceAuthConfig`, `BackendConfig`, `ExportRequest`, `ExportScope`, `ExportFormat`.
//! Role: `GatewayHandle` methods for `/gateways/{id}/resources/`.
//! Invariants: Export always resolves to a file on disk, never an inline body.
#![allow(clippy::result_large_err)]

use serde::{Deserialize, Serialize};

use super::client::{ApiResult, RequestOptions};
use super::envelope::ResponseType;
use super::gateways::{CreatedId, GatewayHandle};
use super::pagination::{Page, PageQuery};
use crate::core::error::{Error, ErrorKind};
use crate::core::payload::DownloadedFile;
use crate::core::task_key::Method;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub allow_apply_permission: bool,
    #[serde(default)]
    pub labels: Vec<ResourceLabel>,
    #[serde(default)]
    pub backend: Option<ResourceBackend>,
    #[serde(default)]
    pub updated_time: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceLabel {
    pub id: u64,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceBackend {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ResourceQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    #[serde(flatten)]
    pub page: PageQuery,
}

/// Create/update body; the CLI reads it from a JSON document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub match_subpath: bool,
    #[serde(default = "default_true")]
    pub is_public: bool,
    #[serde(default = "default_true")]
    pub allow_apply_permission: bool,
    #[serde(default)]
    pub auth_config: ResourceAuthConfig,
    pub backend: BackendConfig,
    #[serde(default)]
    pub label_ids: Vec<u64>,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceAuthConfig {
    pub auth_verified_required: bool,
    pub app_verified_required: bool,
    pub resource_perm_required: bool,
}

impl Default for ResourceAuthConfig {
    fn default() -> Self {
        Self {
            auth_verified_required: true,
            app_verified_required: true,
            resource_perm_required: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackendConfig {
    pub id: u64,
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportScope {
    #[default]
    All,
    Selected,
    Filtered,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Yaml,
    Json,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ExportRequest {
    pub export_type: ExportScope,
    pub file_type: ExportFormat,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource_ids: Vec<u64>,
}

impl GatewayHandle {
    pub async fn list_resources(&self, query: &ResourceQuery) -> ApiResult<Page<Resource>> {
        self.fetch("resources/", query).await
    }

    pub async fn get_resource(&self, resource_id: u64) -> ApiResult<Resource> {
        self.fetch(&format!("resources/{resource_id}/"), &()).await
    }

    pub async fn create_resource(&self, body: &ResourceInput) -> ApiResult<CreatedId> {
        self.mutate_json(Method::Post, "resources/", body).await
    }

    pub async fn update_resource(&self, resource_id: u64, body: &ResourceInput) -> ApiResult<()> {
        self.mutate(Method::Put, &format!("resources/{resource_id}/"), body)
            .await
    }

    pub async fn delete_resources(&self, resource_ids: &[u64]) -> ApiResult<()> {
        self.mutate(
            Method::Delete,
            "resources/batch/",
            &serde_json::json!({ "ids": resource_ids }),
        )
        .await
    }

    /// Downloads the export into the configured download directory.
    pub async fn export_resources(&self, request: &ExportRequest) -> ApiResult<DownloadedFile> {
        if request.export_type == ExportScope::Selected && request.resource_ids.is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("selected export needs at least one resource id"));
        }
        self.client
            .request(
                Method::Post,
                &self.path("resources/export/"),
                request,
                RequestOptions::new().with_response_type(ResponseType::Blob),
            )
            .await?
            .into_download()
    }
}
