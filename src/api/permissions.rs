//! Purpose: App permission grants for a gateway's resources.
//! Exports: `AppPermission`, `PermissionQuery`, `GrantRequest`, `GrantDimension`, `RenewRequest`.
//! Role: `GatewayHandle` methods for `/gateways/{id}/permissions/app-permissions/`.
#![allow(clippy::result_large_err)]

use serde::{Deserialize, Serialize};

use super::client::ApiResult;
use super::gateways::GatewayHandle;
use super::pagination::{Page, PageQuery};
use crate::core::error::{Error, ErrorKind};
use crate::core::task_key::Method;

const APP_PERMISSIONS: &str = "permissions/app-permissions/";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppPermission {
    pub id: u64,
    pub bk_app_code: String,
    #[serde(default)]
    pub resource_id: Option<u64>,
    #[serde(default)]
    pub resource_name: Option<String>,
    #[serde(default)]
    pub resource_path: Option<String>,
    #[serde(default)]
    pub resource_method: Option<String>,
    /// `None` means the grant never expires.
    #[serde(default)]
    pub expires: Option<String>,
    #[serde(default)]
    pub grant_type: String,
    #[serde(default)]
    pub renewable: bool,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct PermissionQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bk_app_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(flatten)]
    pub page: PageQuery,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantDimension {
    /// Whole gateway.
    #[default]
    Api,
    Resource,
}

#[derive(Clone, Debug, Serialize)]
pub struct GrantRequest {
    pub bk_app_code: String,
    pub dimension: GrantDimension,
    /// `None` grants permanently.
    pub expire_days: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource_ids: Vec<u64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RenewRequest {
    pub ids: Vec<u64>,
    pub expire_days: u32,
}

impl GatewayHandle {
    pub async fn list_app_permissions(
        &self,
        query: &PermissionQuery,
    ) -> ApiResult<Page<AppPermission>> {
        self.fetch(APP_PERMISSIONS, query).await
    }

    pub async fn grant_app_permissions(&self, request: &GrantRequest) -> ApiResult<()> {
        if request.dimension == GrantDimension::Resource && request.resource_ids.is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("resource grants need at least one resource id")
                .with_hint("Pass --resource-id, or grant the whole gateway."));
        }
        self.mutate(Method::Post, APP_PERMISSIONS, request).await
    }

    pub async fn renew_app_permissions(&self, request: &RenewRequest) -> ApiResult<()> {
        self.mutate(Method::Post, &format!("{APP_PERMISSIONS}renew/"), request)
            .await
    }

    pub async fn revoke_app_permissions(&self, ids: &[u64]) -> ApiResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.mutate(
            Method::Delete,
            &format!("{APP_PERMISSIONS}delete/"),
            &serde_json::json!({ "ids": ids }),
        )
        .await
    }
}
