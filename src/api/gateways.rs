//! Purpose: Gateway CRUD plus the per-gateway handle used by scoped modules.
//! Exports: `Gateway`, `GatewayQuery`, `CreateGateway`, `UpdateGateway`, `CreatedId`, `GatewayHandle`.
//! Role: Typed wrappers over `/gateways/`; stages, resources, etc. hang off `GatewayHandle`.
//! Invariants: Every successful mutation evicts cached reads under the touched path.
#![allow(clippy::result_large_err)]

use serde::{Deserialize, Serialize};

use super::client::{ApiResult, HttpClient, RequestOptions};
use super::pagination::{LIST_CACHE_TTL, Page, PageQuery};
use crate::core::task_key::Method;

pub(crate) const GATEWAYS_PATH: &str = "/gateways/";

pub const STATUS_ACTIVE: i64 = 1;
pub const STATUS_INACTIVE: i64 = 0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Gateway {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub maintainers: Vec<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub updated_time: Option<String>,
}

impl Gateway {
    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct GatewayQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    #[serde(flatten)]
    pub page: PageQuery,
}

#[derive(Clone, Debug, Serialize)]
pub struct CreateGateway {
    pub name: String,
    pub description: String,
    pub is_public: bool,
    pub maintainers: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct UpdateGateway {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintainers: Option<Vec<String>>,
}

/// Create endpoints answer with the new object's id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedId {
    pub id: u64,
}

#[derive(Serialize)]
pub(crate) struct StatusBody {
    pub(crate) status: i64,
}

impl StatusBody {
    pub(crate) fn from_active(active: bool) -> Self {
        Self {
            status: if active { STATUS_ACTIVE } else { STATUS_INACTIVE },
        }
    }
}

impl HttpClient {
    pub async fn list_gateways(&self, query: &GatewayQuery) -> ApiResult<Page<Gateway>> {
        self.get(
            GATEWAYS_PATH,
            query,
            RequestOptions::new().with_cache(LIST_CACHE_TTL),
        )
        .await
    }

    pub async fn get_gateway(&self, id: u64) -> ApiResult<Gateway> {
        self.gateway(id).info().await
    }

    pub async fn create_gateway(&self, body: &CreateGateway) -> ApiResult<CreatedId> {
        let created = self
            .post(GATEWAYS_PATH, body, RequestOptions::new())
            .await?;
        self.clear_cache_prefix(GATEWAYS_PATH);
        Ok(created)
    }

    pub async fn update_gateway(&self, id: u64, body: &UpdateGateway) -> ApiResult<()> {
        let handle = self.gateway(id);
        handle.mutate(Method::Put, "", body).await
    }

    pub async fn update_gateway_status(&self, id: u64, active: bool) -> ApiResult<()> {
        let handle = self.gateway(id);
        handle
            .mutate(Method::Put, "status/", &StatusBody::from_active(active))
            .await
    }

    pub async fn delete_gateway(&self, id: u64) -> ApiResult<()> {
        let handle = self.gateway(id);
        self.delete(&handle.path(""), RequestOptions::new()).await?;
        self.clear_cache_prefix(GATEWAYS_PATH);
        Ok(())
    }

    /// Scope for gateway-level resources (stages, resources, permissions, ...).
    pub fn gateway(&self, id: u64) -> GatewayHandle {
        GatewayHandle {
            client: self.clone(),
            id,
        }
    }
}

#[derive(Clone)]
pub struct GatewayHandle {
    pub(crate) client: HttpClient,
    id: u64,
}

impl GatewayHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    pub async fn info(&self) -> ApiResult<Gateway> {
        self.client
            .get(
                &self.path(""),
                &(),
                RequestOptions::new().with_cache(LIST_CACHE_TTL),
            )
            .await
    }

    pub(crate) fn path(&self, tail: &str) -> String {
        format!("{GATEWAYS_PATH}{}/{}", self.id, tail.trim_start_matches('/'))
    }

    /// Cached read under this gateway.
    pub(crate) async fn fetch<Q, R>(&self, tail: &str, query: &Q) -> ApiResult<R>
    where
        Q: Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        self.client
            .request_json(
                Method::Get,
                &self.path(tail),
                query,
                RequestOptions::new().with_cache(LIST_CACHE_TTL),
            )
            .await
    }

    /// Write under this gateway, then drop its cached reads and the gateway list.
    pub(crate) async fn mutate<B>(&self, method: Method, tail: &str, body: &B) -> ApiResult<()>
    where
        B: Serialize + ?Sized,
    {
        self.mutate_json::<B, serde_json::Value>(method, tail, body)
            .await
            .map(|_| ())
    }

    pub(crate) async fn mutate_json<B, R>(&self, method: Method, tail: &str, body: &B) -> ApiResult<R>
    where
        B: Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let result = self
            .client
            .request_json(method, &self.path(tail), body, RequestOptions::new())
            .await?;
        self.invalidate();
        Ok(result)
    }

    /// The gateway list embeds per-gateway counters, so it goes too.
    pub(crate) fn invalidate(&self) {
        self.client.clear_cache_prefix(GATEWAYS_PATH);
    }
}
