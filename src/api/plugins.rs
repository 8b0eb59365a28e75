//! Purpose: Plugin catalogue and plugin bindings on stages or resources.
//! Exports: `PluginScope`, `PluginType`, `PluginBinding`, `PluginConfigInput`.
//! Role: `GatewayHandle` methods for `/gateways/{id}/plugins/`.
//! Invariants: A binding always names exactly one scope (stage or resource).
#![allow(clippy::result_large_err)]

use serde::{Deserialize, Serialize};

use super::client::ApiResult;
use super::gateways::{CreatedId, GatewayHandle};
use super::pagination::{Page, PageQuery};
use crate::core::task_key::Method;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PluginScope {
    Stage(u64),
    Resource(u64),
}

impl PluginScope {
    pub fn scope_type(&self) -> &'static str {
        match self {
            PluginScope::Stage(_) => "stage",
            PluginScope::Resource(_) => "resource",
        }
    }

    pub fn scope_id(&self) -> u64 {
        match self {
            PluginScope::Stage(id) | PluginScope::Resource(id) => *id,
        }
    }

    fn path(&self, code: &str) -> String {
        format!("plugins/{}/{}/{code}/configs/", self.scope_type(), self.scope_id())
    }
}

#[derive(Serialize)]
struct ScopeQuery<'a> {
    scope_type: &'a str,
    scope_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    keyword: Option<&'a str>,
    #[serde(flatten)]
    page: PageQuery,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PluginType {
    pub id: u64,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub is_bound: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PluginBinding {
    pub id: u64,
    pub code: String,
    #[serde(default)]
    pub name: String,
    pub scope_type: String,
    pub scope_id: u64,
    #[serde(default)]
    pub config_id: Option<u64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PluginConfigInput {
    pub name: String,
    pub description: String,
    /// Plugin-specific configuration as YAML text.
    pub yaml: String,
}

impl GatewayHandle {
    pub async fn list_plugin_types(
        &self,
        scope: PluginScope,
        keyword: Option<&str>,
        page: PageQuery,
    ) -> ApiResult<Page<PluginType>> {
        let query = ScopeQuery {
            scope_type: scope.scope_type(),
            scope_id: scope.scope_id(),
            keyword,
            page,
        };
        self.fetch("plugins/", &query).await
    }

    pub async fn list_plugin_bindings(&self, code: &str) -> ApiResult<Vec<PluginBinding>> {
        self.fetch(&format!("plugins/{code}/bindings/"), &()).await
    }

    pub async fn bind_plugin(
        &self,
        scope: PluginScope,
        code: &str,
        config: &PluginConfigInput,
    ) -> ApiResult<CreatedId> {
        self.mutate_json(Method::Post, &scope.path(code), config)
            .await
    }

    pub async fn unbind_plugin(&self, scope: PluginScope, code: &str, config_id: u64) -> ApiResult<()> {
        self.mutate(Method::Delete, &format!("{}{config_id}/", scope.path(code)), &())
            .await
    }
}
