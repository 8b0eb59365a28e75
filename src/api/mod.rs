//! Purpose: Define the public Rust API boundary for the gateway management client.
//! Exports: `HttpClient` and its options, transport seam, hooks, DTOs, and shared core types.
//! Role: Public, additive-only surface; the CLI and embedders import from here only.
//! Invariants: Request state lives in an injected `RequestRegistry`, never in globals.
//! Invariants: Every fallible operation returns the crate `Error`.

mod client;
mod envelope;
mod gateways;
mod hooks;
mod monitoring;
mod pagination;
mod permissions;
mod plugins;
mod releases;
mod resources;
mod sdks;
mod stages;
#[cfg(test)]
mod test_support;
mod transport;

pub use crate::core::config::{ClientConfig, CookieJar, timeout_from_millis};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorCode, ErrorKind};
pub use crate::core::payload::{DownloadedFile, Payload};
pub use crate::core::registry::{CachePolicy, PendingResult, RequestRegistry};
pub use crate::core::task_key::{Method, TaskKey};
pub use client::{ApiResult, HttpClient, RequestOptions};
pub use envelope::{ResponseType, interpret_response, login_url_hint, unwrap_envelope};
pub use gateways::{
    CreateGateway, CreatedId, Gateway, GatewayHandle, GatewayQuery, STATUS_ACTIVE, STATUS_INACTIVE,
    UpdateGateway,
};
pub use hooks::{ClientHooks, TracingHooks};
pub use monitoring::{AlarmRecord, AlarmRecordQuery, AlarmStrategy, AlarmStrategyQuery};
pub use pagination::{DEFAULT_PAGE_SIZE, LIST_CACHE_TTL, Page, PageQuery, Paginator};
pub use permissions::{AppPermission, GrantDimension, GrantRequest, PermissionQuery, RenewRequest};
pub use plugins::{PluginBinding, PluginConfigInput, PluginScope, PluginType};
pub use releases::{
    PublishRequest, PublishResult, ReleaseHistory, ReleaseHistoryQuery, ResourceVersionRef,
    StageRef,
};
pub use resources::{
    BackendConfig, ExportFormat, ExportRequest, ExportScope, Resource, ResourceAuthConfig,
    ResourceBackend, ResourceInput, ResourceLabel, ResourceQuery,
};
pub use sdks::{GenerateSdk, Sdk, SdkLanguage, SdkQuery};
pub use stages::{Stage, StageInput, StageRelease};
pub use transport::{Transport, TransportRequest, TransportResponse, UreqTransport};
