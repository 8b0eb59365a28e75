//! Purpose: Alarm strategies and alarm records for one gateway.
//! Exports: `AlarmStrategy`, `AlarmStrategyQuery`, `AlarmRecord`, `AlarmRecordQuery`.
//! Role: `GatewayHandle` methods for `/gateways/{id}/monitors/alarm/`.
#![allow(clippy::result_large_err)]

use serde::{Deserialize, Serialize};

use super::client::ApiResult;
use super::gateways::GatewayHandle;
use super::pagination::{Page, PageQuery};
use crate::core::task_key::Method;

const STRATEGIES: &str = "monitors/alarm/strategies/";
const RECORDS: &str = "monitors/alarm/records/";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlarmStrategy {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub alarm_type: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub updated_by: Option<String>,
    #[serde(default)]
    pub updated_time: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct AlarmStrategyQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alarm_type: Option<String>,
    #[serde(flatten)]
    pub page: PageQuery,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlarmRecord {
    pub id: u64,
    #[serde(default)]
    pub alarm_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub alarm_strategy_names: Vec<String>,
    #[serde(default)]
    pub created_time: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct AlarmRecordQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alarm_strategy_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Unix seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_end: Option<i64>,
    #[serde(flatten)]
    pub page: PageQuery,
}

#[derive(Serialize)]
struct EnabledBody {
    enabled: bool,
}

impl GatewayHandle {
    pub async fn list_alarm_strategies(
        &self,
        query: &AlarmStrategyQuery,
    ) -> ApiResult<Page<AlarmStrategy>> {
        self.fetch(STRATEGIES, query).await
    }

    pub async fn set_alarm_strategy_enabled(&self, strategy_id: u64, enabled: bool) -> ApiResult<()> {
        self.mutate(
            Method::Patch,
            &format!("{STRATEGIES}{strategy_id}/status/"),
            &EnabledBody { enabled },
        )
        .await
    }

    pub async fn list_alarm_records(&self, query: &AlarmRecordQuery) -> ApiResult<Page<AlarmRecord>> {
        self.fetch(RECORDS, query).await
    }
}

#[cfg(test)]
mod tests {
    use super::{AlarmRecordQuery, AlarmStrategyQuery};
    use crate::api::test_support::scripted_client;
    use crate::core::task_key::Method;
    use serde_json::json;

    #[tokio::test]
    async fn toggles_strategy_with_patch() {
        let (client, transport) = scripted_client();
        let handle = client.gateway(2);
        transport.respond_json(
            Method::Get,
            "/gateways/2/monitors/alarm/strategies/",
            json!({"count": 1, "results": [{"id": 4, "name": "5xx", "enabled": true}]}),
        );
        transport.respond_json(
            Method::Patch,
            "/gateways/2/monitors/alarm/strategies/4/status/",
            json!(null),
        );
        let page = handle
            .list_alarm_strategies(&AlarmStrategyQuery::default())
            .await
            .expect("strategies");
        assert!(page.results[0].enabled);
        handle
            .set_alarm_strategy_enabled(4, false)
            .await
            .expect("toggle");
        assert_eq!(
            transport.last().body.as_deref(),
            Some(br#"{"enabled":false}"#.as_slice())
        );
    }

    #[tokio::test]
    async fn record_window_goes_to_query() {
        let (client, transport) = scripted_client();
        transport.respond_json(
            Method::Get,
            "/gateways/2/monitors/alarm/records/",
            json!({"count": 0, "results": []}),
        );
        let query = AlarmRecordQuery {
            time_start: Some(1_700_000_000),
            time_end: Some(1_700_003_600),
            ..AlarmRecordQuery::default()
        };
        let page = client
            .gateway(2)
            .list_alarm_records(&query)
            .await
            .expect("records");
        assert!(page.results.is_empty());
        assert_eq!(
            transport.last().url.query(),
            Some("limit=10&offset=0&time_end=1700003600&time_start=1700000000")
        );
    }
}
