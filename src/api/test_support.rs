//! Purpose: Scripted in-memory transport for unit tests of API modules.
//! Exports: `ScriptedTransport`, `scripted_client`, `scripted_client_in`.
//! Role: Test-only; records requests and replays canned responses by method + path.
//! Invariants: Unscripted requests get a 404 so missing routes fail loudly.
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use super::client::HttpClient;
use super::transport::{Transport, TransportRequest, TransportResponse};
use crate::core::config::{ClientConfig, CookieJar};
use crate::core::error::Error;
use crate::core::task_key::Method;

#[derive(Clone, Default)]
pub(crate) struct ScriptedTransport {
    routes: Arc<Mutex<HashMap<(Method, String), TransportResponse>>>,
    seen: Arc<Mutex<Vec<TransportRequest>>>,
}

impl ScriptedTransport {
    pub(crate) fn respond(&self, method: Method, path: &str, response: TransportResponse) {
        self.routes
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .insert((method, path.to_string()), response);
    }

    pub(crate) fn respond_json(&self, method: Method, path: &str, data: Value) {
        let body = serde_json::json!({"code": 0, "data": data, "message": ""});
        self.respond(method, path, TransportResponse::json(200, &body));
    }

    pub(crate) fn requests(&self) -> Vec<TransportRequest> {
        self.seen
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }

    pub(crate) fn last(&self) -> TransportRequest {
        self.requests().pop().expect("at least one request")
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &TransportRequest) -> Result<TransportResponse, Error> {
        self.seen
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(request.clone());
        let routes = self.routes.lock().unwrap_or_else(|poison| poison.into_inner());
        let path = request
            .url
            .path()
            .trim_start_matches("/backend")
            .to_string();
        Ok(routes
            .get(&(request.method, path))
            .cloned()
            .unwrap_or_else(|| TransportResponse::new(404, "")))
    }
}

pub(crate) fn scripted_client() -> (HttpClient, ScriptedTransport) {
    scripted_client_in(&std::env::temp_dir())
}

pub(crate) fn scripted_client_in(download_dir: &Path) -> (HttpClient, ScriptedTransport) {
    let config = ClientConfig::new("http://localhost:8000/backend/")
        .expect("config")
        .with_cookies(CookieJar::parse("csrftoken=test-token"))
        .with_download_dir(download_dir);
    let transport = ScriptedTransport::default();
    let client = HttpClient::new(config).with_transport(transport.clone());
    (client, transport)
}
