//! Purpose: In-process fake of the gateway management backend for integration tests.
//! Exports: `Backend`, `spawn_backend`, `CSRF_TOKEN`.
//! Role: Speaks the real wire shapes (envelopes, 401 login bodies, attachments) over HTTP.
//! Invariants: Every handler records its route so tests can count network hits.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub const CSRF_TOKEN: &str = "test-csrf-token";
pub const LOGIN_URL: &str = "http://login.example/?c_url=/";

const GATEWAY_NAMES: [&str; 3] = ["alpha", "beta", "gamma"];

#[derive(Clone, Default)]
pub struct Backend {
    hits: Arc<Mutex<Vec<String>>>,
    csrf: Arc<Mutex<Vec<Option<String>>>>,
}

impl Backend {
    pub fn hits(&self, route: &str) -> usize {
        self.hits
            .lock()
            .expect("hits lock")
            .iter()
            .filter(|hit| hit.as_str() == route)
            .count()
    }

    pub fn csrf_seen(&self) -> Vec<Option<String>> {
        self.csrf.lock().expect("csrf lock").clone()
    }

    fn record(&self, route: &str, headers: &HeaderMap) {
        self.hits.lock().expect("hits lock").push(route.to_string());
        let token = headers
            .get("x-csrftoken")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        self.csrf.lock().expect("csrf lock").push(token);
    }
}

pub fn cookie_header() -> String {
    format!("csrftoken={CSRF_TOKEN}")
}

/// Starts the fake on an ephemeral port; returns the `/backend/` base URL.
pub async fn spawn_backend() -> (String, Backend) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let backend = Backend::default();
    let app = Router::new()
        .route("/backend/gateways/", get(list_gateways).post(create_gateway))
        .route("/backend/gateways/:id/", get(get_gateway))
        .route("/backend/gateways/:id/stages/", get(slow_stages))
        .route(
            "/backend/gateways/:id/resources/export/",
            post(export_resources),
        )
        .route("/backend/accounts/userinfo/", get(userinfo))
        .with_state(backend.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (format!("http://{addr}/backend/"), backend)
}

fn envelope(data: Value) -> Json<Value> {
    Json(json!({"code": 0, "data": data, "message": ""}))
}

fn gateway_json(index: usize) -> Value {
    json!({
        "id": index as u64 + 1,
        "name": GATEWAY_NAMES[index],
        "description": format!("{} gateway", GATEWAY_NAMES[index]),
        "status": 1,
        "is_public": true,
        "maintainers": ["admin"],
    })
}

async fn list_gateways(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    backend.record("GET /gateways/", &headers);
    let limit = query
        .get("limit")
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(10);
    let offset = query
        .get("offset")
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(0);
    let results: Vec<Value> = (0..GATEWAY_NAMES.len())
        .skip(offset)
        .take(limit)
        .map(gateway_json)
        .collect();
    envelope(json!({"count": GATEWAY_NAMES.len(), "results": results}))
}

async fn create_gateway(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    backend.record("POST /gateways/", &headers);
    let token = headers.get("x-csrftoken").and_then(|value| value.to_str().ok());
    if token != Some(CSRF_TOKEN) {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"detail": "CSRF Failed: CSRF token missing."})),
        )
            .into_response();
    }
    if body.get("name").and_then(Value::as_str) == Some("taken") {
        return Json(json!({
            "result": false,
            "code": "1640001",
            "message": "gateway name already exists",
            "data": null,
        }))
        .into_response();
    }
    (StatusCode::CREATED, envelope(json!({"id": 42}))).into_response()
}

async fn get_gateway(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    backend.record("GET /gateways/:id/", &headers);
    if id == 1 {
        return envelope(gateway_json(0)).into_response();
    }
    (
        StatusCode::NOT_FOUND,
        Json(json!({"code": "NotFound", "message": "gateway not found", "data": null})),
    )
        .into_response()
}

async fn slow_stages(State(backend): State<Backend>, headers: HeaderMap) -> Json<Value> {
    backend.record("GET /gateways/:id/stages/", &headers);
    tokio::time::sleep(Duration::from_millis(500)).await;
    envelope(json!([]))
}

async fn export_resources(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    backend.record("POST /gateways/:id/resources/export/", &headers);
    (
        [
            (header::CONTENT_TYPE, "application/octet-stream"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"resources.yaml\"",
            ),
        ],
        "swagger: '2.0'\npaths: {}\n",
    )
        .into_response()
}

async fn userinfo(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    backend.record("GET /accounts/userinfo/", &headers);
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "code": "Unauthorized",
            "message": "user not logged in",
            "data": {"login_url": LOGIN_URL},
        })),
    )
        .into_response()
}
