//! Purpose: Define a stable, structured schema for non-fatal stderr notices.
//! Exports: `Notice`, `notice_json`, `notice_time_now`, `NoticeHooks`.
//! Role: Turns client hook events (request failures, login required) into CLI diagnostics.
//! Invariants: Notices are non-fatal and never alter stdout payloads.
//! Invariants: JSON schema is stable once published; fields are additive-only.
use std::io::{self, IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value, json};

use crate::api::{ClientHooks, Error, TaskKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: String,
    pub time: String,
    pub cmd: String,
    pub key: String,
    pub message: String,
    pub details: Map<String, Value>,
}

impl Notice {
    pub fn request_failed(cmd: &str, key: &TaskKey, err: &Error) -> Self {
        let mut details = Map::new();
        details.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
        if let Some(status) = err.status() {
            details.insert("status".to_string(), json!(status));
        }
        if let Some(code) = err.code() {
            details.insert("code".to_string(), json!(code.to_string()));
        }
        Self {
            kind: "request_failed".to_string(),
            time: notice_time_now().unwrap_or_default(),
            cmd: cmd.to_string(),
            key: key.to_string(),
            message: err.message().unwrap_or("request failed").to_string(),
            details,
        }
    }

    pub fn login_required(cmd: &str, login_url: Option<&str>) -> Self {
        let mut details = Map::new();
        if let Some(url) = login_url {
            details.insert("login_url".to_string(), json!(url));
        }
        Self {
            kind: "login_required".to_string(),
            time: notice_time_now().unwrap_or_default(),
            cmd: cmd.to_string(),
            key: String::new(),
            message: "session expired; log in again".to_string(),
            details,
        }
    }
}

pub fn notice_json(notice: &Notice) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(notice.kind));
    inner.insert("time".to_string(), json!(notice.time));
    inner.insert("cmd".to_string(), json!(notice.cmd));
    if !notice.key.is_empty() {
        inner.insert("key".to_string(), json!(notice.key));
    }
    inner.insert("message".to_string(), json!(notice.message));
    inner.insert("details".to_string(), Value::Object(notice.details.clone()));

    let mut outer = Map::new();
    outer.insert("notice".to_string(), Value::Object(inner));
    Value::Object(outer)
}

pub fn notice_time_now() -> Option<String> {
    use time::format_description::well_known::Rfc3339;
    let duration = SystemTime::now().duration_since(UNIX_EPOCH).ok()?;
    let ts = time::OffsetDateTime::from_unix_timestamp_nanos(duration.as_nanos() as i128).ok()?;
    ts.format(&Rfc3339).ok()
}

/// Client hooks that print notices to stderr: one JSON line each, or a short
/// text line when stderr is a terminal.
#[derive(Debug, Clone)]
pub struct NoticeHooks {
    cmd: String,
}

impl NoticeHooks {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }

    fn emit(&self, notice: &Notice) {
        let mut stderr = io::stderr().lock();
        if stderr.is_terminal() {
            let _ = writeln!(stderr, "notice: {}", notice.message);
            return;
        }
        let line = serde_json::to_string(&notice_json(notice)).unwrap_or_else(|_| {
            "{\"notice\":{\"kind\":\"internal\",\"message\":\"json encode failed\"}}".to_string()
        });
        let _ = writeln!(stderr, "{line}");
    }
}

impl ClientHooks for NoticeHooks {
    fn error(&self, key: &TaskKey, err: &Error) {
        tracing::debug!(key = %key, "request failure notice");
        self.emit(&Notice::request_failed(&self.cmd, key, err));
    }

    fn login_required(&self, login_url: Option<&str>) {
        self.emit(&Notice::login_required(&self.cmd, login_url));
    }
}
