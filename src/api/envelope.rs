//! Purpose: Turn raw transport responses into payloads or normalized errors.
//! Exports: `ResponseType`, `interpret_response`, `unwrap_envelope`, `login_url_hint`.
//! Role: The only place that knows the backend's `{code, data, message}` and `{error}` shapes.
//! Invariants: Statuses in [200, 400) are successes unless the envelope says otherwise.
//! Invariants: Attachments are written to disk before the payload is returned.
#![allow(clippy::result_large_err)]

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::transport::TransportResponse;
use crate::core::error::{Error, ErrorCode, ErrorKind};
use crate::core::payload::{DownloadedFile, Payload};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ResponseType {
    #[default]
    Json,
    Text,
    /// Always save the body as a file.
    Blob,
}

impl ResponseType {
    /// Task key variant; JSON is the untagged default.
    pub fn key_tag(self) -> Option<&'static str> {
        match self {
            ResponseType::Json => None,
            ResponseType::Text => Some("text"),
            ResponseType::Blob => Some("blob"),
        }
    }
}

const DEFAULT_DOWNLOAD_NAME: &str = "download";

pub fn interpret_response(
    response: TransportResponse,
    response_type: ResponseType,
    download_dir: &Path,
) -> Result<Payload, Error> {
    let status = response.status;
    if status == 401 {
        return Err(status_error(ErrorKind::Unauthorized, &response)
            .with_hint("Log in again and retry."));
    }
    if !(200..400).contains(&status) {
        return Err(status_error(ErrorKind::Http, &response));
    }

    if response_type == ResponseType::Blob || is_download(&response) {
        return save_download(&response, download_dir).map(Payload::Download);
    }
    if response_type == ResponseType::Text {
        return Ok(Payload::Text(
            String::from_utf8_lossy(&response.body).into_owned(),
        ));
    }
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Payload::Json(Value::Null));
    }
    let value: Value = serde_json::from_slice(&response.body).map_err(|err| {
        Error::new(ErrorKind::Decode)
            .with_message("invalid response json")
            .with_status(status)
            .with_source(err)
    })?;
    unwrap_envelope(value)
        .map(Payload::Json)
        .map_err(|err| err.with_status(status))
}

/// Unwraps a 2xx body; business-level failures become `ErrorKind::Business`.
pub fn unwrap_envelope(value: Value) -> Result<Value, Error> {
    let mut map = match value {
        Value::Object(map) => map,
        other => return Ok(other),
    };

    if let Some(Value::Object(error)) = map.get("error") {
        return Err(business_error(error, &map));
    }
    if matches!(map.get("result"), Some(Value::Bool(false))) {
        return Err(business_error(&map, &map));
    }
    let is_code_envelope =
        map.contains_key("code") && (map.contains_key("data") || map.contains_key("message"));
    if is_code_envelope {
        let code = map.get("code").cloned().unwrap_or(Value::Null);
        if !is_success_code(&code) {
            return Err(business_error(&map, &map));
        }
        return Ok(map.remove("data").unwrap_or(Value::Null));
    }
    if map.len() == 1 && map.contains_key("data") {
        return Ok(map.remove("data").unwrap_or(Value::Null));
    }
    Ok(Value::Object(map))
}

/// Login URL the backend attached to a 401 body, if any.
pub fn login_url_hint(err: &Error) -> Option<String> {
    let body = err.response()?;
    let candidates = [
        body.pointer("/data/login_url"),
        body.pointer("/error/data/login_url"),
        body.pointer("/login_url"),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(Value::as_str)
        .map(str::to_string)
}

fn is_success_code(code: &Value) -> bool {
    match code {
        Value::Number(number) => number.as_i64() == Some(0),
        Value::String(text) => matches!(text.as_str(), "0" | "00"),
        _ => false,
    }
}

fn business_error(source: &Map<String, Value>, body: &Map<String, Value>) -> Error {
    let mut err = Error::new(ErrorKind::Business)
        .with_response(Value::Object(body.clone()));
    if let Some(code) = source.get("code").and_then(error_code) {
        err = err.with_code(code);
    }
    let message = source
        .get("message")
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
        .unwrap_or("request rejected by backend");
    err.with_message(message)
}

fn error_code(value: &Value) -> Option<ErrorCode> {
    match value {
        Value::Number(number) => number.as_i64().map(ErrorCode::Number),
        Value::String(text) => Some(ErrorCode::Text(text.clone())),
        _ => None,
    }
}

fn status_error(kind: ErrorKind, response: &TransportResponse) -> Error {
    let status = response.status;
    let mut err = Error::new(kind).with_status(status);
    let decoded = serde_json::from_slice::<Value>(&response.body).ok();
    let mut message = None;
    if let Some(Value::Object(map)) = &decoded {
        let source = match map.get("error") {
            Some(Value::Object(error)) => error,
            _ => map,
        };
        if let Some(code) = source.get("code").and_then(error_code) {
            err = err.with_code(code);
        }
        message = source
            .get("message")
            .or_else(|| source.get("detail"))
            .and_then(Value::as_str)
            .filter(|message| !message.is_empty())
            .map(str::to_string);
    }
    if let Some(body) = decoded {
        err = err.with_response(body);
    }
    err.with_message(message.unwrap_or_else(|| format!("request failed with status {status}")))
}

fn is_download(response: &TransportResponse) -> bool {
    let is_attachment = response
        .header("content-disposition")
        .is_some_and(|disposition| disposition.to_ascii_lowercase().starts_with("attachment"));
    if is_attachment {
        return true;
    }
    let Some(content_type) = response.header("content-type") else {
        return false;
    };
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    matches!(
        mime.as_str(),
        "application/octet-stream"
            | "application/zip"
            | "application/x-zip-compressed"
            | "application/gzip"
            | "application/x-gzip"
            | "application/x-tar"
            | "application/pdf"
            | "application/vnd.ms-excel"
    ) || mime.starts_with("application/vnd.openxmlformats")
}

fn save_download(response: &TransportResponse, download_dir: &Path) -> Result<DownloadedFile, Error> {
    let file_name = response
        .header("content-disposition")
        .and_then(attachment_file_name)
        .unwrap_or_else(|| DEFAULT_DOWNLOAD_NAME.to_string());
    std::fs::create_dir_all(download_dir).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to create download directory")
            .with_path(download_dir)
            .with_source(err)
    })?;
    let path: PathBuf = download_dir.join(&file_name);
    std::fs::write(&path, &response.body).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to write download")
            .with_path(&path)
            .with_source(err)
    })?;
    tracing::info!(path = %path.display(), bytes = response.body.len(), "saved download");
    Ok(DownloadedFile {
        path,
        file_name,
        content_type: response.header("content-type").map(str::to_string),
        size: response.body.len() as u64,
    })
}

/// Extracts a safe file name from a `Content-Disposition` header value.
fn attachment_file_name(disposition: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;
    for part in disposition.split(';').map(str::trim) {
        let Some((name, value)) = part.split_once('=') else {
            continue;
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "filename" => plain = Some(value.trim().trim_matches('"').to_string()),
            "filename*" => {
                // RFC 5987: charset'lang'percent-encoded
                let encoded = value.trim().rsplit('\'').next().unwrap_or_default();
                extended = Some(percent_decode(encoded));
            }
            _ => {}
        }
    }
    let raw = extended.or(plain)?;
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }
    Some(base.to_string())
}

fn percent_decode(encoded: &str) -> String {
    url::form_urlencoded::parse(format!("v={encoded}").as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}
