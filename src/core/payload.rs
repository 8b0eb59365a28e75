//! Purpose: Resolved value of a request after envelope unwrapping.
//! Exports: `Payload`, `DownloadedFile`.
//! Role: What every waiter on a task key receives on success.
//! Invariants: Downloads are already on disk when a `Payload::Download` is observed.
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::{Error, ErrorKind};

#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
    Download(DownloadedFile),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub file_name: String,
    pub content_type: Option<String>,
    pub size: u64,
}

impl Payload {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_json(self) -> Result<Value, Error> {
        match self {
            Payload::Json(value) => Ok(value),
            Payload::Text(text) => Ok(Value::String(text)),
            Payload::Download(file) => Err(Error::new(ErrorKind::Decode)
                .with_message("expected json response but received a file download")
                .with_path(file.path)),
        }
    }

    pub fn decode<R>(self) -> Result<R, Error>
    where
        R: DeserializeOwned,
    {
        let value = self.into_json()?;
        serde_json::from_value(value).map_err(|err| {
            Error::new(ErrorKind::Decode)
                .with_message("unexpected response shape")
                .with_source(err)
        })
    }

    pub fn into_download(self) -> Result<DownloadedFile, Error> {
        match self {
            Payload::Download(file) => Ok(file),
            _ => Err(Error::new(ErrorKind::Decode)
                .with_message("expected a file download but received an inline body")),
        }
    }
}
