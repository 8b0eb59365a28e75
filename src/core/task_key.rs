//! Purpose: Derive deterministic task keys and encode request params.
//! Exports: `Method`, `TaskKey`, `append_query`.
//! Role: Identity of a logical request for de-duplication, caching and cancellation.
//! Invariants: Keys depend only on method, normalized path, canonical JSON params
//! and an optional response variant tag.
//! Invariants: Canonical JSON relies on serde_json's sorted object maps.
use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use url::Url;

use super::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Whether params travel in the query string rather than a JSON body.
    pub fn uses_query(self) -> bool {
        matches!(self, Method::Get | Method::Delete)
    }

    pub fn is_mutating(self) -> bool {
        !matches!(self, Method::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "get" => Ok(Method::Get),
            "post" => Ok(Method::Post),
            "put" => Ok(Method::Put),
            "patch" => Ok(Method::Patch),
            "delete" => Ok(Method::Delete),
            _ => Err(Error::new(ErrorKind::Usage)
                .with_message(format!("unsupported http method: {raw}"))
                .with_hint("Use one of get, post, put, patch, delete.")),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TaskKey {
    key: String,
    path: String,
}

impl TaskKey {
    pub fn new(method: Method, path: &str, params: &Value) -> Self {
        let path = normalize_path(path);
        let params = match params {
            Value::Null => String::new(),
            Value::Object(map) if map.is_empty() => String::new(),
            other => other.to_string(),
        };
        let key = format!("{} {path} {params}", method.as_str())
            .trim_end()
            .to_string();
        Self { key, path }
    }

    /// Tags the key so the same request decoded differently gets its own slot.
    pub fn with_variant(mut self, variant: Option<&str>) -> Self {
        if let Some(variant) = variant {
            self.key = format!("{} [{variant}]", self.key);
        }
        self
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Normalized request path, used for prefix invalidation.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

pub(crate) fn normalize_path(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

/// Appends `params` to the URL query: scalars as-is, arrays as repeated keys,
/// nulls skipped, nested objects as compact JSON.
pub fn append_query(url: &mut Url, params: &Value) -> Result<(), Error> {
    let map = match params {
        Value::Null => return Ok(()),
        Value::Object(map) => map,
        _ => {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("query params must be a JSON object"));
        }
    };
    if map.is_empty() {
        return Ok(());
    }
    let mut pairs = url.query_pairs_mut();
    for (name, value) in map {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    if let Some(text) = query_scalar(item) {
                        pairs.append_pair(name, &text);
                    }
                }
            }
            other => {
                if let Some(text) = query_scalar(other) {
                    pairs.append_pair(name, &text);
                }
            }
        }
    }
    Ok(())
}

fn query_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        other => Some(other.to_string()),
    }
}
