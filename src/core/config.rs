//! Purpose: Explicit client configuration populated once at startup.
//! Exports: `ClientConfig`, `CookieJar`, `DEFAULT_*` constants.
//! Role: Replaces ad hoc reads of browser globals (base URL, cookies) with a passed value.
//! Invariants: Base URLs always end with `/` so relative API paths join under them.
//! Invariants: Cookie parsing is lenient; malformed pairs are skipped, never fatal.
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use super::error::{Error, ErrorKind};

pub const DEFAULT_CSRF_COOKIE_NAME: &str = "csrftoken";
pub const DEFAULT_CSRF_HEADER_NAME: &str = "X-CSRFToken";
pub const DEFAULT_LANGUAGE_COOKIE_NAME: &str = "blueking_language";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENV_BASE_URL: &str = "APIGW_BASE_URL";
pub const ENV_COOKIE: &str = "APIGW_COOKIE";
pub const ENV_CSRF_COOKIE_NAME: &str = "APIGW_CSRF_COOKIE_NAME";
pub const ENV_CSRF_HEADER_NAME: &str = "APIGW_CSRF_HEADER_NAME";
pub const ENV_LOGIN_URL: &str = "APIGW_LOGIN_URL";
pub const ENV_TIMEOUT_MS: &str = "APIGW_TIMEOUT_MS";
pub const ENV_DOWNLOAD_DIR: &str = "APIGW_DOWNLOAD_DIR";

/// Cookies as the page would see them in `document.cookie`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: BTreeMap<String, String>,
}

impl CookieJar {
    pub fn parse(raw: &str) -> Self {
        let mut cookies = BTreeMap::new();
        for pair in raw.split(';') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            cookies.insert(name.to_string(), value.trim().to_string());
        }
        Self { cookies }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.insert(name.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Renders the jar as a `Cookie` request header value.
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        Some(parts.join("; "))
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: Url,
    pub csrf_cookie_name: String,
    pub csrf_header_name: String,
    pub language_cookie_name: String,
    pub cookies: CookieJar,
    pub timeout: Option<Duration>,
    pub login_url: Option<Url>,
    pub download_dir: PathBuf,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, Error> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            csrf_cookie_name: DEFAULT_CSRF_COOKIE_NAME.to_string(),
            csrf_header_name: DEFAULT_CSRF_HEADER_NAME.to_string(),
            language_cookie_name: DEFAULT_LANGUAGE_COOKIE_NAME.to_string(),
            cookies: CookieJar::default(),
            timeout: Some(DEFAULT_TIMEOUT),
            login_url: None,
            download_dir: PathBuf::from("."),
        })
    }

    /// Builds a config from `APIGW_*` environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from `APIGW_*` variables resolved through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let base_url = lookup(ENV_BASE_URL).ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("{ENV_BASE_URL} is not set"))
                .with_hint("Export the dashboard backend URL, e.g. https://apigw.example.com/backend/.")
        })?;
        let mut config = Self::new(&base_url)?;
        if let Some(raw) = lookup(ENV_COOKIE) {
            config.cookies = CookieJar::parse(&raw);
        }
        if let Some(name) = lookup(ENV_CSRF_COOKIE_NAME) {
            config.csrf_cookie_name = name;
        }
        if let Some(name) = lookup(ENV_CSRF_HEADER_NAME) {
            config.csrf_header_name = name;
        }
        if let Some(raw) = lookup(ENV_LOGIN_URL) {
            config = config.with_login_url(&raw)?;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            let millis: u64 = raw.trim().parse().map_err(|_| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("{ENV_TIMEOUT_MS} must be an integer"))
            })?;
            config.timeout = timeout_from_millis(millis);
        }
        if let Some(dir) = lookup(ENV_DOWNLOAD_DIR) {
            config.download_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    pub fn with_cookies(mut self, cookies: CookieJar) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn with_login_url(mut self, raw: &str) -> Result<Self, Error> {
        let url = Url::parse(raw).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("invalid login url")
                .with_source(err)
        })?;
        self.login_url = Some(url);
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.cookies.get(&self.csrf_cookie_name)
    }

    pub fn language(&self) -> Option<&str> {
        self.cookies.get(&self.language_cookie_name)
    }

    /// Joins an API path under the base URL; a leading `/` does not escape the base path.
    pub fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let relative = path.trim_start_matches('/');
        self.base_url.join(relative).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid request path: {path}"))
                .with_source(err)
        })
    }
}

/// Zero disables the deadline.
pub fn timeout_from_millis(millis: u64) -> Option<Duration> {
    (millis > 0).then(|| Duration::from_millis(millis))
}

fn normalize_base_url(raw: &str) -> Result<Url, Error> {
    let mut url = Url::parse(raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid base url")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(
            Error::new(ErrorKind::Usage).with_message("base url must use http or https scheme")
        );
    }
    if url.cannot_be_a_base() {
        return Err(Error::new(ErrorKind::Usage).with_message("base url cannot be a base"));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}
