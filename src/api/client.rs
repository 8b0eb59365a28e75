//! Purpose: HTTP client core for the gateway management backend.
//! Exports: `HttpClient`, `RequestOptions`, `ApiResult`.
//! Role: Builds requests (CSRF, cookies, params), de-duplicates/caches GETs through the
//! Role: injected `RequestRegistry`, and normalizes every outcome into `Payload` or `Error`.
//! Invariants: One leader task per network call; waiters only observe the shared slot.
//! Invariants: A missing CSRF token is logged once and never blocks a request.
//! Invariants: Login-required fires once until `reset_login_redirect`.
#![allow(clippy::result_large_err)]

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use super::envelope::{ResponseType, interpret_response, login_url_hint};
use super::hooks::{ClientHooks, TracingHooks};
use super::transport::{Transport, TransportRequest, UreqTransport};
use crate::core::config::ClientConfig;
use crate::core::error::{Error, ErrorKind};
use crate::core::payload::Payload;
use crate::core::registry::{CachePolicy, Outcome, Registration, RequestRegistry};
use crate::core::task_key::{Method, TaskKey, append_query};

pub type ApiResult<T> = Result<T, Error>;

#[derive(Clone, Debug)]
pub struct RequestOptions {
    pub cache: CachePolicy,
    pub headers: Vec<(String, String)>,
    pub response_type: ResponseType,
    pub suppress_error: bool,
    pub clear_cache: bool,
    pub cancel_previous: bool,
    pub cancel_on_navigation: bool,
    pub timeout: Option<Duration>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            cache: CachePolicy::Off,
            headers: Vec::new(),
            response_type: ResponseType::Json,
            suppress_error: false,
            clear_cache: false,
            cancel_previous: false,
            cancel_on_navigation: true,
            timeout: None,
        }
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `true`/`false` or a TTL `Duration`.
    pub fn with_cache(mut self, cache: impl Into<CachePolicy>) -> Self {
        self.cache = cache.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn suppress_error(mut self) -> Self {
        self.suppress_error = true;
        self
    }

    pub fn clear_cache(mut self) -> Self {
        self.clear_cache = true;
        self
    }

    pub fn cancel_previous(mut self) -> Self {
        self.cancel_previous = true;
        self
    }

    /// Survives `cancel_navigation`.
    pub fn pinned(mut self) -> Self {
        self.cancel_on_navigation = false;
        self
    }
}

#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    registry: Arc<RequestRegistry>,
    hooks: Arc<dyn ClientHooks>,
    login_redirected: AtomicBool,
    csrf_warned: AtomicBool,
}

impl HttpClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                transport: Arc::new(UreqTransport::new()),
                registry: Arc::new(RequestRegistry::new()),
                hooks: Arc::new(TracingHooks),
                login_redirected: AtomicBool::new(false),
                csrf_warned: AtomicBool::new(false),
            }),
        }
    }

    pub fn with_transport(self, transport: impl Transport) -> Self {
        let transport: Arc<dyn Transport> = Arc::new(transport);
        self.map_inner(|inner| inner.transport = transport)
    }

    /// Shares one registry between clients (e.g. one per application instance).
    pub fn with_registry(self, registry: Arc<RequestRegistry>) -> Self {
        self.map_inner(|inner| inner.registry = registry)
    }

    pub fn with_hooks(self, hooks: impl ClientHooks) -> Self {
        let hooks: Arc<dyn ClientHooks> = Arc::new(hooks);
        self.map_inner(|inner| inner.hooks = hooks)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<RequestRegistry> {
        &self.inner.registry
    }

    /// Task key a JSON request with these arguments would be registered under.
    pub fn task_key<P>(&self, method: Method, path: &str, params: &P) -> ApiResult<TaskKey>
    where
        P: Serialize + ?Sized,
    {
        self.task_key_for(method, path, params, ResponseType::Json)
    }

    pub fn task_key_for<P>(
        &self,
        method: Method,
        path: &str,
        params: &P,
        response_type: ResponseType,
    ) -> ApiResult<TaskKey>
    where
        P: Serialize + ?Sized,
    {
        Ok(TaskKey::new(method, path, &encode_params(params)?).with_variant(response_type.key_tag()))
    }

    pub async fn request<P>(
        &self,
        method: Method,
        path: &str,
        params: &P,
        options: RequestOptions,
    ) -> ApiResult<Payload>
    where
        P: Serialize + ?Sized,
    {
        let params = encode_params(params)?;
        let key = TaskKey::new(method, path, &params).with_variant(options.response_type.key_tag());
        let registry = &self.inner.registry;
        if options.cancel_previous {
            registry.cancel(std::slice::from_ref(&key));
        }
        if options.clear_cache {
            registry.evict(std::slice::from_ref(&key));
        }
        let cache = if !method.is_mutating() {
            options.cache
        } else {
            if options.cache.enabled() {
                tracing::debug!(key = %key, "cache policy ignored for non-GET request");
            }
            CachePolicy::Off
        };

        let request = self.build_request(method, path, &params, &options)?;
        let ticket = match registry.register(key.clone(), cache, options.cancel_on_navigation) {
            Registration::Joined(pending) => return pending.wait().await,
            Registration::Leader(ticket) => ticket,
        };

        let id = ticket.id;
        let client = self.clone();
        let response_type = options.response_type;
        let suppress_error = options.suppress_error;
        let handle = tokio::spawn(async move {
            let registry = Arc::clone(&client.inner.registry);
            let _guard = LeaderGuard {
                registry: Arc::clone(&registry),
                id,
            };
            let outcome = client.execute(request, response_type).await;
            // Cancelled while the response was in transit: waiters already have their error.
            let Some(claim) = registry.claim(id) else {
                return;
            };
            if let Err(err) = &outcome {
                let reported = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    client.report_failure(&key, err, suppress_error)
                }));
                if reported.is_err() {
                    tracing::error!(key = %key, "client hook panicked while reporting a failure");
                }
            }
            claim.publish(outcome);
        });
        registry.attach_abort(id, handle.abort_handle());
        ticket.result.wait().await
    }

    pub async fn request_json<P, R>(
        &self,
        method: Method,
        path: &str,
        params: &P,
        options: RequestOptions,
    ) -> ApiResult<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.request(method, path, params, options).await?.decode()
    }

    pub async fn get<R>(&self, path: &str, query: &impl Serialize, options: RequestOptions) -> ApiResult<R>
    where
        R: DeserializeOwned,
    {
        self.request_json(Method::Get, path, query, options).await
    }

    pub async fn post<R>(&self, path: &str, body: &impl Serialize, options: RequestOptions) -> ApiResult<R>
    where
        R: DeserializeOwned,
    {
        self.request_json(Method::Post, path, body, options).await
    }

    pub async fn put<R>(&self, path: &str, body: &impl Serialize, options: RequestOptions) -> ApiResult<R>
    where
        R: DeserializeOwned,
    {
        self.request_json(Method::Put, path, body, options).await
    }

    pub async fn patch<R>(&self, path: &str, body: &impl Serialize, options: RequestOptions) -> ApiResult<R>
    where
        R: DeserializeOwned,
    {
        self.request_json(Method::Patch, path, body, options).await
    }

    pub async fn delete(&self, path: &str, options: RequestOptions) -> ApiResult<()> {
        self.request(Method::Delete, path, &Value::Null, options)
            .await
            .map(|_| ())
    }

    /// Cancels in-flight requests for `keys`; waiters receive `ErrorKind::Cancelled`.
    pub fn cancel(&self, keys: &[TaskKey]) -> usize {
        self.inner.registry.cancel(keys)
    }

    /// Route-change cancellation: everything not marked `pinned`.
    pub fn cancel_navigation(&self) -> usize {
        self.inner.registry.cancel_navigation()
    }

    /// Cancels every in-flight request, pinned ones included.
    pub fn cancel_all(&self) -> usize {
        self.inner.registry.cancel_all()
    }

    pub fn clear_cache(&self, keys: &[TaskKey]) -> usize {
        self.inner.registry.evict(keys)
    }

    pub fn clear_cache_prefix(&self, path_prefix: &str) -> usize {
        self.inner.registry.evict_prefix(path_prefix)
    }

    pub fn reset_login_redirect(&self) {
        self.inner.login_redirected.store(false, Ordering::SeqCst);
    }

    fn build_request(
        &self,
        method: Method,
        path: &str,
        params: &Value,
        options: &RequestOptions,
    ) -> ApiResult<TransportRequest> {
        let config = &self.inner.config;
        let mut url = config.endpoint(path)?;
        let mut headers = vec![
            (
                "Accept".to_string(),
                "application/json, text/plain, */*".to_string(),
            ),
            ("X-Requested-With".to_string(), "XMLHttpRequest".to_string()),
        ];

        let body = if method.uses_query() {
            append_query(&mut url, params)?;
            None
        } else if params.is_null() {
            None
        } else {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
            let body = serde_json::to_vec(params).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to encode request json")
                    .with_source(err)
            })?;
            Some(body)
        };

        match config.csrf_token() {
            Some(token) => headers.push((config.csrf_header_name.clone(), token.to_string())),
            None => self.warn_missing_csrf(),
        }
        if let Some(cookie) = config.cookies.header_value() {
            headers.push(("Cookie".to_string(), cookie));
        }
        if let Some(language) = config.language() {
            headers.push(("Accept-Language".to_string(), language.to_string()));
        }
        headers.extend(options.headers.iter().cloned());

        Ok(TransportRequest {
            method,
            url,
            headers,
            body,
            timeout: options.timeout.or(config.timeout),
        })
    }

    async fn execute(&self, request: TransportRequest, response_type: ResponseType) -> Outcome {
        let transport = Arc::clone(&self.inner.transport);
        let download_dir = self.inner.config.download_dir.clone();
        let method = request.method;
        let path = request.url.path().to_string();
        let started = Instant::now();

        let joined = tokio::task::spawn_blocking(move || {
            let response = transport.send(&request)?;
            interpret_response(response, response_type, &download_dir)
        })
        .await;
        let outcome = joined.unwrap_or_else(|err| {
            Err(Error::new(ErrorKind::Internal)
                .with_message("request worker failed")
                .with_source(err))
        });

        tracing::debug!(
            method = %method,
            path = %path,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = outcome.is_ok(),
            "request finished"
        );
        outcome
    }

    fn report_failure(&self, key: &TaskKey, err: &Error, suppress_error: bool) {
        match err.kind() {
            ErrorKind::Cancelled => {}
            ErrorKind::Unauthorized => {
                if self.inner.login_redirected.swap(true, Ordering::SeqCst) {
                    return;
                }
                let hinted = login_url_hint(err);
                let login_url = hinted
                    .as_deref()
                    .or(self.inner.config.login_url.as_ref().map(Url::as_str));
                self.inner.hooks.login_required(login_url);
            }
            _ if suppress_error => {}
            _ => self.inner.hooks.error(key, err),
        }
    }

    fn warn_missing_csrf(&self) {
        if !self.inner.csrf_warned.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                cookie = %self.inner.config.csrf_cookie_name,
                "csrf token cookie missing; sending requests without it"
            );
        }
    }

    fn map_inner(mut self, update: impl FnOnce(&mut ClientInner)) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            update(inner);
            return self;
        }
        let mut inner = ClientInner {
            config: self.inner.config.clone(),
            transport: Arc::clone(&self.inner.transport),
            registry: Arc::clone(&self.inner.registry),
            hooks: Arc::clone(&self.inner.hooks),
            login_redirected: AtomicBool::new(self.inner.login_redirected.load(Ordering::SeqCst)),
            csrf_warned: AtomicBool::new(self.inner.csrf_warned.load(Ordering::Relaxed)),
        };
        update(&mut inner);
        self.inner = Arc::new(inner);
        self
    }
}

/// Fails the call if its leader task unwinds before publishing.
struct LeaderGuard {
    registry: Arc<RequestRegistry>,
    id: u64,
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        let abandoned = Error::new(ErrorKind::Internal).with_message("request task exited without a result");
        if self.registry.complete(self.id, Err(abandoned)) {
            tracing::error!(id = self.id, "request task exited without a result");
        }
    }
}

fn encode_params<P>(params: &P) -> ApiResult<Value>
where
    P: Serialize + ?Sized,
{
    serde_json::to_value(params).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("failed to encode request params")
            .with_source(err)
    })
}

#[cfg(test)]
mod tests {
    use super::{HttpClient, RequestOptions};
    use crate::api::transport::{Transport, TransportRequest, TransportResponse};
    use crate::core::config::{ClientConfig, CookieJar};
    use crate::core::error::Error;
    use crate::core::registry::CachePolicy;
    use crate::core::task_key::Method;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct Recorder {
        seen: Arc<Mutex<Vec<TransportRequest>>>,
    }

    impl Transport for Recorder {
        fn send(&self, request: &TransportRequest) -> Result<TransportResponse, Error> {
            self.seen
                .lock()
                .unwrap_or_else(|poison| poison.into_inner())
                .push(request.clone());
            Ok(TransportResponse::json(200, &json!({"code": 0, "data": null})))
        }
    }

    fn client(cookies: &str) -> (HttpClient, Recorder) {
        let config = ClientConfig::new("http://localhost:8000/backend/")
            .expect("config")
            .with_cookies(CookieJar::parse(cookies));
        let recorder = Recorder::default();
        let client = HttpClient::new(config).with_transport(recorder.clone());
        (client, recorder)
    }

    #[tokio::test]
    async fn csrf_cookie_and_language_are_attached() {
        let (client, recorder) = client("csrftoken=tok; blueking_language=en");
        client
            .request(Method::Post, "/gateways/", &json!({"name": "demo"}), RequestOptions::new())
            .await
            .expect("post");
        let seen = recorder.seen.lock().expect("lock");
        let request = &seen[0];
        assert_eq!(request.header("X-CSRFToken"), Some("tok"));
        assert_eq!(request.header("Accept-Language"), Some("en"));
        assert_eq!(
            request.header("Cookie"),
            Some("blueking_language=en; csrftoken=tok")
        );
        assert_eq!(request.body.as_deref(), Some(br#"{"name":"demo"}"#.as_slice()));
    }

    #[tokio::test]
    async fn missing_csrf_does_not_block() {
        let (client, recorder) = client("");
        client
            .request(Method::Delete, "/gateways/3/", &json!({}), RequestOptions::new())
            .await
            .expect("delete");
        let seen = recorder.seen.lock().expect("lock");
        assert_eq!(seen.len(), 1);
        assert!(seen[0].header("X-CSRFToken").is_none());
        assert!(seen[0].body.is_none());
    }

    #[tokio::test]
    async fn get_params_become_query_and_timeout_passes_through() {
        let (client, recorder) = client("csrftoken=tok");
        client
            .request(
                Method::Get,
                "gateways/",
                &json!({"limit": 10, "offset": 0}),
                RequestOptions::new().with_timeout(Duration::from_secs(2)),
            )
            .await
            .expect("get");
        let seen = recorder.seen.lock().expect("lock");
        assert_eq!(
            seen[0].url.as_str(),
            "http://localhost:8000/backend/gateways/?limit=10&offset=0"
        );
        assert_eq!(seen[0].timeout, Some(Duration::from_secs(2)));
    }

    #[tokio::test]
    async fn cache_is_ignored_for_mutations() {
        let (client, recorder) = client("csrftoken=tok");
        for _ in 0..2 {
            client
                .request(
                    Method::Post,
                    "/gateways/1/releases/",
                    &json!({"stage_id": 1}),
                    RequestOptions::new().with_cache(true),
                )
                .await
                .expect("post");
        }
        assert_eq!(recorder.seen.lock().expect("lock").len(), 2);
        assert_eq!(client.registry().cached_count(), 0);
    }

    #[tokio::test]
    async fn per_call_headers_are_forwarded() {
        let (client, recorder) = client("csrftoken=tok");
        client
            .request(
                Method::Get,
                "/gateways/",
                &json!({}),
                RequestOptions::new()
                    .with_header("X-Trace", "abc")
                    .with_cache(CachePolicy::Off),
            )
            .await
            .expect("get");
        let seen = recorder.seen.lock().expect("lock");
        assert_eq!(seen[0].header("x-trace"), Some("abc"));
    }
}
