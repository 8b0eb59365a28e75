//! Purpose: Concurrency contract of `HttpClient` over a shared request registry.
//! Role: Drives de-duplication, TTL caching, cancellation and login latching through a
//! Role: gated in-memory transport so call ordering is deterministic.
//! Invariants: Every test opens the gate before returning so blocking workers exit.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use apigw_console::api::{
    CachePolicy, ClientConfig, ClientHooks, Error, ErrorCode, ErrorKind, HttpClient, Method,
    Payload, RequestOptions, RequestRegistry, ResponseType, TaskKey, Transport, TransportRequest,
    TransportResponse,
};
use serde_json::{Value, json};

type Respond = dyn Fn(usize, &TransportRequest) -> TransportResponse + Send + Sync;

#[derive(Clone)]
struct GatedTransport {
    inner: Arc<GateInner>,
}

struct GateInner {
    open: Mutex<bool>,
    opened: Condvar,
    calls: AtomicUsize,
    respond: Box<Respond>,
}

impl GatedTransport {
    fn new(
        open: bool,
        respond: impl Fn(usize, &TransportRequest) -> TransportResponse + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(GateInner {
                open: Mutex::new(open),
                opened: Condvar::new(),
                calls: AtomicUsize::new(0),
                respond: Box::new(respond),
            }),
        }
    }

    /// Answers `{code: 0, data: <call number>}` so tests can tell round trips apart.
    fn counting(open: bool) -> Self {
        Self::new(open, |call, _| {
            TransportResponse::json(200, &json!({"code": 0, "data": call, "message": ""}))
        })
    }

    fn open(&self) {
        let mut open = self.inner.open.lock().expect("gate lock");
        *open = true;
        self.inner.opened.notify_all();
    }

    fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    async fn wait_for_calls(&self, expected: usize) {
        for _ in 0..400 {
            if self.calls() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("transport saw {} calls, expected {expected}", self.calls());
    }
}

impl Transport for GatedTransport {
    fn send(&self, request: &TransportRequest) -> Result<TransportResponse, Error> {
        let call = self.inner.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let mut open = self.inner.open.lock().expect("gate lock");
        while !*open {
            open = self.inner.opened.wait(open).expect("gate wait");
        }
        drop(open);
        Ok((self.inner.respond)(call, request))
    }
}

#[derive(Clone, Default)]
struct RecordingHooks {
    errors: Arc<Mutex<Vec<(String, ErrorKind)>>>,
    logins: Arc<Mutex<Vec<Option<String>>>>,
}

impl RecordingHooks {
    fn error_count(&self) -> usize {
        self.errors.lock().expect("errors lock").len()
    }

    fn login_count(&self) -> usize {
        self.logins.lock().expect("logins lock").len()
    }
}

impl ClientHooks for RecordingHooks {
    fn error(&self, key: &TaskKey, err: &Error) {
        self.errors
            .lock()
            .expect("errors lock")
            .push((key.to_string(), err.kind()));
    }

    fn login_required(&self, login_url: Option<&str>) {
        self.logins
            .lock()
            .expect("logins lock")
            .push(login_url.map(str::to_string));
    }
}

/// Hooks that blow up on every notification.
struct PanickingHooks;

impl ClientHooks for PanickingHooks {
    fn error(&self, _key: &TaskKey, _err: &Error) {
        panic!("error hook failed");
    }

    fn login_required(&self, _login_url: Option<&str>) {
        panic!("login hook failed");
    }
}

fn client_with(transport: &GatedTransport) -> (HttpClient, RecordingHooks) {
    let config = ClientConfig::new("http://gateway.test/backend/").expect("config");
    let hooks = RecordingHooks::default();
    let client = HttpClient::new(config)
        .with_transport(transport.clone())
        .with_hooks(hooks.clone());
    (client, hooks)
}

async fn get(client: &HttpClient, path: &str, options: RequestOptions) -> Result<Value, Error> {
    client
        .request(Method::Get, path, &json!({"limit": 10}), options)
        .await?
        .into_json()
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_cached_gets_share_one_round_trip() {
    let transport = GatedTransport::counting(false);
    let (client, _hooks) = client_with(&transport);
    let cached = || RequestOptions::new().with_cache(true);

    let (a, b, c, ()) = tokio::join!(
        get(&client, "/gateways/", cached()),
        get(&client, "/gateways/", cached()),
        get(&client, "/gateways/", cached()),
        async {
            transport.wait_for_calls(1).await;
            transport.open();
        }
    );

    assert_eq!(a.expect("a"), json!(1));
    assert_eq!(b.expect("b"), json!(1));
    assert_eq!(c.expect("c"), json!(1));
    assert_eq!(transport.calls(), 1);
    assert_eq!(client.registry().in_flight_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn uncached_gets_each_hit_the_network() {
    let transport = GatedTransport::counting(true);
    let (client, _hooks) = client_with(&transport);

    let (a, b) = tokio::join!(
        get(&client, "/gateways/", RequestOptions::new()),
        get(&client, "/gateways/", RequestOptions::new()),
    );

    assert!(a.is_ok() && b.is_ok());
    assert_eq!(transport.calls(), 2);
    assert_eq!(client.registry().cached_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn ttl_cache_serves_until_expiry() {
    let transport = GatedTransport::counting(true);
    let (client, _hooks) = client_with(&transport);
    let ttl = || RequestOptions::new().with_cache(CachePolicy::Ttl(Duration::from_millis(100)));

    assert_eq!(get(&client, "/gateways/", ttl()).await.expect("first"), json!(1));
    assert_eq!(get(&client, "/gateways/", ttl()).await.expect("cached"), json!(1));
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(get(&client, "/gateways/", ttl()).await.expect("refetched"), json!(2));
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn clear_cache_option_forces_a_refetch() {
    let transport = GatedTransport::counting(true);
    let (client, _hooks) = client_with(&transport);

    get(&client, "/gateways/", RequestOptions::new().with_cache(true))
        .await
        .expect("first");
    let fresh = get(
        &client,
        "/gateways/",
        RequestOptions::new().with_cache(true).clear_cache(),
    )
    .await
    .expect("fresh");

    assert_eq!(fresh, json!(2));
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_rejects_every_waiter_without_notifying() {
    let transport = GatedTransport::counting(false);
    let (client, hooks) = client_with(&transport);
    let key = client
        .task_key(Method::Get, "/gateways/", &json!({"limit": 10}))
        .expect("key");
    let cached = || RequestOptions::new().with_cache(true);

    let (a, b, ()) = tokio::join!(
        get(&client, "/gateways/", cached()),
        get(&client, "/gateways/", cached()),
        async {
            transport.wait_for_calls(1).await;
            assert_eq!(client.cancel(std::slice::from_ref(&key)), 1);
            transport.open();
        }
    );

    assert_eq!(a.expect_err("a").kind(), ErrorKind::Cancelled);
    assert_eq!(b.expect_err("b").kind(), ErrorKind::Cancelled);
    assert_eq!(hooks.error_count(), 0);
    assert!(!client.registry().contains(&key));
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_previous_replaces_the_older_call() {
    let transport = GatedTransport::counting(false);
    let (client, _hooks) = client_with(&transport);

    let (first, second) = tokio::join!(
        get(&client, "/gateways/", RequestOptions::new()),
        async {
            transport.wait_for_calls(1).await;
            let (second, ()) = tokio::join!(
                get(&client, "/gateways/", RequestOptions::new().cancel_previous()),
                async {
                    transport.wait_for_calls(2).await;
                    transport.open();
                }
            );
            second
        }
    );

    assert_eq!(first.expect_err("first").kind(), ErrorKind::Cancelled);
    assert_eq!(second.expect("second"), json!(2));
}

#[tokio::test(flavor = "multi_thread")]
async fn navigation_cancel_skips_pinned_requests() {
    let transport = GatedTransport::counting(false);
    let (client, _hooks) = client_with(&transport);

    let (page, pinned, ()) = tokio::join!(
        get(&client, "/gateways/1/stages/", RequestOptions::new()),
        get(&client, "/accounts/userinfo/", RequestOptions::new().pinned()),
        async {
            transport.wait_for_calls(2).await;
            assert_eq!(client.cancel_navigation(), 1);
            transport.open();
        }
    );

    assert_eq!(page.expect_err("page").kind(), ErrorKind::Cancelled);
    assert!(pinned.is_ok());
}

#[tokio::test(flavor = "multi_thread")]
async fn failures_are_not_cached() {
    let transport = GatedTransport::new(true, |call, _| {
        if call == 1 {
            TransportResponse::json(500, &json!({"message": "backend busy"}))
        } else {
            TransportResponse::json(200, &json!({"code": 0, "data": "ok"}))
        }
    });
    let (client, hooks) = client_with(&transport);
    let cached = || RequestOptions::new().with_cache(true);

    let err = get(&client, "/gateways/", cached()).await.expect_err("first");
    assert_eq!(err.kind(), ErrorKind::Http);
    assert_eq!(err.message(), Some("backend busy"));
    assert_eq!(get(&client, "/gateways/", cached()).await.expect("retry"), json!("ok"));
    assert_eq!(transport.calls(), 2);
    assert_eq!(hooks.error_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn business_error_under_success_status() {
    let transport = GatedTransport::new(true, |_, _| {
        TransportResponse::json(
            200,
            &json!({"code": 40001, "data": null, "message": "quota exceeded"}),
        )
    });
    let (client, hooks) = client_with(&transport);

    let err = client
        .request(
            Method::Post,
            "/gateways/1/releases/",
            &json!({"stage_id": 2}),
            RequestOptions::new(),
        )
        .await
        .expect_err("business failure");

    assert_eq!(err.kind(), ErrorKind::Business);
    assert_eq!(err.code(), Some(&ErrorCode::Number(40001)));
    assert_eq!(err.message(), Some("quota exceeded"));
    let errors = hooks.errors.lock().expect("errors lock");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].1, ErrorKind::Business);
}

#[tokio::test(flavor = "multi_thread")]
async fn suppressed_errors_skip_the_hook() {
    let transport = GatedTransport::new(true, |_, _| {
        TransportResponse::json(502, &json!({"detail": "bad gateway"}))
    });
    let (client, hooks) = client_with(&transport);

    let err = get(&client, "/gateways/", RequestOptions::new().suppress_error())
        .await
        .expect_err("suppressed");
    assert_eq!(err.status(), Some(502));
    assert_eq!(hooks.error_count(), 0);

    get(&client, "/gateways/", RequestOptions::new())
        .await
        .expect_err("reported");
    assert_eq!(hooks.error_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_unauthorized_redirects_once_until_reset() {
    let transport = GatedTransport::new(false, |_, _| {
        TransportResponse::json(
            401,
            &json!({"code": "Unauthorized", "data": {"login_url": "http://login.test/"}}),
        )
    });
    let (client, hooks) = client_with(&transport);

    let (a, b, c, ()) = tokio::join!(
        get(&client, "/gateways/", RequestOptions::new()),
        get(&client, "/gateways/1/stages/", RequestOptions::new()),
        get(&client, "/accounts/userinfo/", RequestOptions::new()),
        async {
            transport.wait_for_calls(3).await;
            transport.open();
        }
    );
    for result in [a, b, c] {
        assert_eq!(result.expect_err("401").kind(), ErrorKind::Unauthorized);
    }
    assert_eq!(
        *hooks.logins.lock().expect("logins lock"),
        vec![Some("http://login.test/".to_string())]
    );
    assert_eq!(hooks.error_count(), 0);

    get(&client, "/gateways/", RequestOptions::new())
        .await
        .expect_err("still latched");
    assert_eq!(hooks.login_count(), 1);

    client.reset_login_redirect();
    get(&client, "/gateways/", RequestOptions::new())
        .await
        .expect_err("after reset");
    assert_eq!(hooks.login_count(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn clients_sharing_a_registry_share_cached_results() {
    let transport = GatedTransport::counting(true);
    let registry = Arc::new(RequestRegistry::new());
    let config = ClientConfig::new("http://gateway.test/backend/").expect("config");
    let first = HttpClient::new(config.clone())
        .with_transport(transport.clone())
        .with_registry(Arc::clone(&registry));
    let second = HttpClient::new(config)
        .with_transport(transport.clone())
        .with_registry(Arc::clone(&registry));
    let cached = || RequestOptions::new().with_cache(true);

    assert_eq!(get(&first, "/gateways/", cached()).await.expect("first"), json!(1));
    assert_eq!(get(&second, "/gateways/", cached()).await.expect("second"), json!(1));
    assert_eq!(transport.calls(), 1);
    assert_eq!(registry.cached_count(), 1);

    assert_eq!(second.clear_cache_prefix("/gateways"), 1);
    assert_eq!(get(&first, "/gateways/", cached()).await.expect("third"), json!(2));
}

#[tokio::test(flavor = "multi_thread")]
async fn invalidation_during_flight_detaches_later_reads() {
    let transport = GatedTransport::counting(false);
    let (client, _hooks) = client_with(&transport);
    let cached = || RequestOptions::new().with_cache(true);

    let (before, after) = tokio::join!(
        get(&client, "/gateways/", cached()),
        async {
            transport.wait_for_calls(1).await;
            assert_eq!(client.clear_cache_prefix("/gateways/"), 1);
            let (after, ()) = tokio::join!(get(&client, "/gateways/", cached()), async {
                transport.wait_for_calls(2).await;
                transport.open();
            });
            after
        }
    );

    assert_eq!(before.expect("before"), json!(1));
    assert_eq!(after.expect("after"), json!(2));
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn clear_cache_option_skips_an_in_flight_slot() {
    let transport = GatedTransport::counting(false);
    let (client, _hooks) = client_with(&transport);
    let cached = || RequestOptions::new().with_cache(true);

    let (stale, fresh) = tokio::join!(
        get(&client, "/gateways/", cached()),
        async {
            transport.wait_for_calls(1).await;
            let (fresh, ()) = tokio::join!(get(&client, "/gateways/", cached().clear_cache()), async {
                transport.wait_for_calls(2).await;
                transport.open();
            });
            fresh
        }
    );

    assert_eq!(stale.expect("stale"), json!(1));
    assert_eq!(fresh.expect("fresh"), json!(2));
    // Only the newer call stays cached.
    assert_eq!(get(&client, "/gateways/", cached()).await.expect("cached"), json!(2));
}

#[tokio::test(flavor = "multi_thread")]
async fn pinned_joiner_survives_navigation_cancel() {
    let transport = GatedTransport::counting(false);
    let (client, _hooks) = client_with(&transport);

    let (page, pinned, ()) = tokio::join!(
        get(&client, "/accounts/userinfo/", RequestOptions::new().with_cache(true)),
        async {
            transport.wait_for_calls(1).await;
            get(
                &client,
                "/accounts/userinfo/",
                RequestOptions::new().with_cache(true).pinned(),
            )
            .await
        },
        async {
            transport.wait_for_calls(1).await;
            tokio::time::sleep(Duration::from_millis(50)).await;
            assert_eq!(client.cancel_navigation(), 0);
            transport.open();
        }
    );

    assert_eq!(page.expect("page"), json!(1));
    assert_eq!(pinned.expect("pinned"), json!(1));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn panicking_hook_still_resolves_waiters() {
    let transport = GatedTransport::new(true, |_, _| {
        TransportResponse::json(500, &json!({"message": "backend busy"}))
    });
    let config = ClientConfig::new("http://gateway.test/backend/").expect("config");
    let client = HttpClient::new(config)
        .with_transport(transport.clone())
        .with_hooks(PanickingHooks);

    let err = tokio::time::timeout(
        Duration::from_secs(2),
        get(&client, "/gateways/", RequestOptions::new().with_cache(true)),
    )
    .await
    .expect("request resolved")
    .expect_err("http failure");

    assert_eq!(err.kind(), ErrorKind::Http);
    assert_eq!(client.registry().in_flight_count(), 0);
    assert_eq!(client.registry().cached_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_all_reaches_pinned_requests() {
    let transport = GatedTransport::counting(false);
    let (client, hooks) = client_with(&transport);

    let (page, pinned, ()) = tokio::join!(
        get(&client, "/gateways/1/stages/", RequestOptions::new()),
        get(&client, "/accounts/userinfo/", RequestOptions::new().pinned()),
        async {
            transport.wait_for_calls(2).await;
            assert_eq!(client.cancel_all(), 2);
            transport.open();
        }
    );

    assert_eq!(page.expect_err("page").kind(), ErrorKind::Cancelled);
    assert_eq!(pinned.expect_err("pinned").kind(), ErrorKind::Cancelled);
    assert_eq!(hooks.error_count(), 0);
    assert_eq!(client.registry().in_flight_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn response_types_cache_in_separate_slots() {
    let transport = GatedTransport::counting(true);
    let (client, _hooks) = client_with(&transport);
    let params = json!({"limit": 10});

    let json_value = get(&client, "/gateways/", RequestOptions::new().with_cache(true))
        .await
        .expect("json");
    let text = client
        .request(
            Method::Get,
            "/gateways/",
            &params,
            RequestOptions::new()
                .with_cache(true)
                .with_response_type(ResponseType::Text),
        )
        .await
        .expect("text");

    assert_eq!(json_value, json!(1));
    assert!(matches!(text, Payload::Text(body) if body.contains(r#""data":2"#)));
    assert_eq!(transport.calls(), 2);
    let text_key = client
        .task_key_for(Method::Get, "/gateways/", &params, ResponseType::Text)
        .expect("key");
    assert!(client.registry().contains(&text_key));
}
