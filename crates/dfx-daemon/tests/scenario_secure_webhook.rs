//! Scenario: secure webhook triggers an immediate refresh.
//!
//! # Invariants under test
//!
//! 1. Valid `X-Hub-Signature` over the literal body → `200` and one refresh.
//! 2. Any signature problem → `500`, generic message, no refresh, and the
//!    expected signature never appears in the response.
//! 3. Missing secret is reported before anything else, whatever the body.
//! 4. A body not parsed as text is an integration fault, never a pass.
//! 5. A failing refresh does not change the `200`.
//!
//! Every request produces exactly one response: `oneshot` returns one.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    http::{Request, StatusCode},
    middleware,
    routing::post,
    Router,
};
use dfx_config::{secrets::WebhookSecret, DatafileOptions};
use dfx_daemon::{
    binder::{bind_request, RequestBinder},
    body::parse_body_as_json,
    routes, state,
    webhook::{webhook_route, WebhookFault},
};
use dfx_datafile::{
    signature::{compute_signature, SIGNATURE_HEADER},
    Datafile, DatafileClientFactory, DatafileSource, FetchOutcome, SourceError, SourceEvent,
};
use http_body_util::BodyExt;
use tokio::sync::broadcast;
use tower::ServiceExt; // oneshot

const SECRET: &str = "topsecret";
const BODY: &str = "{\"event\":\"update\"}";

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------

struct CountingSource {
    events: broadcast::Sender<SourceEvent>,
    current: Mutex<Option<Datafile>>,
    fetches: AtomicUsize,
    fail_fetch: bool,
}

impl CountingSource {
    fn new(fail_fetch: bool) -> Arc<Self> {
        let (events, _rx) = broadcast::channel(16);
        Arc::new(Self {
            events,
            current: Mutex::new(None),
            fetches: AtomicUsize::new(0),
            fail_fetch,
        })
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatafileSource for CountingSource {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn subscribe(&self) -> broadcast::Receiver<SourceEvent> {
        self.events.subscribe()
    }

    fn current(&self) -> Option<Datafile> {
        self.current.lock().unwrap().clone()
    }

    fn start(&self) {}

    async fn fetch_now(&self) -> Result<FetchOutcome, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch {
            Err(SourceError::Status(503))
        } else {
            Ok(FetchOutcome::NotModified)
        }
    }

    fn stop(&self) {}
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_state(source: &Arc<CountingSource>, secret: Option<&str>) -> Arc<state::AppState> {
    let opts = DatafileOptions {
        source_key: Some("abc".to_string()),
        ..DatafileOptions::default()
    };
    let src: Arc<dyn DatafileSource> = source.clone();
    let binder =
        RequestBinder::bind(opts, src, Arc::new(DatafileClientFactory)).expect("bind failed");
    Arc::new(state::AppState::new(binder, secret.map(WebhookSecret::new)))
}

fn webhook_request(uri: &str, body: &str, signature: Option<&str>) -> Request<axum::body::Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(sig) = signature {
        builder = builder.header(SIGNATURE_HEADER, sig);
    }
    builder
        .body(axum::body::Body::from(body.to_string()))
        .unwrap()
}

fn signed(body: &str, secret: &str) -> String {
    compute_signature(secret.as_bytes(), body.as_bytes())
}

async fn call(router: Router, req: Request<axum::body::Body>) -> (StatusCode, String) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, String::from_utf8_lossy(&body).into_owned())
}

async fn wait_for_fetches(source: &CountingSource, want: usize) {
    for _ in 0..200 {
        if source.fetches() >= want {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {want} fetches, saw {}", source.fetches());
}

/// Give any (wrongly) spawned refresh a chance to run before asserting none did.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

// ---------------------------------------------------------------------------
// 1. Valid signature
// ---------------------------------------------------------------------------

#[tokio::test]
async fn valid_signature_returns_200_and_triggers_refresh() {
    let source = CountingSource::new(false);
    let router = routes::build_router(make_state(&source, Some(SECRET)));

    let sig = signed(BODY, SECRET);
    let (status, _) = call(router, webhook_request("/v1/webhook", BODY, Some(&sig))).await;

    assert_eq!(status, StatusCode::OK);
    wait_for_fetches(&source, 1).await;
    settle().await;
    assert_eq!(source.fetches(), 1, "exactly one refresh per verified webhook");
}

#[tokio::test]
async fn refresh_failure_still_returns_200() {
    let source = CountingSource::new(true);
    let router = routes::build_router(make_state(&source, Some(SECRET)));

    let sig = signed(BODY, SECRET);
    let (status, _) = call(router, webhook_request("/v1/webhook", BODY, Some(&sig))).await;

    assert_eq!(status, StatusCode::OK);
    wait_for_fetches(&source, 1).await;
}

// ---------------------------------------------------------------------------
// 2. Signature problems
// ---------------------------------------------------------------------------

async fn assert_rejected(signature: Option<String>) {
    let source = CountingSource::new(false);
    let router = routes::build_router(make_state(&source, Some(SECRET)));

    let (status, body) = call(
        router,
        webhook_request("/v1/webhook", BODY, signature.as_deref()),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, WebhookFault::SignatureMismatch.public_message());
    assert!(!body.contains(&signed(BODY, SECRET)), "expected signature leaked");

    settle().await;
    assert_eq!(source.fetches(), 0);
}

#[tokio::test]
async fn wrong_signature_is_rejected() {
    assert_rejected(Some("sha1=0000000000000000000000000000000000000000".to_string())).await;
}

#[tokio::test]
async fn signature_from_other_secret_is_rejected() {
    assert_rejected(Some(signed(BODY, "not-the-secret"))).await;
}

#[tokio::test]
async fn missing_signature_header_is_rejected() {
    assert_rejected(None).await;
}

#[tokio::test]
async fn signature_over_different_body_is_rejected() {
    assert_rejected(Some(signed("{\"event\": \"update\"}", SECRET))).await;
}

// ---------------------------------------------------------------------------
// 3. Missing secret
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_secret_is_reported_first() {
    let source = CountingSource::new(false);
    let router = routes::build_router(make_state(&source, None));

    // Even a signature computed with the would-be secret does not get through.
    let sig = signed(BODY, SECRET);
    let (status, body) = call(router, webhook_request("/v1/webhook", BODY, Some(&sig))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Webhook secret not found");

    settle().await;
    assert_eq!(source.fetches(), 0);
}

#[tokio::test]
async fn missing_secret_wins_over_structured_body() {
    let source = CountingSource::new(false);
    let st = make_state(&source, None);
    let router = json_webhook_router(st);

    let (status, body) = call(router, webhook_request("/hook", BODY, None)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, WebhookFault::MissingSecret.public_message());
    settle().await;
    assert_eq!(source.fetches(), 0);
}

// ---------------------------------------------------------------------------
// 4. Body not parsed as text
// ---------------------------------------------------------------------------

/// A misconfigured host: the webhook sits behind a JSON parser.
fn json_webhook_router(st: Arc<state::AppState>) -> Router {
    Router::new()
        .route(
            "/hook",
            post(webhook_route).route_layer(middleware::from_fn(parse_body_as_json)),
        )
        .layer(middleware::from_fn_with_state(
            st.binder.clone(),
            bind_request,
        ))
        .with_state(st)
}

#[tokio::test]
async fn structured_body_is_an_integration_fault() {
    let source = CountingSource::new(false);
    let router = json_webhook_router(make_state(&source, Some(SECRET)));

    // Correctly signed, but the handler never sees the literal text.
    let sig = signed(BODY, SECRET);
    let (status, body) = call(router, webhook_request("/hook", BODY, Some(&sig))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        "Webhook request body not parsed as text. Unable to verify secure webhook"
    );
    settle().await;
    assert_eq!(source.fetches(), 0);
}

#[tokio::test]
async fn unparsed_body_is_an_integration_fault() {
    let source = CountingSource::new(false);
    let st = make_state(&source, Some(SECRET));
    let router = Router::new()
        .route("/hook", post(webhook_route))
        .with_state(st);

    let sig = signed(BODY, SECRET);
    let (status, body) = call(router, webhook_request("/hook", BODY, Some(&sig))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, WebhookFault::BodyNotText.public_message());
    settle().await;
    assert_eq!(source.fetches(), 0);
}
