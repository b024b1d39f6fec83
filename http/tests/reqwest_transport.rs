//! End-to-end tests: store, orchestrator and reqwest transport against a
//! local mock server.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use apium_core::request::{Body, FetchOptions, Method, RequestPayload};
use apium_http::ReqwestTransport;
use apium_runtime::selectors::is_fetching;
use apium_runtime::state::{ApiumReducer, ApiumState};
use apium_runtime::{Middleware, Orchestrator, OrchestratorConfig, Store};
use apium_testing::fixtures::{request_from, request_with};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store_for(server: &MockServer) -> Store<ApiumState> {
    let orchestrator: Arc<dyn Middleware<ApiumState>> = Arc::new(Orchestrator::new(
        OrchestratorConfig::new()
            .with_base_url(server.uri())
            .with_base_headers([("x-client", "apium-tests")]),
        ReqwestTransport::new(),
    ));
    Store::with_middleware(ApiumState::default(), ApiumReducer, vec![orchestrator])
}

#[tokio::test]
async fn test_json_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/1"))
        .and(header("x-client", "apium-tests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1, "name": "Ada" })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let success = store.request(request_from("/users/1", "users/GET")).await.unwrap();

    assert_eq!(success.payload, Body::Structured(json!({ "id": 1, "name": "Ada" })));
    assert_eq!(success.meta.status_code, Some(200));
    assert_eq!(success.meta.status_text.as_deref(), Some("OK"));
    assert!(!store.state(|s| is_fetching("users/GET", s)));
}

#[tokio::test]
async fn test_structured_body_is_sent_as_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "name": "Grace" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 2 })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let payload = RequestPayload::new("/users")
        .with_method(Method::Post)
        .with_body(json!({ "name": "Grace" }));
    let success = store.request(request_with(payload, "users/CREATE")).await.unwrap();

    assert_eq!(success.meta.status_code, Some(201));
    assert_eq!(success.payload, Body::Structured(json!({ "id": 2 })));
}

#[tokio::test]
async fn test_client_error_is_retried_then_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(422).set_body_string("nope"))
        .expect(3)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let payload = RequestPayload::new("/flaky")
        .with_retry_times(2)
        .with_retry_interval(Duration::from_millis(5));
    let error = store.request(request_with(payload, "flaky/LOAD")).await.unwrap_err();

    let rejected = error.rejected().unwrap();
    assert_eq!(rejected.meta.status_code, Some(422));
    assert_eq!(rejected.payload, Body::Binary(bytes_of("nope")));
}

#[tokio::test]
async fn test_fetch_timeout_becomes_error_event() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let payload = RequestPayload::new("/slow")
        .with_fetch_options(FetchOptions::new().with_timeout(Duration::from_millis(50)));
    let error = store.request(request_with(payload, "slow/LOAD")).await.unwrap_err();

    let rejected = error.rejected().unwrap();
    assert_eq!(rejected.payload, Body::Text("Request timed out".to_string()));
    assert!(rejected.meta.status_code.is_none());
}

#[tokio::test]
async fn test_unreachable_host_becomes_error_event() {
    // Nothing listens on port 1.
    let orchestrator: Arc<dyn Middleware<ApiumState>> = Arc::new(Orchestrator::new(
        OrchestratorConfig::new().with_base_url("http://127.0.0.1:1"),
        ReqwestTransport::new(),
    ));
    let store = Store::with_middleware(ApiumState::default(), ApiumReducer, vec![orchestrator]);

    let error = store.request(request_from("/gone", "gone/LOAD")).await.unwrap_err();

    let rejected = error.rejected().unwrap();
    assert!(rejected.payload.as_text().unwrap().starts_with("Connection failed"));
}

fn bytes_of(text: &'static str) -> bytes::Bytes {
    bytes::Bytes::from_static(text.as_bytes())
}
