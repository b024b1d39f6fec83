//! Integration tests for the quickstart state

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use apium_core::environment::Clock;
use apium_core::request::Body;
use apium_runtime::selectors::{is_fetching, last_fetched_at_by_origin_type};
use apium_runtime::{Middleware, Orchestrator, OrchestratorConfig, Store};
use apium_testing::fixtures::{json_response, status_response};
use apium_testing::{MockTransport, test_clock};
use quickstart::{AppState, LOAD_USERS, app_reducer, load_users};
use serde_json::json;
use std::sync::Arc;

fn store(transport: &MockTransport) -> Store<AppState> {
    let orchestrator: Arc<dyn Middleware<AppState>> = Arc::new(
        Orchestrator::new(
            OrchestratorConfig::new().with_base_url("https://api.test"),
            transport.clone(),
        )
        .with_clock(test_clock()),
    );
    Store::with_middleware(AppState::default(), app_reducer(), vec![orchestrator])
}

#[tokio::test]
async fn test_loaded_users_land_in_both_slices() {
    let transport = MockTransport::new().with_response(json_response(200, json!([{ "id": 1 }])));
    let store = store(&transport);

    store.request(load_users(1)).await.unwrap();

    assert_eq!(
        transport.last_request().unwrap().url,
        "https://api.test/users?_limit=1"
    );
    store.state(|s| {
        assert_eq!(s.users.list, Some(json!([{ "id": 1 }])));
        assert!(!is_fetching(LOAD_USERS, s));
        assert_eq!(last_fetched_at_by_origin_type(LOAD_USERS, s), Some(test_clock().now()));
    });
}

#[tokio::test]
async fn test_failed_load_keeps_previous_list() {
    let transport = MockTransport::new()
        .with_response(json_response(200, json!(["first"])))
        .with_response(status_response(503));
    let store = store(&transport);

    store.request(load_users(1)).await.unwrap();
    let error = store.request(load_users(1)).await.unwrap_err();

    assert_eq!(error.rejected().unwrap().payload, Body::Binary(Default::default()));
    store.state(|s| {
        assert_eq!(s.users.list, Some(json!(["first"])));
        assert_eq!(s.users.failure.as_deref(), Some("<0 bytes>"));
    });
}
