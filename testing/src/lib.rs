//! # Apium Testing
//!
//! Testing utilities and helpers for apium.
//!
//! This crate provides:
//! - [`FixedClock`] for deterministic event timestamps
//! - [`MockTransport`], a scripted transport that records every request
//! - Fixtures for origins, request intents and transport responses
//! - [`ReducerTest`], a Given-When-Then helper for reducers
//!
//! ## Example
//!
//! ```ignore
//! use apium_testing::{fixtures, test_clock, MockTransport};
//!
//! #[tokio::test]
//! async fn loads_users() {
//!     let transport = MockTransport::new()
//!         .with_response(fixtures::json_response(200, json!([{ "id": 1 }])));
//!     let orchestrator = Orchestrator::new(OrchestratorConfig::new(), transport.clone())
//!         .with_clock(test_clock());
//!     let store = Store::with_middleware(ApiumState::default(), ApiumReducer, vec![Arc::new(orchestrator)]);
//!
//!     let users = store.request(fixtures::request_from("/users", "users/LOAD")).await.unwrap();
//!     assert_eq!(transport.calls(), 1);
//! }
//! ```

use apium_core::environment::Clock;
use chrono::{DateTime, Utc};

pub mod transport;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use apium_testing::mocks::FixedClock;
    /// use apium_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Builders for the values tests keep constructing.
pub mod fixtures {
    use apium_core::action::{Action, request};
    use apium_core::meta::Meta;
    use apium_core::request::RequestPayload;
    use apium_core::transport::TransportResponse;
    use serde_json::Value;

    /// An application action to use as a request origin.
    #[must_use]
    pub fn origin(origin_type: &str) -> Action {
        Action::custom(origin_type, Value::Null)
    }

    /// A request intent for `url` caused by an `origin_type` action.
    #[must_use]
    pub fn request_from(url: &str, origin_type: &str) -> Action {
        request_with(RequestPayload::new(url), origin_type)
    }

    /// A request intent for `payload` caused by an `origin_type` action.
    #[must_use]
    pub fn request_with(payload: RequestPayload, origin_type: &str) -> Action {
        request(payload, Meta::new().with_origin(origin(origin_type)))
    }

    /// A JSON response.
    #[must_use]
    pub fn json_response(status: u16, body: Value) -> TransportResponse {
        TransportResponse::new(status)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
    }

    /// A plain-text response.
    #[must_use]
    pub fn text_response(status: u16, body: &str) -> TransportResponse {
        TransportResponse::new(status)
            .with_header("content-type", "text/plain")
            .with_body(body.to_owned())
    }

    /// An empty response.
    #[must_use]
    pub const fn status_response(status: u16) -> TransportResponse {
        TransportResponse::new(status)
    }
}

/// Install a `tracing` subscriber writing to the test harness.
///
/// Honours `RUST_LOG`. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};
pub use reducer_test::ReducerTest;
pub use transport::MockTransport;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn test_json_fixture_is_json() {
        let response = fixtures::json_response(201, serde_json::json!({ "a": 1 }));
        assert_eq!(response.status, 201);
        assert_eq!(response.content_type(), Some("application/json"));
        assert_eq!(&response.body[..], br#"{"a":1}"#);
    }

    #[test]
    fn test_request_fixture_names_origin() {
        let action = fixtures::request_from("/users", "users/LOAD");
        assert_eq!(
            apium_core::origin::origin_type_of(&action),
            Some("users/LOAD")
        );
    }
}
