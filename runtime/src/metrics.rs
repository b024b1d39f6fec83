//! Prometheus metrics for observability and monitoring.
//!
//! This module provides metric collection for:
//! - Store dispatch and reducer execution
//! - Request interception, attempts and retries
//! - Request outcomes and settlement of response futures
//!
//! # Example
//!
//! ```rust,no_run
//! use apium_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! if let Some(text) = server.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics recorder.
///
/// Installs the global recorder and renders the scrape text. Serving it over
/// HTTP is left to the embedding application.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address the embedding application will serve metrics on
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g., in tests) this logs a warning
    /// and succeeds without a handle.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
                    5.0, 10.0, 30.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Address metrics are meant to be served on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the recorder was not installed by this server.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    // Store Metrics
    describe_counter!(
        "store_actions_dispatched_total",
        "Total number of actions dispatched into a store"
    );
    describe_histogram!(
        "store_reducer_duration_seconds",
        "Time taken to apply the reducer"
    );

    // Request Metrics
    describe_counter!(
        "apium_requests_intercepted_total",
        "Total number of request intents intercepted by the orchestrator"
    );
    describe_counter!(
        "apium_attempts_total",
        "Total number of transport attempts, first attempts included"
    );
    describe_counter!(
        "apium_retries_total",
        "Total number of attempts after the first"
    );
    describe_counter!(
        "apium_outcomes_total",
        "Total number of terminal events produced, by outcome"
    );
    describe_histogram!(
        "apium_request_duration_seconds",
        "Time from the first attempt to the terminal event"
    );
    describe_gauge!(
        "apium_requests_in_flight",
        "Requests whose attempt routine has not finished"
    );

    // Settlement Metrics
    describe_counter!(
        "apium_settlements_total",
        "Total number of terminal events matched against pending response futures, by result"
    );
}

/// Store metrics recorder.
pub struct StoreMetrics;

impl StoreMetrics {
    /// Record a dispatch.
    pub fn record_dispatch() {
        counter!("store_actions_dispatched_total").increment(1);
    }

    /// Record a reducer run.
    pub fn record_reduce(duration: Duration) {
        histogram!("store_reducer_duration_seconds").record(duration.as_secs_f64());
    }
}

/// Request metrics recorder.
pub struct RequestMetrics;

impl RequestMetrics {
    /// Record an intercepted request intent.
    pub fn record_intercepted() {
        counter!("apium_requests_intercepted_total").increment(1);
        gauge!("apium_requests_in_flight").increment(1.0);
    }

    /// Record a transport attempt.
    pub fn record_attempt() {
        counter!("apium_attempts_total").increment(1);
    }

    /// Record a retry.
    pub fn record_retry() {
        counter!("apium_retries_total").increment(1);
    }

    /// Record a terminal event.
    ///
    /// `outcome` is `"success"` or `"error"`.
    pub fn record_outcome(outcome: &'static str, duration: Duration) {
        counter!("apium_outcomes_total", "outcome" => outcome).increment(1);
        histogram!("apium_request_duration_seconds").record(duration.as_secs_f64());
        gauge!("apium_requests_in_flight").decrement(1.0);
    }

    /// Record a request that never reached its attempt routine.
    pub fn record_discarded() {
        gauge!("apium_requests_in_flight").decrement(1.0);
    }

    /// Record a settlement attempt.
    ///
    /// `result` is `"resolved"`, `"rejected"`, `"unobserved"` or `"unmatched"`.
    pub fn record_settlement(result: &'static str) {
        counter!("apium_settlements_total", "result" => result).increment(1);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn test_metrics_server_creation() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let server = MetricsServer::new(addr);
        assert!(server.handle().is_none());
        assert!(server.render().is_none());
        assert_eq!(server.addr(), addr);
    }

    #[test]
    fn test_metrics_server_start() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let mut server = MetricsServer::new(addr);

        let result = server.start();
        assert!(result.is_ok());
        // handle is None if another test already installed the recorder

        RequestMetrics::record_intercepted();
        RequestMetrics::record_attempt();
        RequestMetrics::record_outcome("success", Duration::from_millis(3));
        StoreMetrics::record_dispatch();

        if let Some(rendered) = server.render() {
            assert!(rendered.contains("apium_attempts_total"));
        }
    }
}
