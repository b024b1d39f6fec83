//! # Apium HTTP
//!
//! A [`Transport`] backed by [`reqwest`].
//!
//! ## Example
//!
//! ```ignore
//! use apium_http::ReqwestTransport;
//! use apium_runtime::{Orchestrator, OrchestratorConfig};
//!
//! let orchestrator = Orchestrator::new(
//!     OrchestratorConfig::new().with_base_url("https://api.example.com"),
//!     ReqwestTransport::new(),
//! );
//! ```
//!
//! Of the fetch options only `timeout` is understood. Other keys are logged
//! at debug level and ignored.

use apium_core::request::Method;
use apium_core::transport::{
    Transport, TransportError, TransportFuture, TransportRequest, TransportResponse,
};
use std::collections::BTreeMap;

/// HTTP transport using a shared [`reqwest::Client`].
///
/// Cloning is cheap; clones share the client's connection pool.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a default client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client, e.g. one with a global timeout or proxy.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let TransportRequest {
            url,
            method,
            headers,
            body,
            options,
        } = request;

        let mut builder = self.client.request(reqwest_method(method), &url);
        for (name, value) in &headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        if !options.extra.is_empty() {
            tracing::debug!(
                options = ?options.extra.keys().collect::<Vec<_>>(),
                "Ignoring unsupported fetch options"
            );
        }

        let response = builder.send().await.map_err(map_error)?;

        let status = response.status();
        let headers = response_headers(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        tracing::trace!(status = status.as_u16(), bytes = body.len(), "Received response");

        Ok(TransportResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().map(str::to_owned),
            headers,
            body,
        })
    }
}

impl Transport for ReqwestTransport {
    fn fetch(&self, request: TransportRequest) -> TransportFuture<'_> {
        Box::pin(self.send(request))
    }
}

const fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
        Method::Options => reqwest::Method::OPTIONS,
    }
}

/// Lower-cased header map. Values that are not visible ASCII are skipped.
fn response_headers(headers: &reqwest::header::HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_owned(), value.to_owned()))
        })
        .collect()
}

fn map_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else if error.is_builder() {
        TransportError::InvalidRequest(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}
