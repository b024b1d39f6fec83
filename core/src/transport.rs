//! The seam between the orchestrator and an HTTP client.
//!
//! A [`Transport`] performs one attempt: it sends a fully prepared
//! [`TransportRequest`] and hands back the status, headers and the complete
//! body. Bodies are read by the transport so policy hooks can inspect them
//! synchronously and the parser can be re-run on every attempt.

use crate::request::{FetchOptions, Method};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// A request ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    /// Full URL: base URL plus request path.
    pub url: String,
    /// HTTP method.
    pub method: Method,
    /// Final headers, names lower-cased.
    pub headers: BTreeMap<String, String>,
    /// Encoded body.
    pub body: Option<Bytes>,
    /// Client options.
    pub options: FetchOptions,
}

impl TransportRequest {
    /// Look up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// A response with its body fully read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// HTTP reason phrase.
    pub status_text: Option<String>,
    /// Response headers, names lower-cased.
    pub headers: BTreeMap<String, String>,
    /// Response body.
    pub body: Bytes,
}

impl TransportResponse {
    /// Create an empty response with the given status.
    #[must_use]
    pub const fn new(status: u16) -> Self {
        Self {
            status,
            status_text: None,
            headers: BTreeMap::new(),
            body: Bytes::new(),
        }
    }

    /// Set the reason phrase.
    #[must_use]
    pub fn with_status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = Some(status_text.into());
        self
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Set the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub const fn ok(&self) -> bool {
        matches!(self.status, 200..=299)
    }

    /// Look up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The `content-type` header.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

/// Errors from a single transport attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The attempt exceeded its timeout.
    #[error("Request timed out")]
    Timeout,

    /// The request could not be built (bad URL, invalid header, ...).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The response body could not be read.
    #[error("Failed to read response body: {0}")]
    Body(String),

    /// Anything else.
    #[error("Transport error: {0}")]
    Other(String),
}

/// Future returned by [`Transport::fetch`].
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + Send + 'a>>;

/// Performs HTTP attempts.
///
/// This trait is dyn-compatible so the orchestrator can hold any client as
/// `Arc<dyn Transport>`.
pub trait Transport: Send + Sync {
    /// Send `request` and read the whole response.
    fn fetch(&self, request: TransportRequest) -> TransportFuture<'_>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn fetch(&self, request: TransportRequest) -> TransportFuture<'_> {
        (**self).fetch(request)
    }
}
