//! Turning transport responses into event payloads.

use crate::meta::Meta;
use crate::request::Body;
use crate::transport::TransportResponse;
use futures::future::BoxFuture;
use thiserror::Error;

/// What a parser extracts from a response.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    /// Payload of the resulting event.
    pub body: Body,
    /// Metadata layered over everything else on the resulting event.
    pub meta: Meta,
}

impl ParsedResponse {
    /// A parsed body with no extra metadata.
    #[must_use]
    pub fn new(body: Body) -> Self {
        Self {
            body,
            meta: Meta::default(),
        }
    }

    /// Attach metadata.
    #[must_use]
    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }
}

/// Errors from a response parser.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The body claimed to be JSON and was not.
    #[error("Invalid JSON response body: {0}")]
    InvalidJson(String),

    /// Parser-specific failure.
    #[error("Response parsing failed: {0}")]
    Other(String),
}

/// Extracts the event payload from a response.
///
/// Parsing is asynchronous so implementations may consult other services.
pub trait ResponseParser: Send + Sync {
    /// Parse `response`.
    fn parse<'a>(
        &'a self,
        response: &'a TransportResponse,
    ) -> BoxFuture<'a, Result<ParsedResponse, ParseError>>;
}

/// Adapter for synchronous parser functions. See [`parse_with`].
#[derive(Debug, Clone, Copy)]
pub struct FnParser<F>(F);

/// Use a synchronous function as a [`ResponseParser`].
///
/// # Example
///
/// ```
/// use apium_core::request::Body;
/// use apium_core::response::{parse_with, ParsedResponse};
///
/// let parser = parse_with(|response| {
///     Ok(ParsedResponse::new(Body::Text(
///         String::from_utf8_lossy(&response.body).into_owned(),
///     )))
/// });
/// # let _ = parser;
/// ```
pub const fn parse_with<F>(parser: F) -> FnParser<F>
where
    F: Fn(&TransportResponse) -> Result<ParsedResponse, ParseError> + Send + Sync,
{
    FnParser(parser)
}

impl<F> ResponseParser for FnParser<F>
where
    F: Fn(&TransportResponse) -> Result<ParsedResponse, ParseError> + Send + Sync,
{
    fn parse<'a>(
        &'a self,
        response: &'a TransportResponse,
    ) -> BoxFuture<'a, Result<ParsedResponse, ParseError>> {
        Box::pin(futures::future::ready((self.0)(response)))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn fn_parser_runs_the_function() {
        let parser = parse_with(|response| {
            Ok(ParsedResponse::new(Body::Structured(json!(response.status)))
                .with_meta(Meta::new().with_extra("parsed", json!(true))))
        });

        let parsed = parser.parse(&TransportResponse::new(201)).await.unwrap();
        assert_eq!(parsed.body, Body::Structured(json!(201)));
        assert_eq!(parsed.meta.extra("parsed"), Some(&json!(true)));
    }
}
