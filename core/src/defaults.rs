//! Policy defaults.
//!
//! Each hook here is the fallback used when the orchestrator's configuration
//! does not supply its own.

use crate::action::RequestAction;
use crate::request::{Body, Method};
use crate::response::{ParseError, ParsedResponse, ResponseParser};
use crate::transport::TransportResponse;
use bytes::Bytes;
use futures::future::BoxFuture;
use std::time::Duration;

/// Method for requests that name none anywhere.
pub const METHOD: Method = Method::Get;

/// Retries after the first attempt.
pub const RETRY_TIMES: u32 = 0;

/// Delay before each retry.
pub const RETRY_INTERVAL: Duration = Duration::from_millis(1000);

/// Content type for structured bodies.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A response is successful when its status is 2xx.
#[must_use]
pub const fn is_response_success(response: &TransportResponse) -> bool {
    response.ok()
}

/// `application/json` for structured bodies, nothing otherwise.
#[must_use]
pub fn content_type(request: &RequestAction) -> Option<String> {
    match request.payload.body {
        Some(Body::Structured(_)) => Some(JSON_CONTENT_TYPE.to_owned()),
        Some(Body::Text(_) | Body::Binary(_)) | None => None,
    }
}

/// Encode the request body: structured bodies as JSON text, others as-is.
#[must_use]
pub fn body(request: &RequestAction) -> Option<Bytes> {
    request.payload.body.as_ref().map(|body| match body {
        Body::Structured(value) => Bytes::from(value.to_string()),
        Body::Text(text) => Bytes::from(text.clone()),
        Body::Binary(bytes) => bytes.clone(),
    })
}

/// Parse JSON when the response says it is JSON, else keep the raw bytes.
///
/// # Errors
///
/// Returns [`ParseError::InvalidJson`] when the content type claims JSON and
/// the body does not decode.
pub fn parse_json_or_binary(response: &TransportResponse) -> Result<ParsedResponse, ParseError> {
    let is_json = response
        .content_type()
        .is_some_and(|content_type| content_type.contains(JSON_CONTENT_TYPE));

    if is_json {
        serde_json::from_slice(&response.body)
            .map(|value| ParsedResponse::new(Body::Structured(value)))
            .map_err(|e| ParseError::InvalidJson(e.to_string()))
    } else {
        Ok(ParsedResponse::new(Body::Binary(response.body.clone())))
    }
}

/// The default [`ResponseParser`]. See [`parse_json_or_binary`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResponseParser;

impl ResponseParser for DefaultResponseParser {
    fn parse<'a>(
        &'a self,
        response: &'a TransportResponse,
    ) -> BoxFuture<'a, Result<ParsedResponse, ParseError>> {
        Box::pin(async move { parse_json_or_binary(response) })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::meta::Meta;
    use crate::request::RequestPayload;
    use serde_json::json;

    fn with_body(body: Option<Body>) -> RequestAction {
        let mut payload = RequestPayload::new("/");
        payload.body = body;
        RequestAction::new(payload, Meta::new())
    }

    #[test]
    fn structured_bodies_are_json() {
        let request = with_body(Some(Body::Structured(json!({ "a": 1 }))));
        assert_eq!(content_type(&request).as_deref(), Some("application/json"));
        assert_eq!(body(&request), Some(Bytes::from_static(br#"{"a":1}"#)));
    }

    #[test]
    fn text_and_binary_pass_through() {
        let text = with_body(Some(Body::Text("hello".to_string())));
        assert!(content_type(&text).is_none());
        assert_eq!(body(&text), Some(Bytes::from_static(b"hello")));

        let binary = with_body(Some(Body::Binary(Bytes::from_static(&[0, 159]))));
        assert!(content_type(&binary).is_none());
        assert_eq!(body(&binary), Some(Bytes::from_static(&[0, 159])));
    }

    #[test]
    fn missing_body_has_no_content_type() {
        let request = with_body(None);
        assert!(content_type(&request).is_none());
        assert!(body(&request).is_none());
    }

    #[test]
    fn success_is_2xx() {
        assert!(is_response_success(&TransportResponse::new(200)));
        assert!(!is_response_success(&TransportResponse::new(400)));
        assert!(!is_response_success(&TransportResponse::new(500)));
    }

    #[tokio::test]
    async fn parses_json_by_content_type() {
        let response = TransportResponse::new(200)
            .with_header("Content-Type", "application/json; charset=utf-8")
            .with_body(r#"{"a":1}"#);

        let parsed = DefaultResponseParser.parse(&response).await.unwrap();
        assert_eq!(parsed.body, Body::Structured(json!({ "a": 1 })));
        assert!(parsed.meta.is_empty());
    }

    #[tokio::test]
    async fn non_json_is_binary() {
        let response = TransportResponse::new(200)
            .with_header("content-type", "text/plain")
            .with_body("plain");

        let parsed = DefaultResponseParser.parse(&response).await.unwrap();
        assert_eq!(parsed.body, Body::Binary(Bytes::from_static(b"plain")));
    }

    #[tokio::test]
    async fn invalid_json_is_an_error() {
        let response = TransportResponse::new(200)
            .with_header("content-type", "application/json")
            .with_body("{not json");

        let error = DefaultResponseParser.parse(&response).await.unwrap_err();
        assert!(matches!(error, ParseError::InvalidJson(_)));
    }
}
