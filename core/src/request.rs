//! Request payloads and the pieces they are built from.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
    /// `HEAD`
    Head,
    /// `OPTIONS`
    Options,
}

impl Method {
    /// The method as it appears on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Header layer.
///
/// Names are case-insensitive and stored lower-cased. A `None` value marks the
/// header as removed: when layers are merged it shadows any earlier value, and
/// [`Headers::resolve`] drops it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, Option<String>>",
    into = "BTreeMap<String, Option<String>>"
)]
pub struct Headers(BTreeMap<String, Option<String>>);

impl Headers {
    /// Create an empty header layer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header.
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert(name, Some(value.into()));
        self
    }

    /// Mark a header as removed.
    #[must_use]
    pub fn without(mut self, name: &str) -> Self {
        self.insert(name, None);
        self
    }

    /// Set or clear a header in place.
    pub fn insert(&mut self, name: &str, value: Option<String>) {
        self.0.insert(name.to_ascii_lowercase(), value);
    }

    /// Look up a header value. Removed headers read as absent.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(&name.to_ascii_lowercase())
            .and_then(Option::as_deref)
    }

    /// Returns true when the layer has no entries, removed or not.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of entries, including removals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Layer `later` over `self`. Entries in `later` win, removals included.
    #[must_use]
    pub fn merge(mut self, later: Self) -> Self {
        self.0.extend(later.0);
        self
    }

    /// Final header map with removed entries dropped.
    #[must_use]
    pub fn resolve(self) -> BTreeMap<String, String> {
        self.0
            .into_iter()
            .filter_map(|(name, value)| value.map(|value| (name, value)))
            .collect()
    }
}

impl From<BTreeMap<String, Option<String>>> for Headers {
    fn from(entries: BTreeMap<String, Option<String>>) -> Self {
        Self(
            entries
                .into_iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), value))
                .collect(),
        )
    }
}

impl From<Headers> for BTreeMap<String, Option<String>> {
    fn from(headers: Headers) -> Self {
        headers.0
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Headers {
    fn from(entries: [(&str, &str); N]) -> Self {
        entries
            .into_iter()
            .fold(Self::new(), |headers, (name, value)| headers.with(name, value))
    }
}

/// Transport options passed through to the HTTP client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOptions {
    /// Per-attempt timeout.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "duration_ms::option"
    )]
    pub timeout: Option<Duration>,

    /// Client-specific options the transport may understand.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FetchOptions {
    /// Create empty fetch options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a per-attempt timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Request or response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Body {
    /// A structured value, sent and received as JSON.
    Structured(Value),
    /// Plain text.
    Text(String),
    /// Raw bytes.
    Binary(Bytes),
}

impl Body {
    /// The structured value, if this is a structured body.
    #[must_use]
    pub const fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Structured(value) => Some(value),
            Self::Text(_) | Self::Binary(_) => None,
        }
    }

    /// The text, if this is a text body.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Structured(_) | Self::Binary(_) => None,
        }
    }

    /// The bytes, if this is a binary body.
    #[must_use]
    pub const fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Binary(bytes) => Some(bytes),
            Self::Structured(_) | Self::Text(_) => None,
        }
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structured(value) => write!(f, "{value}"),
            Self::Text(text) => f.write_str(text),
            Self::Binary(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Self::Structured(value)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::Binary(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(bytes))
    }
}

/// What a request intent asks for.
///
/// Unset fields fall back to the merged configuration when the request is
/// prepared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPayload {
    /// Path or URL, appended to the configured base URL.
    pub url: String,

    /// HTTP method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<Method>,

    /// Request headers, layered over the configured base headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Headers>,

    /// Additional attempts after the first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_times: Option<u32>,

    /// Delay before each retry.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "duration_ms::option"
    )]
    pub retry_interval: Option<Duration>,

    /// Transport options. Replaces the configured options when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_options: Option<FetchOptions>,

    /// Request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,
}

impl RequestPayload {
    /// Create a payload for `url` with every other field unset.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: None,
            headers: None,
            retry_times: None,
            retry_interval: None,
            fetch_options: None,
            body: None,
        }
    }

    /// Set the method.
    #[must_use]
    pub const fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Add a single header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers = Some(self.headers.unwrap_or_default().with(name, value));
        self
    }

    /// Replace the header layer.
    #[must_use]
    pub fn with_headers(mut self, headers: impl Into<Headers>) -> Self {
        self.headers = Some(headers.into());
        self
    }

    /// Set the number of retries.
    #[must_use]
    pub const fn with_retry_times(mut self, retry_times: u32) -> Self {
        self.retry_times = Some(retry_times);
        self
    }

    /// Set the delay before each retry.
    #[must_use]
    pub const fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = Some(retry_interval);
        self
    }

    /// Set transport options.
    #[must_use]
    pub fn with_fetch_options(mut self, fetch_options: FetchOptions) -> Self {
        self.fetch_options = Some(fetch_options);
        self
    }

    /// Set the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Serde helpers encoding [`Duration`] as integer milliseconds.
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serialize a duration as milliseconds.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error.
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    /// Deserialize a duration from milliseconds.
    ///
    /// # Errors
    ///
    /// Returns the deserializer's error.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }

    /// The same encoding for optional durations.
    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        /// Serialize an optional duration as milliseconds or `null`.
        ///
        /// # Errors
        ///
        /// Returns the serializer's error.
        pub fn serialize<S: Serializer>(
            duration: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match duration {
                Some(duration) => super::serialize(duration, serializer),
                None => serializer.serialize_none(),
            }
        }

        /// Deserialize an optional duration from milliseconds or `null`.
        ///
        /// # Errors
        ///
        /// Returns the deserializer's error.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
        }
    }
}
