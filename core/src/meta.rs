//! Event metadata.
//!
//! Every request intent and response event carries a [`Meta`] record. The
//! well-known keys are typed fields; anything else an application attaches
//! lives in [`Meta::extra`] and survives merging untouched.

use crate::action::{Action, RequestAction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Unique identifier linking a request intent with its response event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Mint a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata attached to requests and response events.
///
/// On the wire the typed fields use their camelCase names (`correlationId`,
/// `statusCode`, `originalRequest`, ...). Absent fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    /// The action that caused the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Box<Action>>,

    /// Links a request with its response event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,

    /// When the response event was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// HTTP status of the final attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,

    /// HTTP reason phrase of the final attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,

    /// The request as it was sent, after any transform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Box<RequestAction>>,

    /// The request as it was intercepted, before any transform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_request: Option<Box<RequestAction>>,

    /// Application-defined keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Meta {
    /// Create an empty metadata record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the origin action.
    #[must_use]
    pub fn with_origin(mut self, origin: Action) -> Self {
        self.origin = Some(Box::new(origin));
        self
    }

    /// Set the correlation id.
    #[must_use]
    pub const fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Set the timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the HTTP status code.
    #[must_use]
    pub const fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Set the HTTP reason phrase.
    #[must_use]
    pub fn with_status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = Some(status_text.into());
        self
    }

    /// Set the request as sent.
    #[must_use]
    pub fn with_request(mut self, request: RequestAction) -> Self {
        self.request = Some(Box::new(request));
        self
    }

    /// Set the request as intercepted.
    #[must_use]
    pub fn with_original_request(mut self, request: RequestAction) -> Self {
        self.original_request = Some(Box::new(request));
        self
    }

    /// Set an application-defined key. A `null` value removes the key.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        if value.is_null() {
            self.extra.remove(&key);
        } else {
            self.extra.insert(key, value);
        }
        self
    }

    /// Look up an application-defined key.
    #[must_use]
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Returns true when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.origin.is_none()
            && self.correlation_id.is_none()
            && self.timestamp.is_none()
            && self.status_code.is_none()
            && self.status_text.is_none()
            && self.request.is_none()
            && self.original_request.is_none()
            && self.extra.is_empty()
    }

    /// Layer `later` over `self`.
    ///
    /// Fields set in `later` win. Fields absent from `later` keep their
    /// current value. An extra key whose later value is `null` is dropped.
    #[must_use]
    pub fn merge(mut self, later: Self) -> Self {
        self.origin = later.origin.or(self.origin);
        self.correlation_id = later.correlation_id.or(self.correlation_id);
        self.timestamp = later.timestamp.or(self.timestamp);
        self.status_code = later.status_code.or(self.status_code);
        self.status_text = later.status_text.or(self.status_text);
        self.request = later.request.or(self.request);
        self.original_request = later.original_request.or(self.original_request);

        for (key, value) in later.extra {
            if value.is_null() {
                self.extra.remove(&key);
            } else {
                self.extra.insert(key, value);
            }
        }

        self
    }
}
