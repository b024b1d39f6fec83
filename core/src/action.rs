//! Actions flowing through the bus.
//!
//! An [`Action`] is either one of apium's own events (request intent,
//! success, error, configuration patch) or an application-defined action.
//! All of them share the wire shape `{ "type", "payload", "meta" }`.

use crate::config::ConfigurationPatch;
use crate::meta::{CorrelationId, Meta};
use crate::request::{Body, RequestPayload};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical action type strings.
pub mod action_types {
    /// Namespace shared by every apium action type.
    pub const PREFIX: &str = "@apium";
    /// Request intent.
    pub const REQUEST: &str = "@apium/REQUEST";
    /// Successful response event.
    pub const SUCCESS: &str = "@apium/SUCCESS";
    /// Error response event.
    pub const ERROR: &str = "@apium/ERROR";
    /// Runtime configuration patch.
    pub const CONFIGURE: &str = "@apium/CONFIGURE";
}

/// A request intent: what to fetch, and which action caused it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestAction {
    /// What to fetch.
    pub payload: RequestPayload,
    /// Origin, correlation id and application metadata.
    #[serde(default)]
    pub meta: Meta,
}

impl RequestAction {
    /// Create a request intent.
    #[must_use]
    pub const fn new(payload: RequestPayload, meta: Meta) -> Self {
        Self { payload, meta }
    }

    /// Tag the request with `correlation_id`, replacing any previous tag.
    #[must_use]
    pub const fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.meta.correlation_id = Some(correlation_id);
        self
    }
}

/// A terminal response event, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEvent {
    /// Parsed response body, or a textual error description.
    pub payload: Body,
    /// Origin, correlation id, request snapshots and HTTP status.
    #[serde(default)]
    pub meta: Meta,
}

impl ResponseEvent {
    /// Create a response event.
    #[must_use]
    pub const fn new(payload: Body, meta: Meta) -> Self {
        Self { payload, meta }
    }
}

/// An application-defined action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomAction {
    /// The action type.
    pub action_type: String,
    /// Arbitrary payload.
    pub payload: Value,
    /// Arbitrary metadata.
    pub meta: Meta,
}

/// Everything that flows through the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAction", into = "RawAction")]
pub enum Action {
    /// `@apium/REQUEST`
    Request(RequestAction),
    /// `@apium/SUCCESS`
    Success(ResponseEvent),
    /// `@apium/ERROR`
    Error(ResponseEvent),
    /// `@apium/CONFIGURE`
    Configure(ConfigurationPatch),
    /// Any other action type.
    Custom(CustomAction),
}

impl Action {
    /// Create an application-defined action with empty metadata.
    ///
    /// The type is taken as given. Use [`Action::from_parts`] to map reserved
    /// `@apium/...` types onto their typed variants.
    #[must_use]
    pub fn custom(action_type: impl Into<String>, payload: Value) -> Self {
        Self::Custom(CustomAction {
            action_type: action_type.into(),
            payload,
            meta: Meta::default(),
        })
    }

    /// Build an action from its wire parts.
    ///
    /// # Errors
    ///
    /// Returns an error when `action_type` is a reserved apium type and the
    /// payload does not have the shape that type requires.
    pub fn from_parts(
        action_type: impl Into<String>,
        payload: Value,
        meta: Meta,
    ) -> Result<Self, serde_json::Error> {
        Self::try_from(RawAction {
            action_type: action_type.into(),
            payload,
            meta,
        })
    }

    /// The action's type string.
    #[must_use]
    pub fn action_type(&self) -> &str {
        match self {
            Self::Request(_) => action_types::REQUEST,
            Self::Success(_) => action_types::SUCCESS,
            Self::Error(_) => action_types::ERROR,
            Self::Configure(_) => action_types::CONFIGURE,
            Self::Custom(custom) => &custom.action_type,
        }
    }

    /// The action's metadata. Configuration patches carry none.
    #[must_use]
    pub const fn meta(&self) -> Option<&Meta> {
        match self {
            Self::Request(request) => Some(&request.meta),
            Self::Success(event) | Self::Error(event) => Some(&event.meta),
            Self::Custom(custom) => Some(&custom.meta),
            Self::Configure(_) => None,
        }
    }

    /// Mutable access to the action's metadata.
    pub const fn meta_mut(&mut self) -> Option<&mut Meta> {
        match self {
            Self::Request(request) => Some(&mut request.meta),
            Self::Success(event) | Self::Error(event) => Some(&mut event.meta),
            Self::Custom(custom) => Some(&mut custom.meta),
            Self::Configure(_) => None,
        }
    }

    /// Replace the action's metadata, if it carries any.
    #[must_use]
    pub fn with_meta(mut self, meta: Meta) -> Self {
        if let Some(slot) = self.meta_mut() {
            *slot = meta;
        }
        self
    }

    /// The request intent, if this is one.
    #[must_use]
    pub const fn as_request(&self) -> Option<&RequestAction> {
        match self {
            Self::Request(request) => Some(request),
            _ => None,
        }
    }

    /// The response event, if this is one.
    #[must_use]
    pub const fn as_response(&self) -> Option<&ResponseEvent> {
        match self {
            Self::Success(event) | Self::Error(event) => Some(event),
            _ => None,
        }
    }
}

/// Create a request intent.
#[must_use]
pub const fn request(payload: RequestPayload, meta: Meta) -> Action {
    Action::Request(RequestAction::new(payload, meta))
}

/// Create a success event.
#[must_use]
pub const fn success_event(payload: Body, meta: Meta) -> Action {
    Action::Success(ResponseEvent::new(payload, meta))
}

/// Create an error event.
#[must_use]
pub const fn error_event(payload: Body, meta: Meta) -> Action {
    Action::Error(ResponseEvent::new(payload, meta))
}

/// Create a runtime configuration patch.
#[must_use]
pub const fn configure(patch: ConfigurationPatch) -> Action {
    Action::Configure(patch)
}

/// Wire shape shared by every action.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawAction {
    #[serde(rename = "type")]
    action_type: String,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    meta: Meta,
}

impl TryFrom<RawAction> for Action {
    type Error = serde_json::Error;

    fn try_from(raw: RawAction) -> Result<Self, serde_json::Error> {
        let RawAction {
            action_type,
            payload,
            meta,
        } = raw;

        Ok(match action_type.as_str() {
            action_types::REQUEST => request(serde_json::from_value(payload)?, meta),
            action_types::SUCCESS => success_event(serde_json::from_value(payload)?, meta),
            action_types::ERROR => error_event(serde_json::from_value(payload)?, meta),
            action_types::CONFIGURE => configure(serde_json::from_value(payload)?),
            _ => Self::Custom(CustomAction {
                action_type,
                payload,
                meta,
            }),
        })
    }
}

impl From<Action> for RawAction {
    fn from(action: Action) -> Self {
        let action_type = action.action_type().to_owned();
        let (payload, meta) = match action {
            Action::Request(request) => (to_value(&request.payload), request.meta),
            Action::Success(event) | Action::Error(event) => (to_value(&event.payload), event.meta),
            Action::Configure(patch) => (to_value(&patch), Meta::default()),
            Action::Custom(custom) => (custom.payload, custom.meta),
        };
        Self {
            action_type,
            payload,
            meta,
        }
    }
}

// Only string-keyed maps reach this, so serialization cannot fail in practice.
fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use serde_json::json;

    fn origin() -> Action {
        Action::custom("users/LOAD", json!({ "page": 1 }))
    }

    #[test]
    fn action_types_are_canonical() {
        let meta = Meta::new().with_origin(origin());
        assert_eq!(
            request(RequestPayload::new("/"), meta.clone()).action_type(),
            "@apium/REQUEST"
        );
        assert_eq!(
            success_event(Body::from("ok"), meta.clone()).action_type(),
            "@apium/SUCCESS"
        );
        assert_eq!(
            error_event(Body::from("no"), meta).action_type(),
            "@apium/ERROR"
        );
        assert_eq!(
            configure(ConfigurationPatch::default()).action_type(),
            "@apium/CONFIGURE"
        );
        assert_eq!(origin().action_type(), "users/LOAD");
    }

    #[test]
    fn request_wire_shape() {
        let action = request(
            RequestPayload::new("/users"),
            Meta::new().with_origin(origin()),
        );

        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "@apium/REQUEST",
                "payload": { "url": "/users" },
                "meta": {
                    "origin": {
                        "type": "users/LOAD",
                        "payload": { "page": 1 },
                        "meta": {},
                    }
                },
            })
        );

        let decoded: Action = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, action);
    }

    #[test]
    fn reserved_types_decode_to_typed_variants() {
        let action = Action::from_parts(
            action_types::SUCCESS,
            json!({ "structured": [1, 2] }),
            Meta::new().with_status_code(200),
        )
        .unwrap();

        let event = action.as_response().unwrap();
        assert!(matches!(action, Action::Success(_)));
        assert_eq!(event.payload, Body::Structured(json!([1, 2])));
        assert_eq!(event.meta.status_code, Some(200));
    }

    #[test]
    fn malformed_reserved_payload_is_rejected() {
        let result = Action::from_parts(action_types::REQUEST, json!({ "method": "GET" }), Meta::new());
        assert!(result.is_err());
    }

    #[test]
    fn configure_carries_no_meta() {
        let mut action = configure(ConfigurationPatch::default());
        assert!(action.meta().is_none());
        assert!(action.meta_mut().is_none());
    }
}
