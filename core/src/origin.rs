//! Origin utilities.
//!
//! Applications usually care about "the response to *my* request", and the
//! handle they have on a request is the action that caused it. These
//! functions read events through that lens: who caused them, which phase
//! they belong to, and whether they match a [`Criterion`].

use crate::action::{Action, RequestAction, action_types};
use crate::meta::CorrelationId;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// The action that caused `action`.
#[must_use]
pub fn origin_of(action: &Action) -> Option<&Action> {
    action.meta()?.origin.as_deref()
}

/// The type of the action that caused `action`.
#[must_use]
pub fn origin_type_of(action: &Action) -> Option<&str> {
    origin_of(action).map(Action::action_type)
}

/// The correlation id carried by `action`.
#[must_use]
pub fn correlation_id_of(action: &Action) -> Option<CorrelationId> {
    action.meta()?.correlation_id
}

/// A copy of `action` tagged with `correlation_id`.
///
/// Actions without metadata are returned unchanged.
#[must_use]
pub fn with_correlation_id(correlation_id: CorrelationId, action: &Action) -> Action {
    let mut tagged = action.clone();
    if let Some(meta) = tagged.meta_mut() {
        meta.correlation_id = Some(correlation_id);
    }
    tagged
}

/// When the response event `action` was produced.
#[must_use]
pub fn timestamp_of(action: &Action) -> Option<DateTime<Utc>> {
    action.meta()?.timestamp
}

/// The request snapshot carried by the response event `action`.
#[must_use]
pub fn request_of(action: &Action) -> Option<&RequestAction> {
    action.meta()?.request.as_deref()
}

/// Which phase of the request lifecycle an action belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// A request intent.
    Request,
    /// A successful response event.
    Success,
    /// An error response event.
    Error,
    /// Anything else.
    None,
}

impl Classification {
    /// Success or error.
    #[must_use]
    pub const fn is_response(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

/// Classify `action` by its type string.
///
/// A custom action carrying a reserved type classifies like the built-in
/// variant of that type.
#[must_use]
pub fn classify(action: &Action) -> Classification {
    match action.action_type() {
        action_types::REQUEST => Classification::Request,
        action_types::SUCCESS => Classification::Success,
        action_types::ERROR => Classification::Error,
        _ => Classification::None,
    }
}

/// Selects events by their origin.
#[derive(Clone, Default)]
pub enum Criterion {
    /// Every event.
    #[default]
    Any,
    /// Events whose origin type is in the set.
    OriginTypes(BTreeSet<String>),
    /// Events the predicate accepts.
    Predicate(Arc<dyn Fn(&Action) -> bool + Send + Sync>),
}

impl Criterion {
    /// Match events caused by `origin_type`.
    #[must_use]
    pub fn origin_type(origin_type: impl Into<String>) -> Self {
        Self::OriginTypes(BTreeSet::from([origin_type.into()]))
    }

    /// Match events caused by any of `origin_types`.
    #[must_use]
    pub fn origin_types<I, T>(origin_types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::OriginTypes(origin_types.into_iter().map(Into::into).collect())
    }

    /// Match events `predicate` accepts.
    #[must_use]
    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&Action) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(predicate))
    }

    /// Returns true when `action` satisfies the criterion.
    #[must_use]
    pub fn matches(&self, action: &Action) -> bool {
        match self {
            Self::Any => true,
            Self::OriginTypes(types) => {
                origin_type_of(action).is_some_and(|origin_type| types.contains(origin_type))
            },
            Self::Predicate(predicate) => predicate(action),
        }
    }
}

impl fmt::Debug for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::OriginTypes(types) => f.debug_tuple("OriginTypes").field(types).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<&str> for Criterion {
    fn from(origin_type: &str) -> Self {
        Self::origin_type(origin_type)
    }
}

impl From<String> for Criterion {
    fn from(origin_type: String) -> Self {
        Self::origin_type(origin_type)
    }
}

impl<const N: usize> From<[&str; N]> for Criterion {
    fn from(origin_types: [&str; N]) -> Self {
        Self::origin_types(origin_types)
    }
}

impl From<Vec<String>> for Criterion {
    fn from(origin_types: Vec<String>) -> Self {
        Self::origin_types(origin_types)
    }
}

/// A request intent matching `criterion`.
#[must_use]
pub fn is_request_of(criterion: &Criterion, action: &Action) -> bool {
    classify(action) == Classification::Request && criterion.matches(action)
}

/// A success event matching `criterion`.
#[must_use]
pub fn is_success_of(criterion: &Criterion, action: &Action) -> bool {
    classify(action) == Classification::Success && criterion.matches(action)
}

/// An error event matching `criterion`.
#[must_use]
pub fn is_error_of(criterion: &Criterion, action: &Action) -> bool {
    classify(action) == Classification::Error && criterion.matches(action)
}

/// A response event, successful or not, matching `criterion`.
#[must_use]
pub fn is_response_of(criterion: &Criterion, action: &Action) -> bool {
    classify(action).is_response() && criterion.matches(action)
}

/// Any request intent.
#[must_use]
pub fn is_any_request(action: &Action) -> bool {
    matches!(classify(action), Classification::Request)
}

/// Any success event.
#[must_use]
pub fn is_any_success(action: &Action) -> bool {
    matches!(classify(action), Classification::Success)
}

/// Any error event.
#[must_use]
pub fn is_any_error(action: &Action) -> bool {
    matches!(classify(action), Classification::Error)
}

/// Any response event.
#[must_use]
pub fn is_any_response(action: &Action) -> bool {
    classify(action).is_response()
}

/// A request intent that cannot be served.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    /// `meta.origin` is missing or has an empty type.
    #[error("Apium requests must carry the action that caused them in `meta.origin`, with a non-empty type")]
    MissingOriginType,

    /// `meta.origin` is itself a response event.
    #[error("The origin of an apium request cannot be an apium response event (got `{origin_type}`)")]
    OriginIsResponse {
        /// The offending origin type.
        origin_type: String,
    },
}

/// Check that `request` names a usable origin, and return it.
///
/// # Errors
///
/// Returns [`ContractViolation::MissingOriginType`] when there is no origin or
/// its type is empty, and [`ContractViolation::OriginIsResponse`] when the
/// origin is a success or error event.
pub fn validate_origin(request: &RequestAction) -> Result<&Action, ContractViolation> {
    let origin = request
        .meta
        .origin
        .as_deref()
        .filter(|origin| !origin.action_type().is_empty())
        .ok_or(ContractViolation::MissingOriginType)?;

    if classify(origin).is_response() {
        return Err(ContractViolation::OriginIsResponse {
            origin_type: origin.action_type().to_owned(),
        });
    }

    Ok(origin)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::action::{error_event, request, success_event};
    use crate::meta::Meta;
    use crate::request::{Body, RequestPayload};
    use serde_json::Value;

    fn caused_by(origin_type: &str) -> Meta {
        Meta::new().with_origin(Action::custom(origin_type, Value::Null))
    }

    #[test]
    fn reads_origin_type() {
        let action = request(RequestPayload::new("/"), caused_by("users/LOAD"));
        assert_eq!(origin_type_of(&action), Some("users/LOAD"));
        assert!(origin_type_of(&Action::custom("plain", Value::Null)).is_none());
    }

    #[test]
    fn tagging_does_not_touch_the_input() {
        let id = CorrelationId::new();
        let action = request(RequestPayload::new("/"), caused_by("users/LOAD"));

        let tagged = with_correlation_id(id, &action);
        assert_eq!(correlation_id_of(&tagged), Some(id));
        assert!(correlation_id_of(&action).is_none());
    }

    #[test]
    fn classifies_every_phase() {
        let meta = caused_by("x");
        assert_eq!(
            classify(&request(RequestPayload::new("/"), meta.clone())),
            Classification::Request
        );
        assert_eq!(
            classify(&success_event(Body::from("ok"), meta.clone())),
            Classification::Success
        );
        assert_eq!(classify(&error_event(Body::from("no"), meta)), Classification::Error);
        assert_eq!(classify(&Action::custom("x", Value::Null)), Classification::None);
    }

    #[test]
    fn criteria_select_by_origin() {
        let event = success_event(Body::from("ok"), caused_by("users/LOAD"));

        assert!(is_success_of(&Criterion::Any, &event));
        assert!(is_success_of(&Criterion::from("users/LOAD"), &event));
        assert!(is_response_of(&Criterion::from(["posts/LOAD", "users/LOAD"]), &event));
        assert!(!is_success_of(&Criterion::from("posts/LOAD"), &event));
        assert!(!is_error_of(&Criterion::Any, &event));
        assert!(!is_request_of(&Criterion::Any, &event));

        let by_status = Criterion::predicate(|action| {
            action
                .meta()
                .is_some_and(|meta| meta.status_code == Some(200))
        });
        assert!(!by_status.matches(&event));
    }

    #[test]
    fn any_predicates_ignore_origin() {
        let plain = error_event(Body::from("boom"), Meta::new());
        assert!(is_any_error(&plain));
        assert!(is_any_response(&plain));
        assert!(!is_any_success(&plain));
        assert!(!is_any_request(&plain));
    }

    #[test]
    fn origin_must_be_present() {
        let request = RequestAction::new(RequestPayload::new("/"), Meta::new());
        assert_eq!(validate_origin(&request), Err(ContractViolation::MissingOriginType));

        let empty = RequestAction::new(RequestPayload::new("/"), caused_by(""));
        assert_eq!(validate_origin(&empty), Err(ContractViolation::MissingOriginType));
    }

    #[test]
    fn origin_cannot_be_a_response() {
        let response = success_event(Body::from("ok"), caused_by("users/LOAD"));
        let request = RequestAction::new(
            RequestPayload::new("/"),
            Meta::new().with_origin(response),
        );

        assert_eq!(
            validate_origin(&request),
            Err(ContractViolation::OriginIsResponse {
                origin_type: "@apium/SUCCESS".to_string(),
            })
        );
    }

    #[test]
    fn reserved_types_classify_by_name() {
        assert_eq!(
            classify(&Action::custom(action_types::SUCCESS, Value::Null)),
            Classification::Success
        );
        assert_eq!(
            classify(&Action::custom(action_types::ERROR, Value::Null)),
            Classification::Error
        );
        assert_eq!(
            classify(&Action::custom(action_types::REQUEST, Value::Null)),
            Classification::Request
        );
        assert!(is_any_response(&Action::custom(action_types::ERROR, Value::Null)));
    }

    #[test]
    fn custom_action_with_response_type_is_rejected_as_origin() {
        for origin_type in [action_types::SUCCESS, action_types::ERROR] {
            let request = RequestAction::new(
                RequestPayload::new("/"),
                Meta::new().with_origin(Action::custom(origin_type, Value::Null)),
            );

            assert_eq!(
                validate_origin(&request),
                Err(ContractViolation::OriginIsResponse {
                    origin_type: origin_type.to_string(),
                })
            );
        }
    }

    proptest::proptest! {
        #[test]
        fn origin_set_matches_exactly_its_members(
            members in proptest::collection::btree_set("[a-e]/[A-C]", 0..5),
            origin_type in "[a-e]/[A-C]",
        ) {
            let criterion = Criterion::OriginTypes(members.clone());
            let event = success_event(Body::from("ok"), caused_by(&origin_type));
            proptest::prop_assert_eq!(criterion.matches(&event), members.contains(&origin_type));
            proptest::prop_assert!(is_response_of(&Criterion::Any, &event));
        }
    }

    #[test]
    fn valid_origin_is_returned() {
        let request = RequestAction::new(RequestPayload::new("/"), caused_by("users/LOAD"));
        assert_eq!(validate_origin(&request).unwrap().action_type(), "users/LOAD");
    }
}
