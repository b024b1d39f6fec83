//! Request bookkeeping.
//!
//! [`ApiumReducer`] folds the orchestrator's traffic into an [`ApiumState`]:
//! what is in flight per origin type, when each origin type last succeeded,
//! its last error, and the runtime configuration. Applications that keep a
//! larger state embed `ApiumState` in it, implement [`ApiumSlice`], and scope
//! the reducer with [`apium_core::composition::scope_reducer`].

use apium_core::action::{Action, RequestAction};
use apium_core::config::ConfigurationPatch;
use apium_core::meta::CorrelationId;
use apium_core::origin::origin_type_of;
use apium_core::reducer::Reducer;
use apium_core::request::Body;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Requests in flight for one origin type.
pub type PendingByCorrelation = BTreeMap<CorrelationId, RequestAction>;

/// Request bookkeeping, keyed by origin type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiumState {
    /// Runtime configuration folded from `@apium/CONFIGURE` actions.
    pub configuration: ConfigurationPatch,
    /// Last error payload per origin type.
    pub errors: BTreeMap<String, Body>,
    /// Requests in flight per origin type. Empty groups are removed.
    pub pending_requests: BTreeMap<String, PendingByCorrelation>,
    /// Timestamp of the last success per origin type.
    pub last_fetched_at: BTreeMap<String, DateTime<Utc>>,
}

impl ApiumState {
    fn settle(&mut self, origin_type: &str, correlation_id: Option<CorrelationId>) {
        let Some(correlation_id) = correlation_id else {
            return;
        };
        if let Some(pending) = self.pending_requests.get_mut(origin_type) {
            pending.remove(&correlation_id);
            if pending.is_empty() {
                self.pending_requests.remove(origin_type);
            }
        }
    }
}

/// States that contain request bookkeeping.
///
/// The orchestrator reads the runtime configuration through this trait.
pub trait ApiumSlice {
    /// The embedded bookkeeping.
    fn apium(&self) -> &ApiumState;
}

impl ApiumSlice for ApiumState {
    fn apium(&self) -> &Self {
        self
    }
}

/// Reducer maintaining [`ApiumState`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiumReducer;

impl Reducer for ApiumReducer {
    type State = ApiumState;

    fn reduce(&self, state: &mut ApiumState, action: &Action) {
        match action {
            Action::Request(request) => {
                let (Some(origin_type), Some(correlation_id)) =
                    (origin_type_of(action), request.meta.correlation_id)
                else {
                    return;
                };
                state
                    .pending_requests
                    .entry(origin_type.to_owned())
                    .or_default()
                    .insert(correlation_id, request.clone());
            },
            Action::Success(event) => {
                let Some(origin_type) = origin_type_of(action) else {
                    return;
                };
                state.settle(origin_type, event.meta.correlation_id);
                if let Some(timestamp) = event.meta.timestamp {
                    state
                        .last_fetched_at
                        .insert(origin_type.to_owned(), timestamp);
                }
            },
            Action::Error(event) => {
                let Some(origin_type) = origin_type_of(action) else {
                    return;
                };
                state.settle(origin_type, event.meta.correlation_id);
                state
                    .errors
                    .insert(origin_type.to_owned(), event.payload.clone());
            },
            Action::Configure(patch) => {
                state.configuration = std::mem::take(&mut state.configuration).merge(patch.clone());
            },
            Action::Custom(_) => {},
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use apium_core::action::{configure, error_event, request, success_event};
    use apium_core::meta::Meta;
    use apium_core::request::RequestPayload;
    use chrono::TimeZone;
    use serde_json::{Value, json};

    fn meta(origin_type: &str, correlation_id: CorrelationId) -> Meta {
        Meta::new()
            .with_origin(Action::custom(origin_type, Value::Null))
            .with_correlation_id(correlation_id)
    }

    fn reduce(state: &mut ApiumState, action: &Action) {
        ApiumReducer.reduce(state, action);
    }

    #[test]
    fn requests_are_pending_until_settled() {
        let mut state = ApiumState::default();
        let first = CorrelationId::new();
        let second = CorrelationId::new();

        reduce(&mut state, &request(RequestPayload::new("/a"), meta("users/LOAD", first)));
        reduce(&mut state, &request(RequestPayload::new("/b"), meta("users/LOAD", second)));
        assert_eq!(state.pending_requests["users/LOAD"].len(), 2);

        reduce(&mut state, &success_event(Body::from("ok"), meta("users/LOAD", first)));
        assert_eq!(state.pending_requests["users/LOAD"].len(), 1);

        reduce(&mut state, &error_event(Body::from("no"), meta("users/LOAD", second)));
        assert!(state.pending_requests.is_empty());
    }

    #[test]
    fn untagged_requests_are_not_tracked() {
        let mut state = ApiumState::default();
        let untagged = Meta::new().with_origin(Action::custom("users/LOAD", Value::Null));

        reduce(&mut state, &request(RequestPayload::new("/"), untagged));
        assert!(state.pending_requests.is_empty());
    }

    #[test]
    fn success_records_timestamp() {
        let mut state = ApiumState::default();
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        reduce(
            &mut state,
            &success_event(
                Body::from("ok"),
                meta("users/LOAD", CorrelationId::new()).with_timestamp(at),
            ),
        );

        assert_eq!(state.last_fetched_at.get("users/LOAD"), Some(&at));
        assert!(state.errors.is_empty());
    }

    #[test]
    fn error_records_last_payload() {
        let mut state = ApiumState::default();

        reduce(
            &mut state,
            &error_event(Body::from(json!({ "code": 1 })), meta("users/LOAD", CorrelationId::new())),
        );
        reduce(
            &mut state,
            &error_event(Body::from(json!({ "code": 2 })), meta("users/LOAD", CorrelationId::new())),
        );

        assert_eq!(
            state.errors.get("users/LOAD"),
            Some(&Body::Structured(json!({ "code": 2 })))
        );
    }

    #[test]
    fn configure_merges_patches() {
        let mut state = ApiumState::default();

        reduce(
            &mut state,
            &configure(
                ConfigurationPatch::new()
                    .with_base_url("https://a.example")
                    .with_base_retry_times(1),
            ),
        );
        reduce(&mut state, &configure(ConfigurationPatch::new().with_base_retry_times(4)));

        assert_eq!(state.configuration.base_url.as_deref(), Some("https://a.example"));
        assert_eq!(state.configuration.base_retry_times, Some(4));
    }

    #[test]
    fn unrelated_actions_change_nothing() {
        let mut state = ApiumState::default();
        reduce(&mut state, &Action::custom("users/LOAD", json!({ "page": 1 })));
        assert_eq!(state, ApiumState::default());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Pending entries are exactly the requests without a terminal event.
            #[test]
            fn pending_tracks_unsettled_requests(
                settled in proptest::collection::vec(any::<bool>(), 0..32),
            ) {
                let mut state = ApiumState::default();
                let ids: Vec<CorrelationId> = settled.iter().map(|_| CorrelationId::new()).collect();

                for id in &ids {
                    reduce(&mut state, &request(RequestPayload::new("/"), meta("users/LOAD", *id)));
                }
                for (id, done) in ids.iter().zip(&settled) {
                    if *done {
                        reduce(&mut state, &success_event(Body::from("ok"), meta("users/LOAD", *id)));
                    }
                }

                let open = settled.iter().filter(|done| !**done).count();
                let pending = state.pending_requests.get("users/LOAD").map_or(0, BTreeMap::len);
                prop_assert_eq!(pending, open);
                prop_assert_eq!(state.pending_requests.contains_key("users/LOAD"), open > 0);
            }
        }
    }
}
