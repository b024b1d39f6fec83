//! Read-only views over [`ApiumState`](crate::state::ApiumState).

use crate::state::{ApiumSlice, PendingByCorrelation};
use apium_core::action::RequestAction;
use apium_core::config::ConfigurationPatch;
use apium_core::request::Body;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Every request in flight, by origin type.
#[must_use]
pub fn pending_requests<S: ApiumSlice + ?Sized>(state: &S) -> &BTreeMap<String, PendingByCorrelation> {
    &state.apium().pending_requests
}

/// Requests in flight for `origin_type`.
#[must_use]
pub fn pending_requests_by_origin_type<'a, S: ApiumSlice + ?Sized>(
    origin_type: &str,
    state: &'a S,
) -> Option<&'a PendingByCorrelation> {
    state.apium().pending_requests.get(origin_type)
}

/// Returns true while any request for `origin_type` is in flight.
#[must_use]
pub fn is_fetching<S: ApiumSlice + ?Sized>(origin_type: &str, state: &S) -> bool {
    pending_requests_by_origin_type(origin_type, state).is_some_and(|pending| !pending.is_empty())
}

/// Returns true while a request for `origin_type` accepted by `predicate` is in flight.
#[must_use]
pub fn is_fetching_by<S, P>(origin_type: &str, predicate: P, state: &S) -> bool
where
    S: ApiumSlice + ?Sized,
    P: Fn(&RequestAction) -> bool,
{
    pending_requests_by_origin_type(origin_type, state)
        .is_some_and(|pending| pending.values().any(predicate))
}

/// The runtime configuration.
#[must_use]
pub fn configuration<S: ApiumSlice + ?Sized>(state: &S) -> &ConfigurationPatch {
    &state.apium().configuration
}

/// When `origin_type` last succeeded.
#[must_use]
pub fn last_fetched_at_by_origin_type<S: ApiumSlice + ?Sized>(
    origin_type: &str,
    state: &S,
) -> Option<DateTime<Utc>> {
    state.apium().last_fetched_at.get(origin_type).copied()
}

/// The last error payload for `origin_type`.
#[must_use]
pub fn last_error_by_origin_type<'a, S: ApiumSlice + ?Sized>(
    origin_type: &str,
    state: &'a S,
) -> Option<&'a Body> {
    state.apium().errors.get(origin_type)
}
