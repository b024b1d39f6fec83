//! Quickstart application state.
//!
//! An application embeds [`ApiumState`] next to its own slices, lets
//! [`ApiumReducer`] keep the bookkeeping, and reacts to response events in
//! its own reducers.

use apium_core::action::{Action, request};
use apium_core::composition::{CombinedReducer, combine_reducers, scope_reducer};
use apium_core::meta::Meta;
use apium_core::origin::{Criterion, is_error_of, is_success_of};
use apium_core::reducer::Reducer;
use apium_core::request::{Body, RequestPayload};
use apium_runtime::state::{ApiumReducer, ApiumSlice, ApiumState};
use serde_json::Value;

/// Origin type of the load action.
pub const LOAD_USERS: &str = "users/LOAD";

/// Application state.
#[derive(Debug, Default)]
pub struct AppState {
    /// Request bookkeeping.
    pub apium: ApiumState,
    /// Loaded users.
    pub users: UsersState,
}

impl ApiumSlice for AppState {
    fn apium(&self) -> &ApiumState {
        &self.apium
    }
}

/// What the users page shows.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UsersState {
    /// The last loaded list.
    pub list: Option<Value>,
    /// Why the last load failed, if it did.
    pub failure: Option<String>,
}

/// Applies response events for [`LOAD_USERS`].
#[derive(Debug)]
pub struct UsersReducer {
    criterion: Criterion,
}

impl Default for UsersReducer {
    fn default() -> Self {
        Self {
            criterion: Criterion::origin_type(LOAD_USERS),
        }
    }
}

impl Reducer for UsersReducer {
    type State = UsersState;

    fn reduce(&self, state: &mut UsersState, action: &Action) {
        if is_success_of(&self.criterion, action) {
            if let Some(Body::Structured(list)) = action.as_response().map(|event| &event.payload) {
                state.list = Some(list.clone());
                state.failure = None;
            }
        } else if is_error_of(&self.criterion, action) {
            state.failure = action.as_response().map(|event| event.payload.to_string());
        }
    }
}

/// The root reducer.
#[must_use]
pub fn app_reducer() -> CombinedReducer<AppState> {
    combine_reducers(vec![
        Box::new(scope_reducer(ApiumReducer, |state: &mut AppState| {
            &mut state.apium
        })),
        Box::new(scope_reducer(UsersReducer::default(), |state: &mut AppState| {
            &mut state.users
        })),
    ])
}

/// A request intent loading the first `limit` users.
#[must_use]
pub fn load_users(limit: u32) -> Action {
    let origin = Action::custom(LOAD_USERS, serde_json::json!({ "limit": limit }));
    request(
        RequestPayload::new(format!("/users?_limit={limit}")).with_header("accept", "application/json"),
        Meta::new().with_origin(origin),
    )
}
