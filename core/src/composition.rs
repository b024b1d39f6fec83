//! Reducer composition utilities
//!
//! Applications rarely keep request bookkeeping as their whole state. These
//! combinators let the request reducer live inside a larger state next to
//! application reducers:
//!
//! - [`combine_reducers`]: run several reducers over the same state
//! - [`scope_reducer`]: run a reducer over one field of a larger state
//!
//! # Example
//!
//! ```
//! use apium_core::action::Action;
//! use apium_core::composition::{combine_reducers, scope_reducer};
//! use apium_core::reducer::Reducer;
//!
//! #[derive(Default)]
//! struct Counter {
//!     seen: usize,
//! }
//!
//! struct CountingReducer;
//!
//! impl Reducer for CountingReducer {
//!     type State = Counter;
//!
//!     fn reduce(&self, state: &mut Counter, _action: &Action) {
//!         state.seen += 1;
//!     }
//! }
//!
//! #[derive(Default)]
//! struct AppState {
//!     counter: Counter,
//!     log: Vec<String>,
//! }
//!
//! struct LogReducer;
//!
//! impl Reducer for LogReducer {
//!     type State = AppState;
//!
//!     fn reduce(&self, state: &mut AppState, action: &Action) {
//!         state.log.push(action.action_type().to_owned());
//!     }
//! }
//!
//! let app = combine_reducers(vec![
//!     Box::new(scope_reducer(CountingReducer, |app: &mut AppState| &mut app.counter)),
//!     Box::new(LogReducer),
//! ]);
//!
//! let mut state = AppState::default();
//! app.reduce(&mut state, &Action::custom("ping", serde_json::Value::Null));
//! assert_eq!(state.counter.seen, 1);
//! assert_eq!(state.log, vec!["ping".to_string()]);
//! ```

use crate::action::Action;
use crate::reducer::Reducer;
use std::marker::PhantomData;

/// Boxed reducer over state `S`.
pub type BoxedReducer<S> = Box<dyn Reducer<State = S> + Send + Sync>;

/// Combines multiple reducers that operate on the same state.
///
/// Each reducer sees every action, in order.
#[must_use]
pub fn combine_reducers<S>(reducers: Vec<BoxedReducer<S>>) -> CombinedReducer<S> {
    CombinedReducer { reducers }
}

/// A combined reducer that runs multiple reducers in sequence.
///
/// Created by [`combine_reducers`].
pub struct CombinedReducer<S> {
    reducers: Vec<BoxedReducer<S>>,
}

impl<S> Reducer for CombinedReducer<S> {
    type State = S;

    fn reduce(&self, state: &mut S, action: &Action) {
        for reducer in &self.reducers {
            reducer.reduce(state, action);
        }
    }
}

/// Scopes a reducer to operate on a subset of a larger state.
///
/// `lens` projects the parent state onto the child state the reducer owns.
pub const fn scope_reducer<S, R, L>(reducer: R, lens: L) -> ScopedReducer<S, R, L>
where
    R: Reducer,
    L: Fn(&mut S) -> &mut R::State,
{
    ScopedReducer {
        reducer,
        lens,
        _parent: PhantomData,
    }
}

/// A scoped reducer that operates on a subset of state.
///
/// Created by [`scope_reducer`].
pub struct ScopedReducer<S, R, L> {
    reducer: R,
    lens: L,
    _parent: PhantomData<fn(&mut S)>,
}

impl<S, R, L> Reducer for ScopedReducer<S, R, L>
where
    R: Reducer,
    L: Fn(&mut S) -> &mut R::State,
{
    type State = S;

    fn reduce(&self, state: &mut S, action: &Action) {
        self.reducer.reduce((self.lens)(state), action);
    }
}
