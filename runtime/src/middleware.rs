//! The middleware pipeline.
//!
//! Every dispatched action flows through the store's stages in order. A stage
//! receives the action and a [`Next`] handle for the rest of the pipeline; it
//! may forward the action (possibly changed), swallow it, or fail. The
//! innermost stage applies the reducer.
//!
//! Stages run synchronously on the dispatching thread. Work that has to wait
//! is spawned, and reports back by dispatching further actions.

use crate::error::DispatchError;
use crate::store::Store;
use apium_core::action::Action;
use apium_core::registry::ResponseFuture;
use std::sync::Arc;

/// Return value of a dispatch.
///
/// `Ok(None)` means some stage swallowed the action.
pub type DispatchResult = Result<Option<Dispatched>, DispatchError>;

/// What came back out of the pipeline.
#[derive(Debug)]
pub struct Dispatched {
    action: Action,
    outcome: Option<ResponseFuture>,
}

impl Dispatched {
    /// A plain dispatched action.
    #[must_use]
    pub const fn new(action: Action) -> Self {
        Self {
            action,
            outcome: None,
        }
    }

    /// Attach the response future for a request.
    #[must_use]
    pub fn with_outcome(mut self, outcome: ResponseFuture) -> Self {
        self.outcome = Some(outcome);
        self
    }

    /// The action as it left the pipeline.
    #[must_use]
    pub const fn action(&self) -> &Action {
        &self.action
    }

    /// Returns true when a response future is attached.
    #[must_use]
    pub const fn is_awaitable(&self) -> bool {
        self.outcome.is_some()
    }

    /// Take the action, dropping any response future.
    #[must_use]
    pub fn into_action(self) -> Action {
        self.action
    }

    /// Take the response future, if any.
    #[must_use]
    pub fn into_outcome(self) -> Option<ResponseFuture> {
        self.outcome
    }

    /// Split into the action and the response future.
    #[must_use]
    pub fn into_parts(self) -> (Action, Option<ResponseFuture>) {
        (self.action, self.outcome)
    }
}

/// A pipeline stage.
///
/// # Example
///
/// ```
/// use apium_core::action::Action;
/// use apium_runtime::{DispatchResult, Middleware, Next, Store};
///
/// struct Trace;
///
/// impl<S: Send + Sync + 'static> Middleware<S> for Trace {
///     fn handle(&self, _store: &Store<S>, action: Action, next: Next<'_, S>) -> DispatchResult {
///         println!("dispatching {}", action.action_type());
///         next.run(action)
///     }
/// }
/// ```
pub trait Middleware<S>: Send + Sync {
    /// Handle `action`, usually by calling `next.run`.
    ///
    /// `store` gives access to the state and lets the stage dispatch new
    /// actions from the top of the pipeline.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] to abort the dispatch.
    fn handle(&self, store: &Store<S>, action: Action, next: Next<'_, S>) -> DispatchResult;
}

/// The rest of the pipeline after the current stage.
pub struct Next<'a, S> {
    store: &'a Store<S>,
    chain: &'a [Arc<dyn Middleware<S>>],
}

impl<'a, S> Next<'a, S>
where
    S: Send + Sync + 'static,
{
    pub(crate) const fn new(store: &'a Store<S>, chain: &'a [Arc<dyn Middleware<S>>]) -> Self {
        Self { store, chain }
    }

    /// Pass `action` to the next stage, or to the reducer after the last one.
    ///
    /// # Errors
    ///
    /// Returns whatever error a later stage raised.
    pub fn run(self, action: Action) -> DispatchResult {
        match self.chain.split_first() {
            Some((stage, rest)) => stage.handle(self.store, action, Next::new(self.store, rest)),
            None => Ok(Some(self.store.reduce(action))),
        }
    }
}
