//! # Apium Runtime
//!
//! The action bus and the request orchestrator.
//!
//! ## Core Components
//!
//! - **Store**: owns the state, runs the middleware pipeline and the reducer
//! - **Middleware**: a stage that sees every dispatched action before the
//!   reducer does, and decides what goes downstream
//! - **Orchestrator**: the middleware that turns request intents into HTTP
//!   attempts, retries them, dispatches the terminal event and settles the
//!   caller's [`ResponseFuture`](apium_core::registry::ResponseFuture)
//! - **State**: [`ApiumState`](state::ApiumState) bookkeeping and
//!   [`selectors`] over it
//!
//! ## Example
//!
//! ```ignore
//! use apium_core::action::{request, Action};
//! use apium_core::{Meta, request::RequestPayload};
//! use apium_runtime::{Orchestrator, OrchestratorConfig, Store};
//! use apium_runtime::state::{ApiumReducer, ApiumState};
//!
//! let orchestrator = Orchestrator::new(
//!     OrchestratorConfig::new().with_base_url("https://api.example.com"),
//!     transport,
//! );
//! let store = Store::with_middleware(
//!     ApiumState::default(),
//!     ApiumReducer,
//!     vec![Arc::new(orchestrator)],
//! );
//!
//! let load = Action::custom("users/LOAD", serde_json::Value::Null);
//! let users = store
//!     .request(request(RequestPayload::new("/users"), Meta::new().with_origin(load)))
//!     .await?;
//! ```

use apium_core::action::Action;
use apium_core::reducer::Reducer;
use std::sync::{Arc, PoisonError, RwLock};

/// Request orchestrator configuration
pub mod config;

/// Middleware pipeline
pub mod middleware;

/// Prometheus metrics
pub mod metrics;

/// Request orchestrator middleware
pub mod orchestrator;

/// Selectors over request bookkeeping
pub mod selectors;

/// Request bookkeeping state and reducer
pub mod state;

/// Error types for the Store runtime
pub mod error {
    use apium_core::origin::ContractViolation;
    use apium_core::registry::OutcomeError;
    use thiserror::Error;

    /// Errors that can occur while dispatching an action
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum DispatchError {
        /// A request intent broke the request contract
        ///
        /// Nothing was forwarded downstream and no transport call was made.
        #[error("Contract violation: {0}")]
        ContractViolation(#[from] ContractViolation),

        /// A request intent was dispatched outside a tokio runtime
        ///
        /// The orchestrator spawns its attempt routine on the ambient runtime.
        #[error("No tokio runtime available to run the request")]
        NoRuntime,
    }

    /// Errors from [`Store::request`](crate::Store::request)
    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum RequestError {
        /// Dispatch itself failed
        #[error(transparent)]
        Dispatch(#[from] DispatchError),

        /// Dispatch returned no response future
        ///
        /// Either no orchestrator intercepted the action, or a downstream
        /// stage replaced the augmented request.
        #[error("Dispatch did not return an awaitable response")]
        NotAwaitable,

        /// The request ended in an error event, or was abandoned
        #[error(transparent)]
        Outcome(#[from] OutcomeError),
    }

    impl RequestError {
        /// The error event, if the request was rejected.
        #[must_use]
        pub fn rejected(&self) -> Option<&apium_core::action::ResponseEvent> {
            match self {
                Self::Outcome(outcome) => outcome.event(),
                Self::Dispatch(_) | Self::NotAwaitable => None,
            }
        }
    }
}

pub use config::OrchestratorConfig;
pub use error::{DispatchError, RequestError};
pub use middleware::{DispatchResult, Dispatched, Middleware, Next};
pub use orchestrator::Orchestrator;

/// Configuration for Store instances
///
/// # Example
///
/// ```
/// use apium_runtime::StoreConfig;
///
/// let config = StoreConfig::default().with_broadcast_capacity(256);
/// assert_eq!(config.broadcast_capacity, 256);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Capacity of the reduced-action broadcast channel
    ///
    /// Slow observers that fall this far behind miss actions.
    pub broadcast_capacity: usize,
}

impl StoreConfig {
    /// Create a new configuration with custom values
    #[must_use]
    pub const fn new(broadcast_capacity: usize) -> Self {
        Self { broadcast_capacity }
    }

    /// Set the broadcast channel capacity
    #[must_use]
    pub const fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 16,
        }
    }
}

/// Store implementation
pub mod store {
    use super::{Action, Arc, PoisonError, Reducer, RwLock, StoreConfig};
    use crate::error::RequestError;
    use crate::metrics::StoreMetrics;
    use crate::middleware::{DispatchResult, Dispatched, Middleware, Next};
    use apium_core::action::ResponseEvent;
    use std::time::Instant;
    use tokio::sync::broadcast;

    type SharedReducer<S> = Box<dyn Reducer<State = S> + Send + Sync>;

    /// The Store - action bus for a state
    ///
    /// The Store manages:
    /// 1. State (behind a `RwLock`, read through [`Store::state`])
    /// 2. Reducer (synchronous state transitions)
    /// 3. Middleware (stages every action flows through before the reducer)
    /// 4. An action broadcast for observers
    ///
    /// Cloning a store is cheap: clones share the same state and pipeline.
    pub struct Store<S> {
        inner: Arc<Inner<S>>,
    }

    struct Inner<S> {
        state: RwLock<S>,
        reducer: SharedReducer<S>,
        middleware: Vec<Arc<dyn Middleware<S>>>,
        /// Action broadcast channel for observing reduced actions.
        ///
        /// Every action that reaches the reducer is broadcast after it has
        /// been applied, so observers always see the state it produced.
        action_broadcast: broadcast::Sender<Action>,
    }

    impl<S> Clone for Store<S> {
        fn clone(&self) -> Self {
            Self {
                inner: Arc::clone(&self.inner),
            }
        }
    }

    impl<S> Store<S>
    where
        S: Send + Sync + 'static,
    {
        /// Create a store with no middleware.
        #[must_use]
        pub fn new<R>(initial_state: S, reducer: R) -> Self
        where
            R: Reducer<State = S> + Send + Sync + 'static,
        {
            Self::with_config(initial_state, reducer, Vec::new(), StoreConfig::default())
        }

        /// Create a store whose actions flow through `middleware`.
        ///
        /// The first stage sees each action first; the reducer runs after the
        /// last stage forwards it.
        #[must_use]
        pub fn with_middleware<R>(
            initial_state: S,
            reducer: R,
            middleware: Vec<Arc<dyn Middleware<S>>>,
        ) -> Self
        where
            R: Reducer<State = S> + Send + Sync + 'static,
        {
            Self::with_config(initial_state, reducer, middleware, StoreConfig::default())
        }

        /// Create a store with custom configuration.
        #[must_use]
        pub fn with_config<R>(
            initial_state: S,
            reducer: R,
            middleware: Vec<Arc<dyn Middleware<S>>>,
            config: StoreConfig,
        ) -> Self
        where
            R: Reducer<State = S> + Send + Sync + 'static,
        {
            let (action_broadcast, _) = broadcast::channel(config.broadcast_capacity.max(1));

            Self {
                inner: Arc::new(Inner {
                    state: RwLock::new(initial_state),
                    reducer: Box::new(reducer),
                    middleware,
                    action_broadcast,
                }),
            }
        }

        /// Dispatch an action through the pipeline.
        ///
        /// Runs synchronously: when this returns, every stage has handled the
        /// action and, unless a stage swallowed it, the reducer has applied it.
        ///
        /// # Errors
        ///
        /// Returns the first error a stage raised. See [`crate::DispatchError`].
        #[tracing::instrument(skip(self, action), fields(action_type = %action.action_type()))]
        pub fn dispatch(&self, action: Action) -> DispatchResult {
            StoreMetrics::record_dispatch();
            Next::new(self, &self.inner.middleware).run(action)
        }

        /// Dispatch a request intent and wait for its outcome.
        ///
        /// # Errors
        ///
        /// - [`RequestError::Dispatch`] if dispatch failed
        /// - [`RequestError::NotAwaitable`] if no response future came back
        /// - [`RequestError::Outcome`] if the request ended in an error event
        pub async fn request(&self, action: Action) -> Result<ResponseEvent, RequestError> {
            let outcome = self
                .dispatch(action)?
                .and_then(Dispatched::into_outcome)
                .ok_or(RequestError::NotAwaitable)?;

            Ok(outcome.await?)
        }

        /// Read the current state.
        ///
        /// The closure runs under the read lock; keep it short and never
        /// dispatch from inside it.
        pub fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self
                .inner
                .state
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            f(&state)
        }

        /// Subscribe to reduced actions.
        ///
        /// Receivers only see actions reduced after they subscribed.
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<Action> {
            self.inner.action_broadcast.subscribe()
        }

        /// Base stage: apply the reducer and broadcast.
        pub(crate) fn reduce(&self, action: Action) -> Dispatched {
            let start = Instant::now();
            {
                let mut state = self
                    .inner
                    .state
                    .write()
                    .unwrap_or_else(PoisonError::into_inner);
                self.inner.reducer.reduce(&mut state, &action);
            }
            StoreMetrics::record_reduce(start.elapsed());

            // No receivers is fine: broadcasting is best-effort.
            let receivers = self.inner.action_broadcast.send(action.clone()).unwrap_or(0);
            tracing::trace!(
                action_type = %action.action_type(),
                receivers,
                "Reduced action"
            );

            Dispatched::new(action)
        }
    }
}

pub use store::Store;
