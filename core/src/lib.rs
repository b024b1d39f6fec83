//! # Apium Core
//!
//! Core types for the apium request orchestrator.
//!
//! Apium sits as a middleware stage on an action bus. Application code
//! dispatches a *request intent* naming the action that caused it (its
//! *origin*), and apium turns it into an HTTP exchange that ends in exactly
//! one *response event*. This crate holds the vocabulary shared by every
//! stage of that pipeline:
//!
//! - **Action**: everything that flows through the bus ([`action`])
//! - **Meta**: correlation, origin and timing metadata ([`meta`])
//! - **Origin utilities**: classification and matching of events by the action
//!   that caused them ([`origin`])
//! - **Policy defaults**: success predicate, body derivation, response parsing
//!   ([`defaults`])
//! - **Transport**: the seam to the HTTP client ([`transport`])
//! - **Settlement registry**: one-shot handles keyed by correlation id
//!   ([`registry`])
//! - **Reducer**: synchronous state transitions driven by actions ([`reducer`])
//!
//! ## Example
//!
//! ```
//! use apium_core::action::{self, Action};
//! use apium_core::meta::Meta;
//! use apium_core::origin::{self, Classification, Criterion};
//! use apium_core::request::RequestPayload;
//!
//! let load_users = Action::custom("users/LOAD", serde_json::Value::Null);
//! let intent = action::request(
//!     RequestPayload::new("/users"),
//!     Meta::new().with_origin(load_users),
//! );
//!
//! assert_eq!(origin::classify(&intent), Classification::Request);
//! assert!(origin::is_request_of(&Criterion::from("users/LOAD"), &intent));
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod action;
pub mod composition;
pub mod config;
pub mod defaults;
pub mod meta;
pub mod origin;
pub mod registry;
pub mod request;
pub mod response;
pub mod transport;

/// Reducer trait and related types
///
/// Reducers are synchronous: `(State, Action) → State`. They run inside the
/// bus's base stage, after every middleware stage has forwarded the action.
/// Side effects belong to middleware, never to reducers.
pub mod reducer {
    use crate::action::Action;

    /// The Reducer trait - state transitions for bus actions
    ///
    /// # Example
    ///
    /// ```
    /// use apium_core::action::Action;
    /// use apium_core::reducer::Reducer;
    ///
    /// #[derive(Default)]
    /// struct Seen {
    ///     count: usize,
    /// }
    ///
    /// struct SeenReducer;
    ///
    /// impl Reducer for SeenReducer {
    ///     type State = Seen;
    ///
    ///     fn reduce(&self, state: &mut Seen, _action: &Action) {
    ///         state.count += 1;
    ///     }
    /// }
    ///
    /// let mut state = Seen::default();
    /// SeenReducer.reduce(&mut state, &Action::custom("ping", serde_json::Value::Null));
    /// assert_eq!(state.count, 1);
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// Apply `action` to `state`.
        ///
        /// Reducers must be deterministic and must not block: they run while
        /// the store holds its state lock.
        fn reduce(&self, state: &mut Self::State, action: &Action);
    }
}

/// Environment traits for dependency injection
///
/// External dependencies that affect observable output (currently only the
/// wall clock used to stamp response events) are abstracted behind traits so
/// tests can pin them.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by [`Utc::now`].
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

pub use action::Action;
pub use meta::{CorrelationId, Meta};
pub use reducer::Reducer;

#[cfg(test)]
mod tests {
    use super::environment::{Clock, SystemClock};
    use chrono::Utc;

    #[test]
    fn system_clock_tracks_wall_time() {
        let before = Utc::now();
        let now = SystemClock.now();
        assert!(now >= before);
    }
}
