//! Settlement registry.
//!
//! Each intercepted request gets a one-shot [`Settlement`] and a matching
//! [`ResponseFuture`]. The settlement waits in a [`SettlementRegistry`] under
//! the request's correlation id until the terminal event arrives. Consuming
//! an entry removes it, so a correlation id settles at most once.

use crate::action::ResponseEvent;
use crate::meta::CorrelationId;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::oneshot;

type Outcome = Result<ResponseEvent, ResponseEvent>;

/// Why a [`ResponseFuture`] did not resolve to a success event.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OutcomeError {
    /// The request ended with an error event.
    #[error("Request failed: {}", .0.payload)]
    Rejected(Box<ResponseEvent>),

    /// The settlement was dropped without an outcome.
    #[error("Request was abandoned before it settled")]
    Abandoned,
}

impl OutcomeError {
    /// The error event, if the request was rejected.
    #[must_use]
    pub fn event(&self) -> Option<&ResponseEvent> {
        match self {
            Self::Rejected(event) => Some(event),
            Self::Abandoned => None,
        }
    }
}

/// Sending half of a request's outcome.
#[derive(Debug)]
pub struct Settlement {
    sender: oneshot::Sender<Outcome>,
}

impl Settlement {
    /// Create a settlement and the future it completes.
    #[must_use]
    pub fn channel() -> (Self, ResponseFuture) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender }, ResponseFuture { receiver })
    }

    /// Complete with a success event. Returns false if nobody is listening.
    pub fn resolve(self, event: ResponseEvent) -> bool {
        self.settle(Ok(event))
    }

    /// Complete with an error event. Returns false if nobody is listening.
    pub fn reject(self, event: ResponseEvent) -> bool {
        self.settle(Err(event))
    }

    /// Complete with either outcome. Returns false if nobody is listening.
    pub fn settle(self, outcome: Outcome) -> bool {
        self.sender.send(outcome).is_ok()
    }
}

/// Awaitable outcome of a request.
///
/// Resolves to the success event, or fails with the error event.
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct ResponseFuture {
    receiver: oneshot::Receiver<Outcome>,
}

impl Future for ResponseFuture {
    type Output = Result<ResponseEvent, OutcomeError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|received| match received {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(event)) => Err(OutcomeError::Rejected(Box::new(event))),
            Err(_) => Err(OutcomeError::Abandoned),
        })
    }
}

/// Pending settlements keyed by correlation id.
#[derive(Debug, Default)]
pub struct SettlementRegistry {
    pending: Mutex<HashMap<CorrelationId, Settlement>>,
}

impl SettlementRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `settlement` under `correlation_id`, replacing any previous entry.
    pub fn register(&self, correlation_id: CorrelationId, settlement: Settlement) {
        self.lock().insert(correlation_id, settlement);
    }

    /// Remove and return the entry for `correlation_id`.
    pub fn consume(&self, correlation_id: CorrelationId) -> Option<Settlement> {
        self.lock().remove(&correlation_id)
    }

    /// Returns true if `correlation_id` is still pending.
    #[must_use]
    pub fn contains(&self, correlation_id: CorrelationId) -> bool {
        self.lock().contains_key(&correlation_id)
    }

    /// Number of pending entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true when nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave the map half-updated.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CorrelationId, Settlement>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::meta::Meta;
    use crate::request::Body;
    use tokio_test::{assert_pending, assert_ready, task};

    fn event(text: &str) -> ResponseEvent {
        ResponseEvent::new(Body::from(text), Meta::new())
    }

    #[test]
    fn pending_until_settled() {
        let (settlement, outcome) = Settlement::channel();
        let mut outcome = task::spawn(outcome);

        assert_pending!(outcome.poll());
        assert!(settlement.resolve(event("done")));
        assert!(outcome.is_woken());

        let resolved = assert_ready!(outcome.poll()).unwrap();
        assert_eq!(resolved.payload, Body::from("done"));
    }

    #[test]
    fn rejection_carries_the_error_event() {
        let (settlement, outcome) = Settlement::channel();
        let mut outcome = task::spawn(outcome);

        assert!(settlement.reject(event("boom")));
        let error = assert_ready!(outcome.poll()).unwrap_err();
        assert_eq!(error.event().map(|e| &e.payload), Some(&Body::from("boom")));
        assert_eq!(error.to_string(), "Request failed: boom");
    }

    #[test]
    fn dropped_settlement_abandons() {
        let (settlement, outcome) = Settlement::channel();
        let mut outcome = task::spawn(outcome);

        drop(settlement);
        assert_eq!(assert_ready!(outcome.poll()), Err(OutcomeError::Abandoned));
    }

    #[test]
    fn settling_without_listener_reports_false() {
        let (settlement, outcome) = Settlement::channel();
        drop(outcome);
        assert!(!settlement.resolve(event("late")));
    }

    #[test]
    fn consume_is_at_most_once() {
        let registry = SettlementRegistry::new();
        let id = CorrelationId::new();
        let (settlement, _outcome) = Settlement::channel();

        registry.register(id, settlement);
        assert!(registry.contains(id));
        assert_eq!(registry.len(), 1);

        assert!(registry.consume(id).is_some());
        assert!(registry.consume(id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn register_replaces_existing_entry() {
        let registry = SettlementRegistry::new();
        let id = CorrelationId::new();
        let (first, first_outcome) = Settlement::channel();
        let (second, second_outcome) = Settlement::channel();

        registry.register(id, first);
        registry.register(id, second);
        assert_eq!(registry.len(), 1);

        let mut first_outcome = task::spawn(first_outcome);
        assert_eq!(assert_ready!(first_outcome.poll()), Err(OutcomeError::Abandoned));

        registry.consume(id).unwrap().resolve(event("second"));
        let mut second_outcome = task::spawn(second_outcome);
        assert!(assert_ready!(second_outcome.poll()).is_ok());
    }
}
