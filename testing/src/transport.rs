//! Scripted transport.

use apium_core::transport::{
    Transport, TransportError, TransportFuture, TransportRequest, TransportResponse,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone)]
struct Scripted {
    result: Result<TransportResponse, TransportError>,
    delay: Duration,
}

#[derive(Debug, Default)]
struct Script {
    queue: VecDeque<Scripted>,
    fallback: Option<Scripted>,
    requests: Vec<TransportRequest>,
}

/// A [`Transport`] that replays scripted results.
///
/// Each call pops the next scripted result. Once the queue is empty, the
/// fallback set with [`MockTransport::always`] is returned; without one the
/// call fails with [`TransportError::Other`]. Every request is recorded
/// before its delay starts.
///
/// Clones share the same script, so a test can keep one handle for
/// inspection and give another to the orchestrator.
///
/// # Example
///
/// ```
/// use apium_testing::{fixtures, MockTransport};
///
/// let transport = MockTransport::new()
///     .with_response(fixtures::status_response(500))
///     .with_response(fixtures::status_response(200));
/// assert_eq!(transport.calls(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    script: Arc<Mutex<Script>>,
}

impl MockTransport {
    /// Create a transport with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response.
    #[must_use]
    pub fn with_response(self, response: TransportResponse) -> Self {
        self.push(Ok(response), Duration::ZERO);
        self
    }

    /// Queue a response delivered after `delay`.
    #[must_use]
    pub fn with_delayed_response(self, response: TransportResponse, delay: Duration) -> Self {
        self.push(Ok(response), delay);
        self
    }

    /// Queue a transport failure.
    #[must_use]
    pub fn with_error(self, error: TransportError) -> Self {
        self.push(Err(error), Duration::ZERO);
        self
    }

    /// Answer every call beyond the queue with `response`.
    #[must_use]
    pub fn always(self, response: TransportResponse) -> Self {
        self.lock().fallback = Some(Scripted {
            result: Ok(response),
            delay: Duration::ZERO,
        });
        self
    }

    /// Queue a result after construction.
    pub fn push(&self, result: Result<TransportResponse, TransportError>, delay: Duration) {
        self.lock().queue.push_back(Scripted { result, delay });
    }

    /// Number of calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.lock().requests.len()
    }

    /// Every request received, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.lock().requests.clone()
    }

    /// The most recent request.
    #[must_use]
    pub fn last_request(&self) -> Option<TransportRequest> {
        self.lock().requests.last().cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for MockTransport {
    fn fetch(&self, request: TransportRequest) -> TransportFuture<'_> {
        let next = {
            let mut script = self.lock();
            script.requests.push(request);
            script
                .queue
                .pop_front()
                .or_else(|| script.fallback.clone())
        };

        Box::pin(async move {
            let Some(Scripted { result, delay }) = next else {
                return Err(TransportError::Other(
                    "mock transport has no scripted response left".to_string(),
                ));
            };
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            result
        })
    }
}
