//! The request orchestrator.
//!
//! [`Orchestrator`] is a [`Middleware`] stage. For every request intent it:
//!
//! 1. checks the request contract and that a tokio runtime is available
//! 2. tags the intent with a fresh correlation id and registers a settlement
//! 3. forwards the tagged intent downstream (so reducers record it as pending)
//! 4. resolves the effective request against configuration and the transform
//!    hook, in one read of the state
//! 5. spawns an attempt routine that calls the transport, retries while the
//!    outcome is an error, and dispatches exactly one terminal event
//!
//! When a terminal event flows back through the pipeline, the orchestrator
//! forwards it first and then settles the matching response future.

use crate::config::{OrchestratorConfig, ResolvedConfig, SuccessPredicate};
use crate::error::DispatchError;
use crate::metrics::RequestMetrics;
use crate::middleware::{DispatchResult, Dispatched, Middleware, Next};
use crate::state::ApiumSlice;
use crate::store::Store;
use apium_core::action::{Action, RequestAction, error_event, success_event};
use apium_core::environment::{Clock, SystemClock};
use apium_core::meta::{CorrelationId, Meta};
use apium_core::origin::{ContractViolation, correlation_id_of, validate_origin};
use apium_core::registry::{Settlement, SettlementRegistry};
use apium_core::request::{Body, Headers};
use apium_core::response::ResponseParser;
use apium_core::transport::{Transport, TransportRequest, TransportResponse};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::Instrument;

const CONTENT_TYPE: &str = "content-type";

/// Middleware turning request intents into HTTP exchanges.
///
/// # Example
///
/// ```ignore
/// let orchestrator = Arc::new(Orchestrator::new(
///     OrchestratorConfig::new().with_base_url("https://api.example.com"),
///     ReqwestTransport::new(),
/// ));
/// let store = Store::with_middleware(ApiumState::default(), ApiumReducer, vec![orchestrator]);
/// ```
pub struct Orchestrator<S> {
    config: OrchestratorConfig<S>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    registry: SettlementRegistry,
}

impl<S> Orchestrator<S> {
    /// Create an orchestrator sending requests through `transport`.
    #[must_use]
    pub fn new<T>(config: OrchestratorConfig<S>, transport: T) -> Self
    where
        T: Transport + 'static,
    {
        Self {
            config,
            transport: Arc::new(transport),
            clock: Arc::new(SystemClock),
            registry: SettlementRegistry::new(),
        }
    }

    /// Stamp response events with `clock` instead of the system clock.
    #[must_use]
    pub fn with_clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &OrchestratorConfig<S> {
        &self.config
    }

    /// Pending settlements, one per request without a terminal event yet.
    #[must_use]
    pub const fn registry(&self) -> &SettlementRegistry {
        &self.registry
    }

    /// Match a terminal event against the registry and settle its future.
    fn settle(&self, terminal: Action) {
        let Some(correlation_id) = correlation_id_of(&terminal) else {
            return;
        };
        let (outcome, label) = match terminal {
            Action::Success(event) => (Ok(event), "resolved"),
            Action::Error(event) => (Err(event), "rejected"),
            _ => return,
        };
        let Some(settlement) = self.registry.consume(correlation_id) else {
            tracing::trace!(%correlation_id, "No pending response future for terminal event");
            RequestMetrics::record_settlement("unmatched");
            return;
        };

        if settlement.settle(outcome) {
            RequestMetrics::record_settlement(label);
        } else {
            tracing::trace!(%correlation_id, "Response future was dropped before settlement");
            RequestMetrics::record_settlement("unobserved");
        }
    }
}

impl<S> Orchestrator<S>
where
    S: ApiumSlice + Send + Sync + 'static,
{
    fn intercept(&self, store: &Store<S>, request: RequestAction, next: Next<'_, S>) -> DispatchResult {
        validate_origin(&request)?;
        let runtime = Handle::try_current().map_err(|_| DispatchError::NoRuntime)?;

        let correlation_id = CorrelationId::new();
        let tagged = request.with_correlation_id(correlation_id);
        let (settlement, outcome) = Settlement::channel();
        self.registry.register(correlation_id, settlement);
        RequestMetrics::record_intercepted();

        tracing::debug!(
            %correlation_id,
            origin = tagged.meta.origin.as_deref().map_or("", Action::action_type),
            url = %tagged.payload.url,
            "Intercepted request"
        );

        let downstream = match next.run(Action::Request(tagged.clone())) {
            Ok(downstream) => downstream,
            Err(error) => {
                self.discard(correlation_id);
                return Err(error);
            },
        };

        let attempts = match self.prepare(store, correlation_id, tagged.clone()) {
            Ok(attempts) => attempts,
            Err(violation) => {
                self.discard(correlation_id);
                self.compensate(store, &tagged, &violation);
                return Err(violation.into());
            },
        };
        runtime.spawn(attempts.run(store.clone()));

        if self.config.always_return_thenable() {
            return Ok(Some(
                Dispatched::new(Action::Request(tagged)).with_outcome(outcome),
            ));
        }

        Ok(downstream.map(|dispatched| {
            let own_request = correlation_id_of(dispatched.action()) == Some(correlation_id);
            if own_request && !dispatched.is_awaitable() {
                dispatched.with_outcome(outcome)
            } else {
                dispatched
            }
        }))
    }

    fn discard(&self, correlation_id: CorrelationId) {
        self.registry.consume(correlation_id);
        RequestMetrics::record_discarded();
    }

    /// Close out a request whose intent was already reduced but will never be
    /// sent, so its pending entry does not outlive the failed dispatch.
    fn compensate(&self, store: &Store<S>, tagged: &RequestAction, violation: &ContractViolation) {
        tracing::warn!(
            correlation_id = ?tagged.meta.correlation_id,
            %violation,
            "Transformed request broke the origin contract"
        );
        let meta = Meta::new()
            .with_original_request(tagged.clone())
            .with_timestamp(self.clock.now())
            .merge(tagged.meta.clone());
        if let Err(error) = store.dispatch(error_event(Body::Text(violation.to_string()), meta)) {
            tracing::error!(%error, "Failed to dispatch compensating error event");
        }
    }

    /// Resolve the effective request. Configuration and transform observe the
    /// same state snapshot.
    fn prepare(
        &self,
        store: &Store<S>,
        correlation_id: CorrelationId,
        original: RequestAction,
    ) -> Result<Attempts, ContractViolation> {
        let (resolved, request) = store.state(|state| {
            let resolved = self.config.resolve(&state.apium().configuration);
            let request = self.config.transform(original.clone(), state);
            (resolved, request)
        });

        let origin = validate_origin(&request)?;
        let origin_type = origin.action_type().to_owned();
        let origin_meta = origin.meta().cloned().unwrap_or_default();

        let ResolvedConfig {
            base_url,
            base_method,
            base_headers,
            base_retry_times,
            base_retry_interval,
            base_fetch_options,
        } = resolved;
        let payload = &request.payload;

        let mut headers = Headers::new();
        headers.insert(CONTENT_TYPE, self.config.content_type(&request));
        let headers = headers
            .merge(base_headers)
            .merge(payload.headers.clone().unwrap_or_default())
            .resolve();

        let transport_request = TransportRequest {
            url: format!("{base_url}{}", payload.url),
            method: payload.method.unwrap_or(base_method),
            headers,
            body: self.config.body(&request),
            options: payload.fetch_options.clone().unwrap_or(base_fetch_options),
        };
        let retry_times = payload.retry_times.unwrap_or(base_retry_times);
        let retry_interval = payload.retry_interval.unwrap_or(base_retry_interval);

        Ok(Attempts {
            correlation_id,
            origin_type,
            origin_meta,
            original,
            request,
            transport_request,
            retry_times,
            retry_interval,
            transport: Arc::clone(&self.transport),
            parser: self.config.parser(),
            is_success: self.config.success_predicate(),
            clock: Arc::clone(&self.clock),
        })
    }
}

impl<S> Middleware<S> for Orchestrator<S>
where
    S: ApiumSlice + Send + Sync + 'static,
{
    fn handle(&self, store: &Store<S>, action: Action, next: Next<'_, S>) -> DispatchResult {
        match action {
            Action::Request(request) => self.intercept(store, request, next),
            terminal @ (Action::Success(_) | Action::Error(_)) => {
                let forwarded = terminal.clone();
                let result = next.run(forwarded);
                self.settle(terminal);
                result
            },
            other => next.run(other),
        }
    }
}

/// Everything the attempt routine needs, detached from the orchestrator.
struct Attempts {
    correlation_id: CorrelationId,
    origin_type: String,
    origin_meta: Meta,
    original: RequestAction,
    request: RequestAction,
    transport_request: TransportRequest,
    retry_times: u32,
    retry_interval: Duration,
    transport: Arc<dyn Transport>,
    parser: Arc<dyn ResponseParser>,
    is_success: SuccessPredicate,
    clock: Arc<dyn Clock>,
}

impl Attempts {
    async fn run<S>(self, store: Store<S>)
    where
        S: Send + Sync + 'static,
    {
        let span = tracing::info_span!(
            "apium_request",
            correlation_id = %self.correlation_id,
            origin = %self.origin_type,
            method = %self.transport_request.method,
            url = %self.transport_request.url,
        );

        async move {
            let started = Instant::now();
            let mut terminal = self.attempt(0).await;

            for attempt in 1..=self.retry_times {
                if matches!(terminal, Action::Success(_)) {
                    break;
                }
                tracing::debug!(
                    attempt,
                    delay_ms = u64::try_from(self.retry_interval.as_millis()).unwrap_or(u64::MAX),
                    "Retrying request"
                );
                RequestMetrics::record_retry();
                tokio::time::sleep(self.retry_interval).await;
                terminal = self.attempt(attempt).await;
            }

            let outcome = if matches!(terminal, Action::Success(_)) {
                "success"
            } else {
                "error"
            };
            RequestMetrics::record_outcome(outcome, started.elapsed());
            tracing::debug!(outcome, "Request finished");

            if let Err(error) = store.dispatch(terminal) {
                tracing::error!(%error, "Failed to dispatch terminal event");
            }
        }
        .instrument(span)
        .await;
    }

    /// One transport call, mapped to the event it would end the request with.
    async fn attempt(&self, attempt: u32) -> Action {
        RequestMetrics::record_attempt();

        let response = match self.transport.fetch(self.transport_request.clone()).await {
            Ok(response) => response,
            Err(error) => {
                tracing::error!(attempt, %error, "Transport failure");
                return error_event(Body::Text(error.to_string()), self.event_meta(Meta::new()));
            },
        };

        let status_meta = Self::status_meta(&response);
        let parsed = match self.parser.parse(&response).await {
            Ok(parsed) => parsed,
            Err(error) => {
                tracing::error!(attempt, status = response.status, %error, "Failed to parse response");
                return error_event(Body::Text(error.to_string()), self.event_meta(status_meta));
            },
        };

        // Parser meta goes on last so its null values can remove earlier keys.
        let meta = self.event_meta(status_meta).merge(parsed.meta);
        if (self.is_success)(&response) {
            success_event(parsed.body, meta)
        } else {
            tracing::debug!(attempt, status = response.status, "Response was not successful");
            error_event(parsed.body, meta)
        }
    }

    fn status_meta(response: &TransportResponse) -> Meta {
        Meta {
            status_code: Some(response.status),
            status_text: response.status_text.clone(),
            ..Meta::default()
        }
    }

    /// Metadata for a terminal event, later layers winning:
    /// snapshots and timestamp, origin meta, original request meta, effective
    /// request meta, then `additional`.
    fn event_meta(&self, additional: Meta) -> Meta {
        Meta::new()
            .with_original_request(self.original.clone())
            .with_request(self.request.clone())
            .with_timestamp(self.clock.now())
            .merge(self.origin_meta.clone())
            .merge(self.original.meta.clone())
            .merge(self.request.meta.clone())
            .merge(additional)
    }
}
