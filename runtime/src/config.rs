//! Static orchestrator configuration.
//!
//! [`OrchestratorConfig`] holds the construction-time data layer and the
//! behaviour hooks. Data fields are layered at request time:
//!
//! 1. policy defaults ([`apium_core::defaults`])
//! 2. the static patch held here
//! 3. the runtime patch folded from `@apium/CONFIGURE` actions
//! 4. the request's own payload fields
//!
//! Hooks are static only.

use apium_core::action::RequestAction;
use apium_core::config::ConfigurationPatch;
use apium_core::defaults::{self, DefaultResponseParser};
use apium_core::request::{FetchOptions, Headers, Method};
use apium_core::response::ResponseParser;
use apium_core::transport::TransportResponse;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Decides whether a response is a success.
pub type SuccessPredicate = Arc<dyn Fn(&TransportResponse) -> bool + Send + Sync>;

/// Rewrites a request before it is sent, with the current state in view.
pub type RequestTransform<S> = Arc<dyn Fn(RequestAction, &S) -> RequestAction + Send + Sync>;

/// Picks the content type for a request.
pub type ContentTypeHook = Arc<dyn Fn(&RequestAction) -> Option<String> + Send + Sync>;

/// Encodes the body of a request.
pub type BodyHook = Arc<dyn Fn(&RequestAction) -> Option<Bytes> + Send + Sync>;

/// Orchestrator configuration.
///
/// # Example
///
/// ```
/// use apium_runtime::OrchestratorConfig;
/// use apium_runtime::state::ApiumState;
/// use std::time::Duration;
///
/// let config: OrchestratorConfig<ApiumState> = OrchestratorConfig::new()
///     .with_base_url("https://api.example.com")
///     .with_base_retry_times(2)
///     .with_base_retry_interval(Duration::from_millis(200))
///     .with_success_predicate(|response| response.status < 400);
/// # let _ = config;
/// ```
pub struct OrchestratorConfig<S> {
    base: ConfigurationPatch,
    parse_response: Arc<dyn ResponseParser>,
    is_response_success: SuccessPredicate,
    transform_request_action: Option<RequestTransform<S>>,
    get_content_type: ContentTypeHook,
    get_body: BodyHook,
    always_return_thenable: bool,
}

impl<S> OrchestratorConfig<S> {
    /// Configuration with every hook at its default.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: ConfigurationPatch::default(),
            parse_response: Arc::new(DefaultResponseParser),
            is_response_success: Arc::new(defaults::is_response_success),
            transform_request_action: None,
            get_content_type: Arc::new(defaults::content_type),
            get_body: Arc::new(defaults::body),
            always_return_thenable: false,
        }
    }

    /// Replace the static data layer.
    #[must_use]
    pub fn with_base(mut self, base: ConfigurationPatch) -> Self {
        self.base = base;
        self
    }

    /// Set the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base.base_url = Some(base_url.into());
        self
    }

    /// Set the base method.
    #[must_use]
    pub fn with_base_method(mut self, method: Method) -> Self {
        self.base.base_method = Some(method);
        self
    }

    /// Set the base headers.
    #[must_use]
    pub fn with_base_headers(mut self, headers: impl Into<Headers>) -> Self {
        self.base.base_headers = Some(headers.into());
        self
    }

    /// Set the base retry count.
    #[must_use]
    pub fn with_base_retry_times(mut self, retry_times: u32) -> Self {
        self.base.base_retry_times = Some(retry_times);
        self
    }

    /// Set the base retry interval.
    #[must_use]
    pub fn with_base_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.base.base_retry_interval = Some(retry_interval);
        self
    }

    /// Set the base fetch options.
    #[must_use]
    pub fn with_base_fetch_options(mut self, fetch_options: FetchOptions) -> Self {
        self.base.base_fetch_options = Some(fetch_options);
        self
    }

    /// Use a custom response parser.
    #[must_use]
    pub fn with_response_parser<P>(mut self, parser: P) -> Self
    where
        P: ResponseParser + 'static,
    {
        self.parse_response = Arc::new(parser);
        self
    }

    /// Use a custom success predicate.
    #[must_use]
    pub fn with_success_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&TransportResponse) -> bool + Send + Sync + 'static,
    {
        self.is_response_success = Arc::new(predicate);
        self
    }

    /// Rewrite requests before they are sent.
    #[must_use]
    pub fn with_request_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(RequestAction, &S) -> RequestAction + Send + Sync + 'static,
    {
        self.transform_request_action = Some(Arc::new(transform));
        self
    }

    /// Use a custom content type hook.
    #[must_use]
    pub fn with_content_type<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestAction) -> Option<String> + Send + Sync + 'static,
    {
        self.get_content_type = Arc::new(hook);
        self
    }

    /// Use a custom body encoder.
    #[must_use]
    pub fn with_body<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestAction) -> Option<Bytes> + Send + Sync + 'static,
    {
        self.get_body = Arc::new(hook);
        self
    }

    /// Always hand the response future back to the dispatcher, whatever the
    /// downstream stages returned.
    #[must_use]
    pub const fn with_always_return_thenable(mut self, enabled: bool) -> Self {
        self.always_return_thenable = enabled;
        self
    }

    /// The static data layer.
    #[must_use]
    pub const fn base(&self) -> &ConfigurationPatch {
        &self.base
    }

    /// Whether the response future is always returned.
    #[must_use]
    pub const fn always_return_thenable(&self) -> bool {
        self.always_return_thenable
    }

    pub(crate) fn parser(&self) -> Arc<dyn ResponseParser> {
        Arc::clone(&self.parse_response)
    }

    pub(crate) fn success_predicate(&self) -> SuccessPredicate {
        Arc::clone(&self.is_response_success)
    }

    pub(crate) fn transform(&self, request: RequestAction, state: &S) -> RequestAction {
        match &self.transform_request_action {
            Some(transform) => transform(request, state),
            None => request,
        }
    }

    pub(crate) fn content_type(&self, request: &RequestAction) -> Option<String> {
        (self.get_content_type)(request)
    }

    pub(crate) fn body(&self, request: &RequestAction) -> Option<Bytes> {
        (self.get_body)(request)
    }

    /// Layer `runtime` over the static patch and fill gaps with policy defaults.
    #[must_use]
    pub fn resolve(&self, runtime: &ConfigurationPatch) -> ResolvedConfig {
        let merged = self.base.clone().merge(runtime.clone());
        ResolvedConfig {
            base_url: merged.base_url.unwrap_or_default(),
            base_method: merged.base_method.unwrap_or(defaults::METHOD),
            base_headers: merged.base_headers.unwrap_or_default(),
            base_retry_times: merged.base_retry_times.unwrap_or(defaults::RETRY_TIMES),
            base_retry_interval: merged
                .base_retry_interval
                .unwrap_or(defaults::RETRY_INTERVAL),
            base_fetch_options: merged.base_fetch_options.unwrap_or_default(),
        }
    }
}

impl<S> Default for OrchestratorConfig<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for OrchestratorConfig<S> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            parse_response: Arc::clone(&self.parse_response),
            is_response_success: Arc::clone(&self.is_response_success),
            transform_request_action: self.transform_request_action.clone(),
            get_content_type: Arc::clone(&self.get_content_type),
            get_body: Arc::clone(&self.get_body),
            always_return_thenable: self.always_return_thenable,
        }
    }
}

impl<S> fmt::Debug for OrchestratorConfig<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestratorConfig")
            .field("base", &self.base)
            .field("transforms_requests", &self.transform_request_action.is_some())
            .field("always_return_thenable", &self.always_return_thenable)
            .finish_non_exhaustive()
    }
}

/// Fully resolved request defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    /// Prefix for request URLs.
    pub base_url: String,
    /// Method for requests that name none.
    pub base_method: Method,
    /// Headers under the request's own.
    pub base_headers: Headers,
    /// Retries for requests that set none.
    pub base_retry_times: u32,
    /// Retry delay for requests that set none.
    pub base_retry_interval: Duration,
    /// Transport options for requests that set none.
    pub base_fetch_options: FetchOptions,
}
