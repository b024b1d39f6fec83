//! Quickstart binary
//!
//! Loads a few users from a JSON API through the orchestrator and prints the
//! bookkeeping before and after.
//!
//! `APIUM_BASE_URL`, `APIUM_RETRY_TIMES` and `APIUM_RETRY_INTERVAL_MS`
//! override the defaults.

use anyhow::Context;
use apium_core::action::configure;
use apium_core::config::ConfigurationPatch;
use apium_http::ReqwestTransport;
use apium_runtime::metrics::MetricsServer;
use apium_runtime::selectors::{is_fetching, last_error_by_origin_type, last_fetched_at_by_origin_type};
use apium_runtime::{Middleware, Orchestrator, OrchestratorConfig, Store};
use quickstart::{AppState, LOAD_USERS, app_reducer, load_users};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_BASE_URL: &str = "https://jsonplaceholder.typicode.com";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quickstart=info,apium_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut metrics = MetricsServer::new("127.0.0.1:9090".parse()?);
    metrics.start()?;

    println!("=== Quickstart: apium request orchestration ===\n");

    let orchestrator: Arc<dyn Middleware<AppState>> = Arc::new(Orchestrator::new(
        OrchestratorConfig::new()
            .with_base_url(DEFAULT_BASE_URL)
            .with_base_retry_times(2)
            .with_base_retry_interval(Duration::from_millis(500)),
        ReqwestTransport::new(),
    ));
    let store = Store::with_middleware(AppState::default(), app_reducer(), vec![orchestrator]);

    // Environment overrides arrive as a runtime patch, like any other configuration.
    let overrides = ConfigurationPatch::from_env().context("invalid APIUM_* environment")?;
    store.dispatch(configure(overrides))?;

    let base_url = store.state(|s| s.apium.configuration.base_url.clone());
    println!("Base URL: {}", base_url.as_deref().unwrap_or(DEFAULT_BASE_URL));

    let dispatched = store.dispatch(load_users(3))?;
    println!(
        "Fetching {LOAD_USERS}: {}",
        store.state(|s| is_fetching(LOAD_USERS, s))
    );

    let outcome = dispatched
        .and_then(apium_runtime::Dispatched::into_outcome)
        .context("request was not awaitable")?;

    match outcome.await {
        Ok(success) => {
            println!("\n>>> Success (status {:?})", success.meta.status_code);
            println!("{}", success.payload);
        },
        Err(error) => {
            println!("\n>>> Failed: {error}");
        },
    }

    store.state(|s| {
        println!("\nFetching {LOAD_USERS}: {}", is_fetching(LOAD_USERS, s));
        println!(
            "Last fetched at: {:?}",
            last_fetched_at_by_origin_type(LOAD_USERS, s)
        );
        println!(
            "Last error: {}",
            last_error_by_origin_type(LOAD_USERS, s).map_or_else(|| "none".to_string(), ToString::to_string)
        );
        println!("Users in state: {}", s.users.list.is_some());
    });

    if let Some(text) = metrics.render() {
        println!("\n=== Metrics ===\n{text}");
    }

    Ok(())
}
