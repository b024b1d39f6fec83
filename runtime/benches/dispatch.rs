//! Dispatch Benchmarks
//!
//! Measures the cost of the synchronous pipeline and of a full request
//! round trip against an in-memory transport:
//! - Plain dispatch: reducer plus broadcast
//! - Pass-through: a non-request action flowing past the orchestrator
//! - Round trip: intercept, attempt, terminal event, settlement
//!
//! Run with: `cargo bench -p apium-runtime`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used)] // Benchmarks can use expect for setup

use apium_core::action::{Action, request};
use apium_core::meta::Meta;
use apium_core::request::RequestPayload;
use apium_core::transport::{Transport, TransportFuture, TransportRequest, TransportResponse};
use apium_runtime::state::{ApiumReducer, ApiumState};
use apium_runtime::{Middleware, Orchestrator, OrchestratorConfig, Store};
use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde_json::Value;
use std::sync::Arc;

/// Answers every call with an empty 200.
struct InstantTransport;

impl Transport for InstantTransport {
    fn fetch(&self, _request: TransportRequest) -> TransportFuture<'_> {
        Box::pin(async { Ok(TransportResponse::new(200)) })
    }
}

fn orchestrated_store() -> Store<ApiumState> {
    let orchestrator: Arc<dyn Middleware<ApiumState>> = Arc::new(Orchestrator::new(
        OrchestratorConfig::new().with_base_url("http://bench.local"),
        InstantTransport,
    ));
    Store::with_middleware(ApiumState::default(), ApiumReducer, vec![orchestrator])
}

fn intent() -> Action {
    request(
        RequestPayload::new("/items"),
        Meta::new().with_origin(Action::custom("items/LOAD", Value::Null)),
    )
}

/// Benchmark the synchronous pipeline
fn benchmark_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));

    group.bench_function("reducer_only", |b| {
        let store = Store::new(ApiumState::default(), ApiumReducer);
        b.iter(|| {
            let _ = store.dispatch(black_box(Action::custom("noop", Value::Null)));
        });
    });

    group.bench_function("through_orchestrator", |b| {
        let store = orchestrated_store();
        b.iter(|| {
            let _ = store.dispatch(black_box(Action::custom("noop", Value::Null)));
        });
    });

    group.finish();
}

/// Benchmark a request from intent to settled future
fn benchmark_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("round_trip");
    group.throughput(Throughput::Elements(1));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime");

    group.bench_function("request", |b| {
        let store = orchestrated_store();
        b.to_async(&runtime).iter(|| async {
            let _ = store.request(black_box(intent())).await;
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_dispatch, benchmark_round_trip);
criterion_main!(benches);
