//! Routing benchmarks: per-decision overhead of each filter.
//!
//! The classifier and oracle benches use in-process backends, so they measure
//! preprocessing, normalization and bookkeeping, not model latency.

use std::sync::Arc;

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Runtime;

use edge_cloud_router::routing::ClassifierFilterConfig;
use edge_cloud_router::{
    ClassifierBackend, EchoBackend, FilterContext, FilterRegistry, FilterSpec, LabelScore, Query,
    QueryRouter, RouterError,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct StaticClassifier;

#[async_trait]
impl ClassifierBackend for StaticClassifier {
    fn name(&self) -> &str {
        "static"
    }

    async fn classify(&self, text: &str) -> Result<Vec<LabelScore>, RouterError> {
        let easy = 1.0 / (1.0 + text.len() as f64);
        Ok(vec![
            LabelScore::new("LABEL_0", easy),
            LabelScore::new("LABEL_1", 1.0 - easy),
        ])
    }
}

fn context() -> FilterContext {
    FilterContext::new()
        .with_edge(Arc::new(EchoBackend::with_delay(0)))
        .with_cloud(Arc::new(EchoBackend::with_delay(0)))
        .with_classifier(Arc::new(StaticClassifier))
}

fn router(spec: &FilterSpec) -> QueryRouter {
    let filter = FilterRegistry::new()
        .build(spec, &context())
        .expect("filter");
    QueryRouter::new(filter)
}

// ---------------------------------------------------------------------------
// Bench: route() per filter kind
// ---------------------------------------------------------------------------

fn bench_route_per_filter(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let query = Query::new("Explain the difference between TCP and UDP.").with_gold("A");

    let specs = [
        FilterSpec::new("edge_only"),
        FilterSpec::new("cloud_only"),
        FilterSpec::new("random").with_param("threshold", 0.5),
        FilterSpec::new("classifier"),
        FilterSpec::new("oracle"),
    ];

    let mut group = c.benchmark_group("route");
    for spec in &specs {
        let router = router(spec);
        group.bench_with_input(BenchmarkId::from_parameter(&spec.kind), &query, |b, q| {
            b.to_async(&rt).iter(|| async {
                let decision = router.route(black_box(q)).await;
                let _ = black_box(decision);
            })
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Bench: classifier preprocessing over growing inputs
// ---------------------------------------------------------------------------

fn bench_classifier_truncation(c: &mut Criterion) {
    let filter = edge_cloud_router::routing::ClassifierFilter::new(
        ClassifierFilterConfig::default(),
        Arc::new(StaticClassifier),
    )
    .expect("filter");

    let mut group = c.benchmark_group("classifier_preprocess");
    for len in [64usize, 512, 4096] {
        let query = Query::new("é".repeat(len));
        group.bench_with_input(BenchmarkId::new("chars", len), &query, |b, q| {
            b.iter(|| black_box(filter.preprocess(black_box(q))))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_route_per_filter, bench_classifier_truncation);
criterion_main!(benches);
