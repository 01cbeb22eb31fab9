//! Scripted oracle runs with deterministic edge and cloud answers

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use edge_cloud_router::backend::{Perf, TokenUsage};
use edge_cloud_router::routing::OracleFilter;
use edge_cloud_router::{
    FilterContext, FilterRegistry, FilterSpec, ModelBackend, OracleStats, Query, QueryRouter,
    Response, RouterError, RoutingFilter,
};

/// Answers from a fixed question → answer table; unknown questions get no prediction.
struct Scripted {
    name: &'static str,
    answers: HashMap<&'static str, &'static str>,
}

impl Scripted {
    fn new(name: &'static str, answers: &[(&'static str, &'static str)]) -> Arc<Self> {
        Arc::new(Self {
            name,
            answers: answers.iter().copied().collect(),
        })
    }
}

#[async_trait]
impl ModelBackend for Scripted {
    fn name(&self) -> &str {
        self.name
    }

    async fn predict(&self, query: &Query) -> Result<Response, RouterError> {
        let text = query.text();
        let answer = self.answers.get(&*text).copied();
        Ok(Response {
            completion: answer.unwrap_or_default().to_string(),
            prediction: answer.map(str::to_string),
            usage: TokenUsage::default(),
            perf: Perf {
                time_to_first_token: 0.05,
                ..Perf::default()
            },
        })
    }
}

fn dataset() -> Vec<Query> {
    vec![
        Query::new("q1").with_gold("A"), // both correct
        Query::new("q2").with_gold("B"), // cloud better
        Query::new("q3").with_gold("C"), // edge better
        Query::new("q4").with_gold("D"), // both wrong
        Query::new("q5").with_gold("A"), // cloud better
        Query::new("q6"),                // no gold: both wrong
    ]
}

fn backends() -> (Arc<Scripted>, Arc<Scripted>) {
    let edge = Scripted::new(
        "edge",
        &[("q1", "A"), ("q2", "X"), ("q3", "C"), ("q4", "X"), ("q5", "B"), ("q6", "A")],
    );
    let cloud = Scripted::new(
        "cloud",
        &[("q1", "A"), ("q2", "B"), ("q3", "X"), ("q4", "Y"), ("q5", "A"), ("q6", "A")],
    );
    (edge, cloud)
}

#[tokio::test]
async fn test_scripted_run_produces_deterministic_report() {
    let (edge, cloud) = backends();
    let oracle = OracleFilter::new(edge, cloud);

    let mut escalated = Vec::new();
    for q in dataset() {
        escalated.push(oracle.decide(&q).await.expect("decide"));
    }

    assert_eq!(escalated, vec![false, true, false, false, true, false]);
    assert_eq!(
        oracle.stats(),
        OracleStats {
            both_correct: 1,
            both_wrong: 2,
            edge_better: 1,
            cloud_better: 2,
        }
    );
    assert_eq!(
        oracle.stats().to_string(),
        "OracleRouter Statistics: Both Wrong: 2, Both Correct: 1, Edge Better: 1, Cloud Better: 2"
    );

    oracle.cleanup().await.expect("cleanup");
    assert_eq!(oracle.stats().total(), 6);
}

#[tokio::test]
async fn test_oracle_through_registry_and_router() {
    let (edge, cloud) = backends();
    let ctx = FilterContext::new()
        .with_edge(edge.clone())
        .with_cloud(cloud.clone());
    let filter = FilterRegistry::new()
        .build(&FilterSpec::new("OracleRouter"), &ctx)
        .expect("build");
    let router = QueryRouter::new(filter).with_edge(edge).with_cloud(cloud);

    let mut records = Vec::new();
    for q in dataset() {
        records.push(router.infer(&q).await.expect("infer"));
    }

    let decisions = router.decisions();
    assert_eq!(decisions.cloud, 2);
    assert_eq!(decisions.edge, 4);
    assert_eq!(records.iter().filter(|r| r.is_hard).count(), 2);

    // Escalated queries are answered correctly by the cloud.
    for (record, q) in records.iter().zip(dataset()) {
        if record.is_hard {
            assert!(q.gold_matches(record.result.prediction.as_deref()));
        }
    }

    assert_eq!(
        router.report().as_deref(),
        Some("OracleRouter Statistics: Both Wrong: 2, Both Correct: 1, Edge Better: 1, Cloud Better: 2")
    );
    router.shutdown().await.expect("shutdown");
}
