//! Collaborative inference step.
//!
//! The [`QueryRouter`] wraps one [`RoutingFilter`] together with the edge
//! and cloud handles, turns the filter's boolean into a [`RoutingDecision`],
//! and optionally runs the chosen tier.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::Instrument;

use super::filters::RoutingFilter;
use crate::backend::{ModelBackend, Response};
use crate::{metrics, Query, RouterError};

/// The tier a query is sent to.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingDecision {
    /// Easy sample: the edge model answers.
    Edge,
    /// Hard sample: escalate to the cloud model.
    Cloud,
}

impl RoutingDecision {
    /// Map a filter's hard-sample flag to a decision.
    pub fn from_hard(is_hard: bool) -> Self {
        if is_hard {
            Self::Cloud
        } else {
            Self::Edge
        }
    }

    /// Return `true` for [`RoutingDecision::Cloud`].
    pub fn is_hard(&self) -> bool {
        matches!(self, Self::Cloud)
    }

    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Edge => "edge",
            Self::Cloud => "cloud",
        }
    }
}

/// Outcome of one collaborative inference step.
///
/// `result` is the response that answers the query; the tier-specific field
/// that produced it is filled as well, the other one is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRecord {
    /// Whether the query was routed to the cloud.
    pub is_hard: bool,
    /// The answering response.
    pub result: Response,
    /// Edge response, when the edge answered.
    pub edge_result: Option<Response>,
    /// Cloud response, when the cloud answered.
    pub cloud_result: Option<Response>,
}

/// Decision counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionSnapshot {
    /// Queries kept on the edge.
    pub edge: u64,
    /// Queries escalated to the cloud.
    pub cloud: u64,
    /// Decisions that failed.
    pub errors: u64,
}

impl DecisionSnapshot {
    /// Successful decisions.
    pub fn total(&self) -> u64 {
        self.edge + self.cloud
    }

    /// Fraction of successful decisions sent to the cloud, `0.0` when empty.
    pub fn cloud_fraction(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.cloud as f64 / total as f64,
        }
    }
}

/// Per-query router over one filter.
///
/// Thread-safe: decision counters are atomics and the filter is `Send + Sync`.
///
/// # Panics
///
/// This type and its methods never panic.
pub struct QueryRouter {
    filter: Box<dyn RoutingFilter>,
    edge: Option<Arc<dyn ModelBackend>>,
    cloud: Option<Arc<dyn ModelBackend>>,

    edge_decisions: AtomicU64,
    cloud_decisions: AtomicU64,
    errors: AtomicU64,
}

impl std::fmt::Debug for QueryRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryRouter")
            .field("filter", &self.filter.name())
            .field("has_edge", &self.edge.is_some())
            .field("has_cloud", &self.cloud.is_some())
            .field("decisions", &self.decisions())
            .finish()
    }
}

impl QueryRouter {
    /// Create a router without model handles; only [`route`](Self::route) is usable.
    pub fn new(filter: Box<dyn RoutingFilter>) -> Self {
        Self {
            filter,
            edge: None,
            cloud: None,
            edge_decisions: AtomicU64::new(0),
            cloud_decisions: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Attach the edge handle.
    pub fn with_edge(mut self, edge: Arc<dyn ModelBackend>) -> Self {
        self.edge = Some(edge);
        self
    }

    /// Attach the cloud handle.
    pub fn with_cloud(mut self, cloud: Arc<dyn ModelBackend>) -> Self {
        self.cloud = Some(cloud);
        self
    }

    /// Name of the wrapped filter.
    pub fn filter_name(&self) -> &str {
        self.filter.name()
    }

    /// Decide which tier serves `query`.
    ///
    /// # Errors
    ///
    /// Filter errors, verbatim. They are counted and logged first.
    pub async fn route(&self, query: &Query) -> Result<RoutingDecision, RouterError> {
        let filter = self.filter.name();
        let span = tracing::debug_span!("route", filter);

        async {
            let started = Instant::now();
            match self.filter.decide(query).await {
                Ok(is_hard) => {
                    let decision = RoutingDecision::from_hard(is_hard);
                    let counter = match decision {
                        RoutingDecision::Edge => &self.edge_decisions,
                        RoutingDecision::Cloud => &self.cloud_decisions,
                    };
                    counter.fetch_add(1, Ordering::Relaxed);
                    metrics::record_decision(filter, decision.as_str(), started.elapsed());
                    tracing::debug!(route = decision.as_str(), "routed");
                    Ok(decision)
                }
                Err(e) => {
                    self.errors.fetch_add(1, Ordering::Relaxed);
                    metrics::inc_error(filter, e.err_type());
                    tracing::warn!(error = %e, "routing decision failed");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Route `query`, then run the chosen tier.
    ///
    /// # Errors
    ///
    /// - Filter errors from [`route`](Self::route).
    /// - [`RouterError::MissingHandle`] if the chosen tier has no handle.
    /// - Backend errors, verbatim.
    pub async fn infer(&self, query: &Query) -> Result<InferenceRecord, RouterError> {
        let decision = self.route(query).await?;
        let (handle, missing) = match decision {
            RoutingDecision::Edge => (&self.edge, "edgemodel"),
            RoutingDecision::Cloud => (&self.cloud, "cloudmodel"),
        };
        let backend = handle.as_ref().ok_or(RouterError::MissingHandle(missing))?;

        let result = backend.predict(query).await.inspect_err(|e| {
            metrics::inc_error(self.filter.name(), e.err_type());
        })?;

        let (edge_result, cloud_result) = match decision {
            RoutingDecision::Edge => (Some(result.clone()), None),
            RoutingDecision::Cloud => (None, Some(result.clone())),
        };
        Ok(InferenceRecord {
            is_hard: decision.is_hard(),
            result,
            edge_result,
            cloud_result,
        })
    }

    /// The filter's accumulated report, e.g. the oracle statistics.
    pub fn report(&self) -> Option<String> {
        self.filter.report()
    }

    /// Snapshot of the decision counters.
    pub fn decisions(&self) -> DecisionSnapshot {
        DecisionSnapshot {
            edge: self.edge_decisions.load(Ordering::Relaxed),
            cloud: self.cloud_decisions.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    /// Run the filter's cleanup.
    ///
    /// Model handles are not released here; their owners do that.
    pub async fn shutdown(&self) -> Result<(), RouterError> {
        let snapshot = self.decisions();
        tracing::info!(
            filter = self.filter.name(),
            edge = snapshot.edge,
            cloud = snapshot.cloud,
            errors = snapshot.errors,
            "query router shutting down"
        );
        self.filter.cleanup().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::EchoBackend;
    use crate::routing::filters::{CloudOnlyFilter, EdgeOnlyFilter};
    use async_trait::async_trait;

    struct Failing;

    #[async_trait]
    impl RoutingFilter for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn decide(&self, _query: &Query) -> Result<bool, RouterError> {
            Err(RouterError::Classifier("upstream down".into()))
        }
    }

    #[test]
    fn test_decision_from_hard() {
        assert_eq!(RoutingDecision::from_hard(true), RoutingDecision::Cloud);
        assert_eq!(RoutingDecision::from_hard(false), RoutingDecision::Edge);
        assert!(RoutingDecision::Cloud.is_hard());
        assert!(!RoutingDecision::Edge.is_hard());
    }

    #[tokio::test]
    async fn test_route_counts_decisions() {
        let router = QueryRouter::new(Box::new(CloudOnlyFilter));
        for _ in 0..3 {
            assert_eq!(
                router.route(&Query::new("q")).await.expect("test: route"),
                RoutingDecision::Cloud
            );
        }
        let snapshot = router.decisions();
        assert_eq!(snapshot.cloud, 3);
        assert_eq!(snapshot.edge, 0);
        assert!((snapshot.cloud_fraction() - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_route_error_is_counted_and_propagated() {
        let router = QueryRouter::new(Box::new(Failing));
        let result = router.route(&Query::new("q")).await;
        assert!(matches!(result, Err(RouterError::Classifier(_))));
        assert_eq!(router.decisions().errors, 1);
        assert_eq!(router.decisions().total(), 0);
    }

    #[tokio::test]
    async fn test_infer_uses_edge_for_easy_queries() {
        let router = QueryRouter::new(Box::new(EdgeOnlyFilter))
            .with_edge(Arc::new(EchoBackend::with_delay(0)))
            .with_cloud(Arc::new(EchoBackend::with_delay(0)));
        let record = router.infer(&Query::new("hello")).await.expect("test: infer");
        assert!(!record.is_hard);
        assert_eq!(record.result.completion, "hello");
        assert!(record.edge_result.is_some());
        assert!(record.cloud_result.is_none());
    }

    #[tokio::test]
    async fn test_infer_missing_tier_handle() {
        let router = QueryRouter::new(Box::new(CloudOnlyFilter))
            .with_edge(Arc::new(EchoBackend::with_delay(0)));
        let result = router.infer(&Query::new("q")).await;
        assert!(matches!(result, Err(RouterError::MissingHandle("cloudmodel"))));
    }

    #[tokio::test]
    async fn test_shutdown_runs_filter_cleanup() {
        let router = QueryRouter::new(Box::new(EdgeOnlyFilter));
        assert!(router.shutdown().await.is_ok());
        assert_eq!(router.filter_name(), "edge_only");
        assert!(router.report().is_none());
    }
}
