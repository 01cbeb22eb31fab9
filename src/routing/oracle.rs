//! Ground-truth oracle routing filter.
//!
//! Runs both tiers on every query and escalates exactly when the cloud model
//! is right and the edge model is wrong. This is the upper bound any learned
//! router can reach; the accumulated [`OracleStats`] are its report.

use std::sync::Arc;

use async_trait::async_trait;

use super::filters::RoutingFilter;
use super::outcome_tracker::{OracleStats, Outcome, OutcomeTracker};
use crate::backend::ModelBackend;
use crate::{metrics, Query, RouterError};

/// Oracle filter over an edge and a cloud backend.
///
/// # Panics
///
/// This type and its methods never panic.
pub struct OracleFilter {
    edge: Arc<dyn ModelBackend>,
    cloud: Arc<dyn ModelBackend>,
    tracker: OutcomeTracker,
}

impl std::fmt::Debug for OracleFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleFilter")
            .field("edge", &self.edge.name())
            .field("cloud", &self.cloud.name())
            .field("stats", &self.tracker.snapshot())
            .finish()
    }
}

impl OracleFilter {
    /// Create an oracle with zeroed counters.
    pub fn new(edge: Arc<dyn ModelBackend>, cloud: Arc<dyn ModelBackend>) -> Self {
        tracing::info!(edge = edge.name(), cloud = cloud.name(), "oracle filter ready");
        Self {
            edge,
            cloud,
            tracker: OutcomeTracker::new(),
        }
    }

    /// Snapshot of the outcome counters.
    pub fn stats(&self) -> OracleStats {
        self.tracker.snapshot()
    }
}

#[async_trait]
impl RoutingFilter for OracleFilter {
    fn name(&self) -> &str {
        "oracle"
    }

    /// Predict with both tiers and record the outcome.
    ///
    /// A backend failure propagates before anything is recorded.
    async fn decide(&self, query: &Query) -> Result<bool, RouterError> {
        let edge = self.edge.predict(query).await?;
        let cloud = self.cloud.predict(query).await?;

        let outcome = Outcome::classify(
            query.gold_matches(edge.prediction.as_deref()),
            query.gold_matches(cloud.prediction.as_deref()),
        );
        self.tracker.record(outcome);
        metrics::inc_oracle_outcome(outcome.as_str());

        tracing::debug!(outcome = outcome.as_str(), "oracle decision");
        Ok(outcome == Outcome::CloudBetter)
    }

    async fn cleanup(&self) -> Result<(), RouterError> {
        let stats = self.tracker.snapshot();
        tracing::info!(total = stats.total(), "{stats}");
        Ok(())
    }

    fn report(&self) -> Option<String> {
        Some(self.tracker.snapshot().to_string())
    }
}
