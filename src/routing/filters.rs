//! The routing filter contract and the parameter-free filters.

use async_trait::async_trait;
use rand::Rng;

use super::config::RandomFilterConfig;
use crate::{Query, RouterError};

/// Decides whether a query is a hard sample that must go to the cloud model.
///
/// `true` means hard (escalate to cloud), `false` means the edge model suffices.
#[async_trait]
pub trait RoutingFilter: Send + Sync {
    /// Filter name used in logs and metric labels.
    fn name(&self) -> &str;

    /// Classify one query.
    async fn decide(&self, query: &Query) -> Result<bool, RouterError>;

    /// Release resources held by the filter.
    async fn cleanup(&self) -> Result<(), RouterError> {
        Ok(())
    }

    /// Human-readable summary of what the filter has accumulated, if anything.
    fn report(&self) -> Option<String> {
        None
    }
}

/// Keeps every query on the edge.
#[derive(Debug, Default, Clone, Copy)]
pub struct EdgeOnlyFilter;

#[async_trait]
impl RoutingFilter for EdgeOnlyFilter {
    fn name(&self) -> &str {
        "edge_only"
    }

    async fn decide(&self, _query: &Query) -> Result<bool, RouterError> {
        Ok(false)
    }
}

/// Sends every query to the cloud.
#[derive(Debug, Default, Clone, Copy)]
pub struct CloudOnlyFilter;

#[async_trait]
impl RoutingFilter for CloudOnlyFilter {
    fn name(&self) -> &str {
        "cloud_only"
    }

    async fn decide(&self, _query: &Query) -> Result<bool, RouterError> {
        Ok(true)
    }
}

/// Keeps a query on the edge with probability `threshold`.
///
/// # Panics
///
/// This type and its methods never panic.
#[derive(Debug, Clone)]
pub struct RandomFilter {
    threshold: f64,
}

impl RandomFilter {
    /// Build from a validated config.
    ///
    /// # Errors
    ///
    /// [`RouterError::Config`] when the threshold is outside `[0, 1]`.
    pub fn new(config: RandomFilterConfig) -> Result<Self, RouterError> {
        config.validate()?;
        tracing::info!(threshold = config.threshold, "random filter ready");
        Ok(Self {
            threshold: config.threshold,
        })
    }

    /// Configured threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    // ThreadRng is !Send, so the draw stays out of the async body.
    fn draw(&self) -> bool {
        let r: f64 = rand::thread_rng().gen();
        r >= self.threshold
    }
}

#[async_trait]
impl RoutingFilter for RandomFilter {
    fn name(&self) -> &str {
        "random"
    }

    async fn decide(&self, _query: &Query) -> Result<bool, RouterError> {
        Ok(self.draw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random(threshold: f64) -> RandomFilter {
        RandomFilter::new(RandomFilterConfig { threshold }).expect("test: valid threshold")
    }

    #[tokio::test]
    async fn test_constant_filters_ignore_input() {
        let queries = [Query::new(""), Query::new("a much harder question").with_gold("B")];
        for q in &queries {
            assert!(!EdgeOnlyFilter.decide(q).await.expect("test: edge"));
            assert!(CloudOnlyFilter.decide(q).await.expect("test: cloud"));
        }
    }

    #[tokio::test]
    async fn test_random_threshold_zero_always_hard() {
        let filter = random(0.0);
        let q = Query::new("q");
        for _ in 0..1_000 {
            assert!(filter.decide(&q).await.expect("test: decide"));
        }
    }

    #[tokio::test]
    async fn test_random_threshold_one_always_easy() {
        let filter = random(1.0);
        let q = Query::new("q");
        for _ in 0..1_000 {
            assert!(!filter.decide(&q).await.expect("test: decide"));
        }
    }

    #[tokio::test]
    async fn test_random_threshold_half_splits_evenly() {
        let filter = random(0.5);
        let q = Query::new("q");
        let trials = 10_000;
        let mut easy = 0u32;
        for _ in 0..trials {
            if !filter.decide(&q).await.expect("test: decide") {
                easy += 1;
            }
        }
        let ratio = f64::from(easy) / f64::from(trials);
        assert!((ratio - 0.5).abs() <= 0.05, "easy ratio {ratio}");
    }

    #[test]
    fn test_random_rejects_out_of_range_threshold() {
        assert!(RandomFilter::new(RandomFilterConfig { threshold: -0.1 }).is_err());
        assert!(RandomFilter::new(RandomFilterConfig { threshold: 1.01 }).is_err());
    }
}
