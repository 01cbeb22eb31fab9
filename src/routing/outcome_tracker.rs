//! Oracle outcome accounting.
//!
//! Each oracle decision compares the edge and cloud predictions against the
//! ground truth and lands in exactly one of four buckets. Counters only grow.
//!
//! Thread-safe: all counters use atomic operations for lock-free reads
//! and writes.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Result of comparing both tiers against ground truth for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Both tiers answered correctly.
    BothCorrect,
    /// Neither tier answered correctly.
    BothWrong,
    /// Only the edge model was correct.
    EdgeBetter,
    /// Only the cloud model was correct.
    CloudBetter,
}

impl Outcome {
    /// Classify a pair of correctness flags.
    pub fn classify(edge_correct: bool, cloud_correct: bool) -> Self {
        match (edge_correct, cloud_correct) {
            (true, true) => Self::BothCorrect,
            (false, false) => Self::BothWrong,
            (true, false) => Self::EdgeBetter,
            (false, true) => Self::CloudBetter,
        }
    }

    /// Metric label for the outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BothCorrect => "both_correct",
            Self::BothWrong => "both_wrong",
            Self::EdgeBetter => "edge_better",
            Self::CloudBetter => "cloud_better",
        }
    }
}

/// Lock-free outcome counters.
///
/// # Panics
///
/// This type and its methods never panic.
#[derive(Debug, Default)]
pub struct OutcomeTracker {
    both_correct: AtomicU64,
    both_wrong: AtomicU64,
    edge_better: AtomicU64,
    cloud_better: AtomicU64,
}

impl OutcomeTracker {
    /// Create a tracker with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the counter for `outcome`.
    pub fn record(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::BothCorrect => &self.both_correct,
            Outcome::BothWrong => &self.both_wrong,
            Outcome::EdgeBetter => &self.edge_better,
            Outcome::CloudBetter => &self.cloud_better,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the counters.
    pub fn snapshot(&self) -> OracleStats {
        OracleStats {
            both_correct: self.both_correct.load(Ordering::Relaxed),
            both_wrong: self.both_wrong.load(Ordering::Relaxed),
            edge_better: self.edge_better.load(Ordering::Relaxed),
            cloud_better: self.cloud_better.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of the oracle counters.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleStats {
    /// Both tiers correct.
    pub both_correct: u64,
    /// Both tiers wrong.
    pub both_wrong: u64,
    /// Edge correct, cloud wrong.
    pub edge_better: u64,
    /// Cloud correct, edge wrong.
    pub cloud_better: u64,
}

impl OracleStats {
    /// Number of recorded decisions.
    pub fn total(&self) -> u64 {
        self.both_correct + self.both_wrong + self.edge_better + self.cloud_better
    }

    /// Fraction of queries the edge model answered correctly, whether or not the cloud did too.
    ///
    /// Returns `0.0` when nothing has been recorded.
    pub fn edge_accuracy(&self) -> f64 {
        self.ratio(self.both_correct + self.edge_better)
    }

    /// Fraction of queries the cloud model answered correctly, whether or not the edge did too.
    pub fn cloud_accuracy(&self) -> f64 {
        self.ratio(self.both_correct + self.cloud_better)
    }

    /// Accuracy of perfect routing: correct whenever either tier is correct.
    pub fn oracle_accuracy(&self) -> f64 {
        self.ratio(self.both_correct + self.edge_better + self.cloud_better)
    }

    /// Fraction of queries the oracle escalated to the cloud.
    pub fn escalation_rate(&self) -> f64 {
        self.ratio(self.cloud_better)
    }

    fn ratio(&self, count: u64) -> f64 {
        match self.total() {
            0 => 0.0,
            total => count as f64 / total as f64,
        }
    }
}

impl fmt::Display for OracleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OracleRouter Statistics: Both Wrong: {}, Both Correct: {}, Edge Better: {}, Cloud Better: {}",
            self.both_wrong, self.both_correct, self.edge_better, self.cloud_better
        )
    }
}
