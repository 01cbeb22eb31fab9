//! # Stage: Hard-Sample Routing
//!
//! ## Responsibility
//! Decide, per query, whether the edge model's answer is good enough or the
//! query must be escalated to the cloud model. Five interchangeable filters
//! make that decision: always-edge, always-cloud, random, a learned text
//! classifier, and a ground-truth oracle that also reports how often each
//! tier was right.
//!
//! ## Guarantees
//! - Eager configuration: every filter validates its parameters at
//!   construction, so a built filter never fails for configuration reasons.
//! - Constant filters never fail and ignore their input.
//! - Oracle accounting: each successful decision increments exactly one
//!   outcome counter; counters are never reset.
//! - Thread-safe: counters are atomics and handle slots sit behind locks
//!   that are never held across an `.await`.
//!
//! ## NOT Responsible For
//! - Running model inference (that belongs to `backend` / `edge_model`)
//! - Retrying upstream failures: errors are surfaced verbatim

pub mod classifier;
pub mod config;
pub mod filters;
pub mod oracle;
pub mod outcome_tracker;
pub mod registry;
pub mod router;

// Re-exports for convenience
pub use classifier::ClassifierFilter;
pub use config::{ClassifierFilterConfig, RandomFilterConfig};
pub use filters::{CloudOnlyFilter, EdgeOnlyFilter, RandomFilter, RoutingFilter};
pub use oracle::OracleFilter;
pub use outcome_tracker::{OracleStats, Outcome, OutcomeTracker};
pub use registry::{filter_factory, FilterContext, FilterFactory, FilterRegistry};
pub use router::{DecisionSnapshot, InferenceRecord, QueryRouter, RoutingDecision};
