//! Prometheus metrics and latency aggregation for routed inference.
//!
//! ## Usage
//!
//! Call [`init_metrics`] once at process startup. The helper functions
//! (`record_decision`, `inc_error`, …) are no-ops if `init_metrics` was never
//! called, so routing always works; observability simply degrades.
//!
//! ## Metrics Exposed
//!
//! | Name | Type | Labels |
//! |------|------|--------|
//! | `router_decisions_total` | Counter | `filter`, `route` |
//! | `router_errors_total` | Counter | `filter`, `err_type` |
//! | `router_decision_duration_seconds` | Histogram | `filter` |
//! | `router_oracle_outcomes_total` | Counter | `outcome` |
//!
//! [`time_to_first_token`] is a plain aggregate over [`InferenceRecord`]s and
//! does not need the registry.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use prometheus::{
    core::Collector, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};

use crate::routing::InferenceRecord;
use crate::RouterError;

// ── Internal metrics bundle ────────────────────────────────────────────────

/// All Prometheus metrics of the router, stored in a single [`OnceLock`].
pub struct Metrics {
    /// Prometheus registry that owns all metric descriptors.
    pub registry: Registry,
    /// Decisions per filter and route.
    pub decisions_total: CounterVec,
    /// Errors by filter and error type.
    pub errors_total: CounterVec,
    /// Decision latency per filter.
    pub decision_duration: HistogramVec,
    /// Oracle outcomes.
    pub oracle_outcomes: CounterVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn init_failed(e: prometheus::Error) -> RouterError {
    RouterError::Other(format!("metrics init failed: {e}"))
}

fn registration_failed(e: prometheus::Error) -> RouterError {
    RouterError::Other(format!("metrics registration failed: {e}"))
}

impl Metrics {
    /// Build the bundle with metric names carrying `prefix`.
    fn build(prefix: &str) -> Result<Self, RouterError> {
        let registry = Registry::new();

        let decisions_total = CounterVec::new(
            Opts::new(format!("{prefix}_decisions_total"), "Routing decisions"),
            &["filter", "route"],
        )
        .map_err(init_failed)?;
        registry
            .register(Box::new(decisions_total.clone()))
            .map_err(registration_failed)?;

        let errors_total = CounterVec::new(
            Opts::new(format!("{prefix}_errors_total"), "Errors by filter and type"),
            &["filter", "err_type"],
        )
        .map_err(init_failed)?;
        registry
            .register(Box::new(errors_total.clone()))
            .map_err(registration_failed)?;

        let decision_duration = HistogramVec::new(
            HistogramOpts::new(
                format!("{prefix}_decision_duration_seconds"),
                "Time spent deciding per filter",
            ),
            &["filter"],
        )
        .map_err(init_failed)?;
        registry
            .register(Box::new(decision_duration.clone()))
            .map_err(registration_failed)?;

        let oracle_outcomes = CounterVec::new(
            Opts::new(
                format!("{prefix}_oracle_outcomes_total"),
                "Oracle comparisons of edge and cloud against ground truth",
            ),
            &["outcome"],
        )
        .map_err(init_failed)?;
        registry
            .register(Box::new(oracle_outcomes.clone()))
            .map_err(registration_failed)?;

        Ok(Self {
            registry,
            decisions_total,
            errors_total,
            decision_duration,
            oracle_outcomes,
        })
    }
}

// ── Initialisation ─────────────────────────────────────────────────────────

/// Initialise all Prometheus metrics with a private registry.
///
/// Calling it a second time is a no-op (returns `Ok(())`).
///
/// # Errors
///
/// Returns [`RouterError::Other`] if metric construction or registration fails.
///
/// # Panics
///
/// This function never panics.
pub fn init_metrics() -> Result<(), RouterError> {
    if METRICS.get().is_some() {
        return Ok(());
    }
    // A racing initializer builds identical descriptors; the first one wins.
    let _ = METRICS.set(Metrics::build("router")?);
    Ok(())
}

fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

// ── Public helper functions ────────────────────────────────────────────────

/// Count one decision and observe its latency.
///
/// No-op if metrics have not been initialised.
pub fn record_decision(filter: &str, route: &str, d: Duration) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.decisions_total.get_metric_with_label_values(&[filter, route]) {
            c.inc();
        }
        if let Ok(h) = m.decision_duration.get_metric_with_label_values(&[filter]) {
            h.observe(d.as_secs_f64());
        }
    }
}

/// Increment the error counter for a filter and error type.
///
/// No-op if metrics have not been initialised.
pub fn inc_error(filter: &str, err_type: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.errors_total.get_metric_with_label_values(&[filter, err_type]) {
            c.inc();
        }
    }
}

/// Increment the oracle outcome counter.
///
/// No-op if metrics have not been initialised.
pub fn inc_oracle_outcome(outcome: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.oracle_outcomes.get_metric_with_label_values(&[outcome]) {
            c.inc();
        }
    }
}

/// Gather all registered metric families.
///
/// Returns an empty `Vec` if metrics have not been initialised.
pub fn gather() -> Vec<prometheus::proto::MetricFamily> {
    metrics().map_or_else(Vec::new, |m| m.registry.gather())
}

/// Encode all metrics in the Prometheus text exposition format.
///
/// Returns an empty string if metrics have not been initialised or if
/// encoding fails.
///
/// # Panics
///
/// This function never panics.
pub fn gather_metrics() -> String {
    let families = gather();
    if families.is_empty() {
        return String::new();
    }
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Structured snapshot of the decision and error counters.
#[derive(Debug, Default)]
pub struct MetricsSummary {
    /// Decision counts keyed by `"filter:route"`.
    pub decisions_total: HashMap<String, u64>,
    /// Error counts keyed by `"filter:err_type"`.
    pub errors_total: HashMap<String, u64>,
}

fn label<'a>(metric: &'a prometheus::proto::Metric, name: &str) -> &'a str {
    metric
        .get_label()
        .iter()
        .find(|l| l.get_name() == name)
        .map_or("unknown", |l| l.get_value())
}

fn summarize(counter: &CounterVec, second: &str, into: &mut HashMap<String, u64>) {
    for family in counter.collect() {
        for metric in family.get_metric() {
            let key = format!("{}:{}", label(metric, "filter"), label(metric, second));
            into.insert(key, metric.get_counter().get_value() as u64);
        }
    }
}

/// Return the current counter values.
///
/// Returns an empty [`MetricsSummary`] if metrics have not been initialised.
pub fn get_metrics_summary() -> MetricsSummary {
    let Some(m) = metrics() else {
        return MetricsSummary::default();
    };

    let mut summary = MetricsSummary::default();
    summarize(&m.decisions_total, "route", &mut summary.decisions_total);
    summarize(&m.errors_total, "err_type", &mut summary.errors_total);
    summary
}

// ── Latency aggregation ────────────────────────────────────────────────────

/// Mean time-to-first-token of the answering responses, in seconds,
/// rounded to 3 decimals.
///
/// # Errors
///
/// [`RouterError::EmptyInput`] when `records` is empty.
pub fn time_to_first_token(records: &[InferenceRecord]) -> Result<f64, RouterError> {
    if records.is_empty() {
        return Err(RouterError::EmptyInput);
    }
    let sum: f64 = records
        .iter()
        .map(|r| r.result.perf.time_to_first_token)
        .sum();
    let mean = sum / records.len() as f64;
    Ok((mean * 1000.0).round() / 1000.0)
}
