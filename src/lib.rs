//! # edge-cloud-router
//!
//! Hard-sample routing for collaborative edge/cloud LLM inference.
//!
//! ## Architecture
//!
//! Every query passes through one [`RoutingFilter`](routing::RoutingFilter)
//! which answers a single question: is this a *hard sample* that must be
//! escalated to the cloud model?
//! ```text
//! Query ─▶ RoutingFilter::decide ─▶ false ─▶ EdgeModel (local backend)
//!                                 └▶ true  ─▶ cloud ModelBackend
//! ```
//!
//! Five filters ship with the crate: `edge_only`, `cloud_only`, `random`,
//! `classifier` and `oracle`. They are resolved by name through the
//! [`FilterRegistry`](routing::FilterRegistry).

// ── Lint policy ───────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(missing_docs)]

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub mod backend;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod edge_model;
pub mod metrics;
pub mod routing;

// Re-exports for convenience
pub use backend::{
    build_backend, release_backends, BackendKind, EchoBackend, ModelBackend, Response,
};
pub use classifier::{ClassifierBackend, HttpClassifier, LabelScore};
pub use config::validation::ConfigError;
pub use config::{BackendConfig, FilterSpec, LogFormat, RouterConfig};
pub use edge_model::EdgeModel;
pub use routing::{
    FilterContext, FilterRegistry, InferenceRecord, OracleStats, QueryRouter, RoutingDecision,
    RoutingFilter,
};

/// Initialise the global tracing subscriber.
///
/// Reads the `LOG_FORMAT` environment variable to choose output format:
/// - `"json"`: structured JSON output for log aggregators
/// - anything else (including unset): human-readable pretty output
///
/// Filter level is controlled by `RUST_LOG` (e.g. `RUST_LOG=info`).
///
/// # Errors
///
/// Returns [`RouterError::Other`] if the global subscriber has already
/// been set (e.g. by a previous call or a test harness).
///
/// # Panics
///
/// This function never panics.
pub fn init_tracing() -> Result<(), RouterError> {
    let format = match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => LogFormat::Json,
        _ => LogFormat::Pretty,
    };
    init_tracing_with(&format)
}

/// Initialise the global tracing subscriber with an explicit output format.
///
/// # Errors
///
/// Returns [`RouterError::Other`] if a global subscriber is already installed.
pub fn init_tracing_with(format: &LogFormat) -> Result<(), RouterError> {
    let result = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_current_span(true)
            .with_span_list(true)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init(),
    };

    result.map_err(|e| RouterError::Other(format!("tracing init failed: {e}")))
}

/// Top-level routing errors.
///
/// Configuration problems are raised eagerly at construction or load time.
/// Upstream failures from model backends and classifiers are surfaced
/// verbatim and never retried.
#[derive(Error, Debug)]
pub enum RouterError {
    /// The configured backend kind is not one of the recognized kinds.
    #[error("backend '{0}' is not supported; use 'huggingface', 'vllm', or 'api'")]
    UnsupportedBackend(String),

    /// The classifier task is not supported.
    #[error("task '{0}' is not supported; only 'text-classification' is available")]
    UnsupportedTask(String),

    /// No routing filter is registered under the requested name.
    #[error("no routing filter registered as '{0}'")]
    UnknownFilter(String),

    /// A required collaborator handle (edge model, cloud model, …) was not supplied.
    #[error("missing required handle: {0}")]
    MissingHandle(&'static str),

    /// Configuration parsing or validation failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A model backend call failed (network, API, or parsing error).
    #[error("inference failed: {0}")]
    Inference(String),

    /// A classifier call failed or returned an unusable distribution.
    #[error("classifier failed: {0}")]
    Classifier(String),

    /// `predict` was called before `load`, or after `cleanup`.
    #[error("model backend is not loaded; call load() first")]
    NotLoaded,

    /// The named resource was released by `cleanup()`.
    #[error("{0} was released by cleanup()")]
    ResourceReleased(&'static str),

    /// An aggregate metric was requested over zero records.
    #[error("cannot aggregate an empty set of inference records")]
    EmptyInput,

    /// Catch-all for errors that do not fit a specific variant.
    #[error("{0}")]
    Other(String),
}

impl RouterError {
    /// Return `true` for errors that stem from invalid configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedBackend(_)
                | Self::UnsupportedTask(_)
                | Self::UnknownFilter(_)
                | Self::MissingHandle(_)
                | Self::Config(_)
        )
    }

    /// Short, stable label used for the `err_type` metric dimension.
    pub fn err_type(&self) -> &'static str {
        match self {
            Self::UnsupportedBackend(_) => "unsupported_backend",
            Self::UnsupportedTask(_) => "unsupported_task",
            Self::UnknownFilter(_) => "unknown_filter",
            Self::MissingHandle(_) => "missing_handle",
            Self::Config(_) => "config",
            Self::Inference(_) => "inference",
            Self::Classifier(_) => "classifier",
            Self::NotLoaded => "not_loaded",
            Self::ResourceReleased(_) => "released",
            Self::EmptyInput => "empty_input",
            Self::Other(_) => "other",
        }
    }
}

/// A single request handed to the routing engine.
///
/// The `query` field is either plain text or a mapping; a mapping may carry
/// the actual text under its own `query` key. `gold` is the optional ground
/// truth answer used by the oracle filter. Any other keys are preserved in
/// `extra` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Text payload, or a mapping wrapping it.
    pub query: Value,
    /// Ground-truth answer, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gold: Option<Value>,
    /// Remaining payload keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Query {
    /// Create a plain-text query without ground truth.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            query: Value::String(text.into()),
            gold: None,
            extra: Map::new(),
        }
    }

    /// Attach a ground-truth answer.
    pub fn with_gold(mut self, gold: impl Into<Value>) -> Self {
        self.gold = Some(gold.into());
        self
    }

    /// Return the textual form of the query.
    ///
    /// A mapping with a `query` key is unwrapped exactly one level. Any other
    /// non-string payload is rendered as compact JSON.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn text(&self) -> Cow<'_, str> {
        match &self.query {
            Value::String(s) => Cow::Borrowed(s),
            Value::Object(map) => match map.get("query") {
                Some(Value::String(inner)) => Cow::Borrowed(inner),
                Some(other) => Cow::Owned(other.to_string()),
                None => Cow::Owned(self.query.to_string()),
            },
            other => Cow::Owned(other.to_string()),
        }
    }

    /// Compare a model prediction with the ground truth by exact value equality.
    ///
    /// A missing `gold` or a missing prediction never matches.
    pub fn gold_matches(&self, prediction: Option<&str>) -> bool {
        match (&self.gold, prediction) {
            (Some(Value::String(gold)), Some(prediction)) => gold == prediction,
            _ => false,
        }
    }
}

/// Truncate `text` to at most `max_chars` Unicode scalar values.
///
/// # Panics
///
/// This function never panics.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_text_plain_string() {
        let q = Query::new("What is 2 + 2?");
        assert_eq!(q.text(), "What is 2 + 2?");
    }

    #[test]
    fn test_query_text_unwraps_nested_query_once() {
        let q: Query = serde_json::from_value(json!({
            "query": {"query": "inner text", "prompt": "ignored"},
            "gold": "B"
        }))
        .expect("test: deserialize");
        assert_eq!(q.text(), "inner text");
    }

    #[test]
    fn test_query_text_unwraps_only_one_level() {
        let q: Query = serde_json::from_value(json!({
            "query": {"query": {"query": "deep"}}
        }))
        .expect("test: deserialize");
        assert_eq!(q.text(), r#"{"query":"deep"}"#);
    }

    #[test]
    fn test_query_text_mapping_without_query_key_renders_json() {
        let q: Query = serde_json::from_value(json!({"query": {"prompt": "x"}}))
            .expect("test: deserialize");
        assert_eq!(q.text(), r#"{"prompt":"x"}"#);
    }

    #[test]
    fn test_query_preserves_extra_keys() {
        let q: Query = serde_json::from_value(json!({
            "query": "hi",
            "id": 7,
            "subject": "math"
        }))
        .expect("test: deserialize");
        assert_eq!(q.extra.get("id"), Some(&json!(7)));
        assert_eq!(q.extra.get("subject"), Some(&json!("math")));
        assert!(q.gold.is_none());
    }

    #[test]
    fn test_gold_matches_exact_only() {
        let q = Query::new("q").with_gold("A");
        assert!(q.gold_matches(Some("A")));
        assert!(!q.gold_matches(Some("a")));
        assert!(!q.gold_matches(Some(" A")));
        assert!(!q.gold_matches(None));
    }

    #[test]
    fn test_gold_missing_never_matches() {
        let q = Query::new("q");
        assert!(!q.gold_matches(Some("A")));
        assert!(!q.gold_matches(None));
    }

    #[test]
    fn test_truncate_chars_counts_characters_not_bytes() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo");
        assert_eq!(truncate_chars("short", 512), "short");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_unsupported_backend_display_names_backend() {
        let err = RouterError::UnsupportedBackend("tensorrt".to_string());
        assert!(err.to_string().contains("tensorrt"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_upstream_errors_are_not_configuration() {
        assert!(!RouterError::Inference("boom".into()).is_configuration());
        assert!(!RouterError::Classifier("boom".into()).is_configuration());
        assert_eq!(RouterError::NotLoaded.err_type(), "not_loaded");
    }

    #[test]
    fn test_init_tracing_second_call_returns_err() {
        let _ = init_tracing();
        let result = init_tracing();
        assert!(result.is_err(), "double init must return Err, not panic");
    }
}
