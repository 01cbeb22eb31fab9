//! # Stage: Declarative Router Configuration
//!
//! ## Responsibility
//! Describe the edge backend, the cloud backend, the routing filter and the
//! observability settings of a router instance in one TOML document:
//! ```text
//! edge-cloud-router --config router.toml --queries data.jsonl
//! ```
//!
//! ## Guarantees
//! - Deterministic: same TOML input always produces the same `RouterConfig`
//! - Validated: semantic constraints are checked before a config is accepted
//! - Lenient on filter parameters: unknown keys in `[filter]` are ignored by
//!   the filter that consumes them
//! - Schema-exportable: [`json_schema`] emits a JSON Schema for editors
//!
//! ## NOT Responsible For
//! - Per-filter parameter typing (that belongs to `routing::config`)
//! - Constructing backends (that belongs to `backend` and `edge_model`)

pub mod loader;
pub mod validation;

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Default value functions ──────────────────────────────────────────────

/// Default serving backend for a model: `"huggingface"`.
fn default_backend() -> String {
    "huggingface".to_string()
}

/// Default sampling temperature.
fn default_temperature() -> f32 {
    0.8
}

/// Default nucleus sampling mass.
fn default_top_p() -> f32 {
    0.8
}

/// Default repetition penalty.
fn default_repetition_penalty() -> f32 {
    1.05
}

/// Default maximum number of generated tokens.
fn default_max_tokens() -> u32 {
    512
}

/// Default per-request timeout: 60 s.
fn default_timeout_ms() -> u64 {
    60_000
}

/// Default enabled state: true.
fn default_true() -> bool {
    true
}

// ── Top-level config ─────────────────────────────────────────────────────

/// Root configuration for a router instance.
///
/// # Example
///
/// ```toml
/// [edge]
/// model = "Qwen/Qwen2.5-1.5B-Instruct"
/// backend = "vllm"
///
/// [cloud]
/// model = "gpt-4o-mini"
/// backend = "api"
///
/// [filter]
/// kind = "classifier"
/// threshold = 0.5
/// ```
///
/// # Panics
///
/// This type never panics during construction or access.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RouterConfig {
    /// The weaker, low-latency model served next to the caller.
    pub edge: BackendConfig,
    /// The stronger remote model queries are escalated to.
    pub cloud: BackendConfig,
    /// Which routing filter decides between the two.
    pub filter: FilterSpec,
    /// Logging and metrics settings.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ── Backend config ───────────────────────────────────────────────────────

/// Construction parameters for a model backend.
///
/// `backend` is kept as a free-form string so that an unrecognized value is
/// reported by `EdgeModel::load` with the offending name, rather than as an
/// opaque parse error.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct BackendConfig {
    /// Model identifier passed to the backend (e.g. a Hugging Face repo id).
    pub model: String,
    /// Serving framework: `"huggingface"`, `"vllm"` or `"api"`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Server base URL. `None` uses the backend's default.
    #[serde(default)]
    pub url: Option<String>,
    /// API key for the `api` backend. Falls back to `OPENAI_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Nucleus sampling mass.
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Repetition penalty (ignored by the `api` backend).
    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f32,
    /// Maximum number of tokens to generate.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Whether identical prompts are answered from the response cache.
    #[serde(default = "default_true")]
    pub use_cache: bool,
    /// JSON file the response cache is loaded from and saved to.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
    /// Optional system prompt prepended to every query.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl BackendConfig {
    /// Create a config for `model` with every other field at its default.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            backend: default_backend(),
            url: None,
            api_key: None,
            temperature: default_temperature(),
            top_p: default_top_p(),
            repetition_penalty: default_repetition_penalty(),
            max_tokens: default_max_tokens(),
            timeout_ms: default_timeout_ms(),
            use_cache: default_true(),
            cache_path: None,
            system_prompt: None,
        }
    }

    /// Set the serving backend.
    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    /// Set the server base URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the cache file.
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }
}

// ── Filter spec ──────────────────────────────────────────────────────────

/// Which routing filter to build, plus its free-form parameters.
///
/// The parameters stay untyped here; each filter factory deserializes the
/// keys it recognizes and ignores the rest.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct FilterSpec {
    /// Registry key, e.g. `"oracle"` or the alias `"OracleRouter"`.
    pub kind: String,
    /// Filter-specific parameters (`threshold`, `max_length`, …).
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl FilterSpec {
    /// Create a spec with no parameters.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Map::new(),
        }
    }

    /// Add one parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

// ── Observability ────────────────────────────────────────────────────────

/// Observability settings.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct ObservabilityConfig {
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
    /// Whether the Prometheus registry is initialised at startup.
    #[serde(default)]
    pub metrics_enabled: bool,
}

/// Log output format.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable, colorized log output.
    #[default]
    Pretty,
    /// Structured JSON log output for machine consumption.
    Json,
}

/// Export the JSON Schema of [`RouterConfig`].
///
/// # Errors
///
/// Returns the serializer error if the schema cannot be rendered.
pub fn json_schema() -> Result<String, serde_json::Error> {
    let schema = schemars::schema_for!(RouterConfig);
    serde_json::to_string_pretty(&schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[edge]
model = "Qwen/Qwen2.5-1.5B-Instruct"

[cloud]
model = "gpt-4o-mini"
backend = "api"

[filter]
kind = "random"
threshold = 0.3
"#;

    #[test]
    fn test_backend_config_new_uses_defaults() {
        let cfg = BackendConfig::new("m");
        assert_eq!(cfg.backend, "huggingface");
        assert!((cfg.temperature - 0.8).abs() < f32::EPSILON);
        assert!((cfg.top_p - 0.8).abs() < f32::EPSILON);
        assert_eq!(cfg.max_tokens, 512);
        assert_eq!(cfg.timeout_ms, 60_000);
        assert!(cfg.use_cache);
        assert!(cfg.cache_path.is_none());
    }

    #[test]
    fn test_router_config_minimal_toml_fills_defaults() {
        let cfg: RouterConfig = toml::from_str(MINIMAL).expect("test: parse");
        assert_eq!(cfg.edge.backend, "huggingface");
        assert_eq!(cfg.cloud.backend, "api");
        assert_eq!(cfg.filter.kind, "random");
        assert_eq!(cfg.filter.params.get("threshold"), Some(&Value::from(0.3)));
        assert_eq!(cfg.observability.log_format, LogFormat::Pretty);
        assert!(!cfg.observability.metrics_enabled);
    }

    #[test]
    fn test_filter_spec_collects_unknown_keys_as_params() {
        let spec: FilterSpec =
            toml::from_str("kind = \"classifier\"\nmax_length = 128\nfoo = \"bar\"")
                .expect("test: parse");
        assert_eq!(spec.kind, "classifier");
        assert_eq!(spec.params.len(), 2);
        assert_eq!(spec.params.get("foo"), Some(&Value::from("bar")));
    }

    #[test]
    fn test_filter_spec_with_param_builder() {
        let spec = FilterSpec::new("random").with_param("threshold", 0.5);
        assert_eq!(spec.params.get("threshold"), Some(&Value::from(0.5)));
    }

    #[test]
    fn test_log_format_serializes_snake_case() {
        let json = serde_json::to_string(&LogFormat::Json).expect("test: serialization");
        assert_eq!(json, "\"json\"");
    }

    #[test]
    fn test_router_config_json_roundtrip() {
        let cfg: RouterConfig = toml::from_str(MINIMAL).expect("test: parse");
        let json = serde_json::to_string(&cfg).expect("test: serialize");
        let back: RouterConfig = serde_json::from_str(&json).expect("test: deserialize");
        assert_eq!(cfg, back);
    }

    #[test]
    fn test_json_schema_mentions_sections() {
        let schema = json_schema().expect("test: schema");
        assert!(schema.contains("edge"));
        assert!(schema.contains("cloud"));
        assert!(schema.contains("filter"));
    }
}
