//! Typed routing filter configuration.
//!
//! Each filter variant that takes parameters has a serde config with default
//! functions. A `[filter]` table is deserialized with [`from_params`]; keys a
//! filter does not recognize are ignored and missing keys take the defaults
//! below. Values are validated eagerly, before the filter is constructed.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::validation::ConfigError;
use crate::RouterError;

/// The only classifier task currently supported.
pub const TEXT_CLASSIFICATION: &str = "text-classification";

// ── Default value functions ────────────────────────────────────────────

/// Default random threshold: every query is hard.
fn default_random_threshold() -> f64 {
    0.0
}

/// Default classifier model id.
fn default_classifier_model() -> String {
    "routellm/bert".to_string()
}

/// Default classifier task.
fn default_task() -> String {
    TEXT_CLASSIFICATION.to_string()
}

/// Default truncation length in characters.
fn default_max_length() -> usize {
    512
}

/// Default classifier decision threshold.
fn default_classifier_threshold() -> f64 {
    0.5
}

/// Default classifier request timeout: 30 s.
fn default_classifier_timeout_ms() -> u64 {
    30_000
}

// ── Parameter decoding ─────────────────────────────────────────────────

/// Deserialize a filter's free-form parameter table into its typed config.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidParams`] if a recognized key has the wrong type.
pub fn from_params<T: DeserializeOwned>(
    filter: &str,
    params: &Map<String, Value>,
) -> Result<T, ConfigError> {
    serde_json::from_value(Value::Object(params.clone())).map_err(|source| {
        ConfigError::InvalidParams {
            filter: filter.to_string(),
            source,
        }
    })
}

fn check_unit_interval(field: &str, value: f64) -> Result<(), RouterError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidField {
            field: field.to_string(),
            value: value.to_string(),
            reason: "must be in [0.0, 1.0]".into(),
        }
        .into())
    }
}

// ── RandomFilterConfig ─────────────────────────────────────────────────

/// Parameters of the random filter.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RandomFilterConfig {
    /// Probability of keeping a query on the edge.
    ///
    /// Range: `0.0..=1.0`.  Default: `0.0`.
    #[serde(default = "default_random_threshold")]
    pub threshold: f64,
}

impl Default for RandomFilterConfig {
    fn default() -> Self {
        Self {
            threshold: default_random_threshold(),
        }
    }
}

impl RandomFilterConfig {
    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// [`RouterError::Config`] when `threshold` is outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), RouterError> {
        check_unit_interval("filter.threshold", self.threshold)
    }
}

// ── ClassifierFilterConfig ─────────────────────────────────────────────

/// Parameters of the classifier filter.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifierFilterConfig {
    /// Classifier model id.
    #[serde(default = "default_classifier_model")]
    pub model: String,

    /// Classifier task; only `"text-classification"` is supported.
    #[serde(default = "default_task")]
    pub task: String,

    /// Maximum query length in characters before classification.
    ///
    /// Must be `>= 1`.  Default: `512`.
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Minimum normalized `LABEL_0` score for a query to stay on the edge.
    ///
    /// Range: `0.0..=1.0`.  Default: `0.5`.
    #[serde(default = "default_classifier_threshold")]
    pub threshold: f64,

    /// Classification endpoint. `None` uses the hosted inference API for `model`.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Bearer token for the endpoint. Falls back to `HF_TOKEN`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    /// Request timeout in milliseconds.
    #[serde(default = "default_classifier_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ClassifierFilterConfig {
    fn default() -> Self {
        Self {
            model: default_classifier_model(),
            task: default_task(),
            max_length: default_max_length(),
            threshold: default_classifier_threshold(),
            endpoint: None,
            api_token: None,
            timeout_ms: default_classifier_timeout_ms(),
        }
    }
}

impl ClassifierFilterConfig {
    /// Check the task and value ranges.
    ///
    /// # Errors
    ///
    /// - [`RouterError::UnsupportedTask`] for any task but `text-classification`.
    /// - [`RouterError::Config`] for an out-of-range `threshold` or a zero
    ///   `max_length` / `timeout_ms`.
    pub fn validate(&self) -> Result<(), RouterError> {
        if self.task != TEXT_CLASSIFICATION {
            return Err(RouterError::UnsupportedTask(self.task.clone()));
        }
        check_unit_interval("filter.threshold", self.threshold)?;
        if self.max_length == 0 {
            return Err(ConfigError::InvalidField {
                field: "filter.max_length".into(),
                value: "0".into(),
                reason: "must be at least 1".into(),
            }
            .into());
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::InvalidField {
                field: "filter.timeout_ms".into(),
                value: "0".into(),
                reason: "timeout must be at least 1ms".into(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_random_defaults_to_zero_threshold() {
        let cfg: RandomFilterConfig = from_params("random", &Map::new()).expect("test: decode");
        assert!(cfg.threshold.abs() < f64::EPSILON);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_random_threshold_out_of_range_is_rejected() {
        let cfg = RandomFilterConfig { threshold: 1.5 };
        let err = cfg.validate().expect_err("test: must fail");
        assert!(err.is_configuration());
        assert!(err.to_string().contains("filter.threshold"));
    }

    #[test]
    fn test_classifier_defaults() {
        let cfg: ClassifierFilterConfig =
            from_params("classifier", &Map::new()).expect("test: decode");
        assert_eq!(cfg, ClassifierFilterConfig::default());
        assert_eq!(cfg.model, "routellm/bert");
        assert_eq!(cfg.task, "text-classification");
        assert_eq!(cfg.max_length, 512);
        assert!((cfg.threshold - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let cfg: ClassifierFilterConfig = from_params(
            "classifier",
            &params(json!({"threshold": 0.7, "edgemodel": "ignored", "foo": 1})),
        )
        .expect("test: decode");
        assert!((cfg.threshold - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_wrong_type_is_invalid_params() {
        let result: Result<RandomFilterConfig, _> =
            from_params("random", &params(json!({"threshold": "high"})));
        assert!(matches!(result, Err(ConfigError::InvalidParams { .. })));
    }

    #[test]
    fn test_unsupported_task_is_rejected() {
        let cfg = ClassifierFilterConfig {
            task: "token-classification".into(),
            ..ClassifierFilterConfig::default()
        };
        match cfg.validate() {
            Err(RouterError::UnsupportedTask(task)) => assert_eq!(task, "token-classification"),
            other => panic!("expected UnsupportedTask, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_max_length_is_rejected() {
        let cfg = ClassifierFilterConfig {
            max_length: 0,
            ..ClassifierFilterConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
