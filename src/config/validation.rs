//! Configuration validation engine.
//!
//! ## Responsibility
//! Validate semantic constraints on a parsed [`RouterConfig`] that cannot
//! be expressed through the type system alone (range checks, non-empty
//! identifiers, recognized backend names).
//!
//! ## Guarantees
//! - Validation collects *all* errors before returning (no short-circuit)
//! - Error messages include the field path and the invalid value
//!
//! ## NOT Responsible For
//! - Parsing TOML (that belongs to `loader`)
//! - Filter parameter ranges (each filter validates its own typed config)

use super::{BackendConfig, RouterConfig};
use crate::backend::BackendKind;

/// Errors arising from configuration parsing, validation, or I/O.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parsing failed.
    #[error("Parse error in {file}: {source}")]
    Parse {
        /// Path of the file that failed to parse.
        file: String,
        /// Underlying TOML deserialization error.
        #[source]
        source: toml::de::Error,
    },

    /// One or more semantic validation rules failed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A specific field has an out-of-range or contradictory value.
    #[error("Field '{field}' has invalid value {value}: {reason}")]
    InvalidField {
        /// Dot-separated field path (e.g., "edge.temperature").
        field: String,
        /// String representation of the invalid value.
        value: String,
        /// Human-readable explanation of the constraint.
        reason: String,
    },

    /// A filter's parameter table could not be deserialized into its typed config.
    #[error("Invalid parameters for filter '{filter}': {source}")]
    InvalidParams {
        /// Registry key of the filter.
        filter: String,
        /// Underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },

    /// File I/O error.
    #[error("IO error reading {file}: {source}")]
    Io {
        /// Path of the file that could not be read.
        file: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Validate all semantic constraints on a [`RouterConfig`].
///
/// # Returns
///
/// - `Ok(())` if all constraints pass.
/// - `Err(Vec<ConfigError>)` with every violation found.
///
/// # Panics
///
/// This function never panics.
pub fn validate(config: &RouterConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    validate_backend("edge", &config.edge, &mut errors);
    validate_backend("cloud", &config.cloud, &mut errors);

    // ── Filter kind non-empty ────────────────────────────────────────
    if config.filter.kind.trim().is_empty() {
        errors.push(ConfigError::InvalidField {
            field: "filter.kind".into(),
            value: String::new(),
            reason: "filter kind must not be empty".into(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate one backend section, appending violations to `errors`.
fn validate_backend(section: &str, backend: &BackendConfig, errors: &mut Vec<ConfigError>) {
    // ── Model name non-empty ─────────────────────────────────────────
    if backend.model.trim().is_empty() {
        errors.push(ConfigError::InvalidField {
            field: format!("{section}.model"),
            value: String::new(),
            reason: "model name must not be empty".into(),
        });
    }

    // ── Backend kind recognized ──────────────────────────────────────
    if backend.backend.parse::<BackendKind>().is_err() {
        errors.push(ConfigError::InvalidField {
            field: format!("{section}.backend"),
            value: backend.backend.clone(),
            reason: "must be one of 'huggingface', 'vllm', 'api'".into(),
        });
    }

    // ── Sampling parameters ──────────────────────────────────────────
    if !(0.0..=2.0).contains(&backend.temperature) {
        errors.push(ConfigError::InvalidField {
            field: format!("{section}.temperature"),
            value: backend.temperature.to_string(),
            reason: "must be between 0.0 and 2.0".into(),
        });
    }

    if backend.top_p.is_nan() || backend.top_p <= 0.0 || backend.top_p > 1.0 {
        errors.push(ConfigError::InvalidField {
            field: format!("{section}.top_p"),
            value: backend.top_p.to_string(),
            reason: "must be in (0.0, 1.0]".into(),
        });
    }

    if !backend.repetition_penalty.is_finite() || backend.repetition_penalty <= 0.0 {
        errors.push(ConfigError::InvalidField {
            field: format!("{section}.repetition_penalty"),
            value: backend.repetition_penalty.to_string(),
            reason: "must be a positive finite number".into(),
        });
    }

    if backend.max_tokens == 0 {
        errors.push(ConfigError::InvalidField {
            field: format!("{section}.max_tokens"),
            value: "0".into(),
            reason: "must be at least 1".into(),
        });
    }

    if backend.timeout_ms == 0 {
        errors.push(ConfigError::InvalidField {
            field: format!("{section}.timeout_ms"),
            value: "0".into(),
            reason: "timeout must be at least 1ms".into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FilterSpec, ObservabilityConfig};

    fn valid_config() -> RouterConfig {
        RouterConfig {
            edge: BackendConfig::new("Qwen/Qwen2.5-1.5B-Instruct"),
            cloud: BackendConfig::new("gpt-4o-mini").with_backend("api"),
            filter: FilterSpec::new("edge_only"),
            observability: ObservabilityConfig::default(),
        }
    }

    fn field_errors(config: &RouterConfig) -> Vec<String> {
        match validate(config) {
            Ok(()) => Vec::new(),
            Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_empty_model_fails() {
        let mut cfg = valid_config();
        cfg.edge.model = "  ".into();
        let errors = field_errors(&cfg);
        assert!(errors.iter().any(|e| e.contains("edge.model")));
    }

    #[test]
    fn test_unknown_backend_fails_with_name() {
        let mut cfg = valid_config();
        cfg.cloud.backend = "tensorrt".into();
        let errors = field_errors(&cfg);
        assert!(errors
            .iter()
            .any(|e| e.contains("cloud.backend") && e.contains("tensorrt")));
    }

    #[test]
    fn test_temperature_out_of_range_fails() {
        let mut cfg = valid_config();
        cfg.edge.temperature = 2.5;
        assert!(field_errors(&cfg)
            .iter()
            .any(|e| e.contains("edge.temperature")));
    }

    #[test]
    fn test_top_p_zero_fails() {
        let mut cfg = valid_config();
        cfg.cloud.top_p = 0.0;
        assert!(field_errors(&cfg).iter().any(|e| e.contains("cloud.top_p")));
    }

    #[test]
    fn test_nan_sampling_parameters_fail() {
        let mut cfg = valid_config();
        cfg.edge.top_p = f32::NAN;
        cfg.edge.repetition_penalty = f32::NAN;
        let errors = field_errors(&cfg);
        assert!(errors.iter().any(|e| e.contains("edge.top_p")));
        assert!(errors.iter().any(|e| e.contains("edge.repetition_penalty")));
    }

    #[test]
    fn test_zero_timeout_and_max_tokens_fail() {
        let mut cfg = valid_config();
        cfg.edge.timeout_ms = 0;
        cfg.edge.max_tokens = 0;
        let errors = field_errors(&cfg);
        assert!(errors.iter().any(|e| e.contains("edge.timeout_ms")));
        assert!(errors.iter().any(|e| e.contains("edge.max_tokens")));
    }

    #[test]
    fn test_empty_filter_kind_fails() {
        let mut cfg = valid_config();
        cfg.filter.kind = String::new();
        assert!(field_errors(&cfg).iter().any(|e| e.contains("filter.kind")));
    }

    #[test]
    fn test_collects_multiple_errors() {
        let mut cfg = valid_config();
        cfg.edge.model = String::new();
        cfg.edge.backend = "nope".into();
        cfg.cloud.temperature = -1.0;
        cfg.cloud.repetition_penalty = 0.0;
        let errors = field_errors(&cfg);
        assert!(errors.len() >= 4, "expected >=4 errors, got {errors:?}");
    }
}
