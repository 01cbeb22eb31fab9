//! Learned-classifier routing filter.
//!
//! The query text is truncated and scored by a [`ClassifierBackend`]. With
//! `s = LABEL_0 / (LABEL_0 + LABEL_1)`, the query stays on the edge iff
//! `s >= threshold`.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use super::config::ClassifierFilterConfig;
use super::filters::RoutingFilter;
use crate::classifier::{ClassifierBackend, HttpClassifier, LabelScore};
use crate::{truncate_chars, Query, RouterError};

/// Label of the easy class.
pub const EASY_LABEL: &str = "LABEL_0";
/// Label of the hard class.
pub const HARD_LABEL: &str = "LABEL_1";

/// Routes by a two-class text classifier.
///
/// # Panics
///
/// This type and its methods never panic.
pub struct ClassifierFilter {
    config: ClassifierFilterConfig,
    classifier: RwLock<Option<Arc<dyn ClassifierBackend>>>,
}

impl std::fmt::Debug for ClassifierFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierFilter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ClassifierFilter {
    /// Build with an injected classifier.
    ///
    /// # Errors
    ///
    /// Any validation error of `config`.
    pub fn new(
        config: ClassifierFilterConfig,
        classifier: Arc<dyn ClassifierBackend>,
    ) -> Result<Self, RouterError> {
        config.validate()?;
        tracing::info!(
            model = %config.model,
            classifier = classifier.name(),
            max_length = config.max_length,
            threshold = config.threshold,
            "classifier filter ready"
        );
        Ok(Self {
            config,
            classifier: RwLock::new(Some(classifier)),
        })
    }

    /// Build with an [`HttpClassifier`] described by `config`.
    ///
    /// # Errors
    ///
    /// Validation errors of `config`, or HTTP client construction failure.
    pub fn from_config(config: ClassifierFilterConfig) -> Result<Self, RouterError> {
        config.validate()?;
        let classifier = HttpClassifier::new(
            config.model.clone(),
            config.endpoint.clone(),
            config.api_token.clone(),
            Duration::from_millis(config.timeout_ms),
        )?;
        Self::new(config, Arc::new(classifier))
    }

    /// Configured parameters.
    pub fn config(&self) -> &ClassifierFilterConfig {
        &self.config
    }

    /// Text handed to the classifier: the query text cut to `max_length` characters.
    pub fn preprocess(&self, query: &Query) -> String {
        truncate_chars(&query.text(), self.config.max_length).to_string()
    }

    /// Turn a label distribution into a hard/easy decision.
    ///
    /// # Errors
    ///
    /// [`RouterError::Classifier`] if either label is missing or a score is
    /// negative or not finite.
    pub fn postprocess(&self, scores: &[LabelScore]) -> Result<bool, RouterError> {
        let easy = label_score(scores, EASY_LABEL)?;
        let hard = label_score(scores, HARD_LABEL)?;

        if easy == 0.0 && hard == 0.0 {
            tracing::warn!("classifier returned zero scores for both labels; routing as hard");
            return Ok(true);
        }

        // easy / (easy + hard), written as a ratio so large scores cannot overflow the sum
        let s = if easy > 0.0 { 1.0 / (1.0 + hard / easy) } else { 0.0 };
        let is_hard = s < self.config.threshold;
        tracing::debug!(score = s, threshold = self.config.threshold, is_hard, "classifier decision");
        Ok(is_hard)
    }

    fn current(&self) -> Result<Arc<dyn ClassifierBackend>, RouterError> {
        self.classifier
            .read()
            .map_err(|_| RouterError::Other("classifier lock poisoned".to_string()))?
            .clone()
            .ok_or(RouterError::ResourceReleased("classifier"))
    }
}

fn label_score(scores: &[LabelScore], label: &str) -> Result<f64, RouterError> {
    let score = scores
        .iter()
        .find(|s| s.label == label)
        .map(|s| s.score)
        .ok_or_else(|| RouterError::Classifier(format!("missing label {label} in output")))?;
    if !score.is_finite() || score < 0.0 {
        return Err(RouterError::Classifier(format!(
            "invalid score {score} for {label}"
        )));
    }
    Ok(score)
}

#[async_trait]
impl RoutingFilter for ClassifierFilter {
    fn name(&self) -> &str {
        "classifier"
    }

    async fn decide(&self, query: &Query) -> Result<bool, RouterError> {
        let classifier = self.current()?;
        let text = self.preprocess(query);
        let scores = classifier.classify(&text).await?;
        self.postprocess(&scores)
    }

    async fn cleanup(&self) -> Result<(), RouterError> {
        let released = self
            .classifier
            .write()
            .map_err(|_| RouterError::Other("classifier lock poisoned".to_string()))?
            .take();
        if released.is_some() {
            tracing::info!(model = %self.config.model, "classifier released");
        }
        Ok(())
    }
}
