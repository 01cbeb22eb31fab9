//! Text classifier abstraction.
//!
//! A [`ClassifierBackend`] maps text to a label→score distribution. The
//! routing classifier filter only needs the two labels `LABEL_0` (easy) and
//! `LABEL_1` (hard); any further labels are passed through untouched.
//!
//! ## Environment Variables
//!
//! - `HF_TOKEN`: bearer token for [`HttpClassifier`] when none is configured

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::RouterError;

/// One entry of a classification distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    /// Class label, e.g. `LABEL_0`.
    pub label: String,
    /// Unnormalized score for the label.
    pub score: f64,
}

impl LabelScore {
    /// Build an entry.
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Trait for text classifiers.
#[async_trait]
pub trait ClassifierBackend: Send + Sync {
    /// Classifier name used in logs.
    fn name(&self) -> &str;

    /// Return the score of every label for `text`.
    async fn classify(&self, text: &str) -> Result<Vec<LabelScore>, RouterError>;
}

// ============================================================================
// HTTP classifier
// ============================================================================

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    inputs: &'a str,
    parameters: ClassifyParameters,
}

#[derive(Debug, Serialize)]
struct ClassifyParameters {
    top_k: Option<u32>,
}

/// Inference endpoints return either `[[...]]` or `[...]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassifyResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

/// Hugging Face-style text-classification endpoint.
pub struct HttpClassifier {
    client: reqwest::Client,
    model: String,
    endpoint: String,
    api_token: Option<String>,
}

impl std::fmt::Debug for HttpClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClassifier")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("has_token", &self.api_token.is_some())
            .finish()
    }
}

impl HttpClassifier {
    /// Create a classifier for `model`.
    ///
    /// `endpoint` defaults to the hosted inference API URL for `model`;
    /// `api_token` falls back to `HF_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Other`] if the HTTP client cannot be built.
    pub fn new(
        model: impl Into<String>,
        endpoint: Option<String>,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RouterError> {
        let model = model.into();
        let endpoint = endpoint
            .unwrap_or_else(|| format!("https://api-inference.huggingface.co/models/{model}"));
        let api_token = api_token
            .or_else(|| std::env::var("HF_TOKEN").ok())
            .filter(|t| !t.trim().is_empty());

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RouterError::Other(format!("failed to build HTTP client: {e}")))?;

        tracing::info!(model = %model, endpoint = %endpoint, "text classifier ready");
        Ok(Self {
            client,
            model,
            endpoint,
            api_token,
        })
    }
}

#[async_trait]
impl ClassifierBackend for HttpClassifier {
    fn name(&self) -> &str {
        &self.model
    }

    async fn classify(&self, text: &str) -> Result<Vec<LabelScore>, RouterError> {
        let request = ClassifyRequest {
            inputs: text,
            parameters: ClassifyParameters { top_k: None },
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RouterError::Classifier(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RouterError::Classifier(format!(
                "classifier error {status}: {error_text}"
            )));
        }

        let body: ClassifyResponse = response
            .json()
            .await
            .map_err(|e| RouterError::Classifier(format!("Failed to parse response: {e}")))?;

        Ok(match body {
            ClassifyResponse::Nested(rows) => rows.into_iter().next().unwrap_or_default(),
            ClassifyResponse::Flat(scores) => scores,
        })
    }
}
