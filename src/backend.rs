//! Model backend abstraction and implementations
//!
//! Provides the [`ModelBackend`] trait and the serving backends an
//! [`EdgeModel`](crate::EdgeModel) or a cloud handle can resolve to:
//! - [`HuggingfaceBackend`]: Hugging Face text-generation-inference server
//! - [`VllmBackend`]: vLLM inference server
//! - [`ApiBackend`]: OpenAI-compatible chat completions API
//! - [`EchoBackend`]: testing/demo backend, not selectable by configuration
//!
//! All HTTP backends are non-streaming, so the reported time-to-first-token
//! equals the full request latency.
//!
//! ## Environment Variables
//!
//! - `OPENAI_API_KEY`: fallback key for [`ApiBackend`] when `api_key` is unset

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cache::ResponseCache;
use crate::config::validation::ConfigError;
use crate::config::BackendConfig;
use crate::{Query, RouterError};

/// Trait for model inference backends
///
/// Implementations must be thread-safe (Send + Sync) for use across tasks.
/// The trait is object-safe to allow dynamic dispatch via `Arc<dyn ModelBackend>`.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Backend name used in logs.
    fn name(&self) -> &str;

    /// Run inference for `query` and return the formatted response.
    async fn predict(&self, query: &Query) -> Result<Response, RouterError>;

    /// Persist any inference cache the backend keeps.
    async fn save_cache(&self) -> Result<(), RouterError> {
        Ok(())
    }

    /// Release backend resources.
    async fn cleanup(&self) -> Result<(), RouterError> {
        Ok(())
    }
}

// ============================================================================
// Response
// ============================================================================

/// Formatted model response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Raw generated text.
    pub completion: String,
    /// Answer extracted from the completion; compared against `gold` by the oracle.
    pub prediction: Option<String>,
    /// Token accounting.
    pub usage: TokenUsage,
    /// Latency measurements.
    pub perf: Perf,
}

/// Token accounting for one response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt.
    pub prompt_tokens: u64,
    /// Tokens generated.
    pub completion_tokens: u64,
    /// Sum of the two.
    pub total_tokens: u64,
}

/// Latency measurements for one response, in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Perf {
    /// Time until the full response was available.
    pub time_to_prediction: f64,
    /// Time until the first generated token was available.
    pub time_to_first_token: f64,
    /// Mean time per generated token.
    pub internal_token_latency: f64,
    /// Generated tokens per second.
    pub throughput: f64,
}

/// Raw generation result before timing is attached.
#[derive(Debug, Clone)]
struct Generation {
    completion: String,
    prompt_tokens: u64,
    completion_tokens: u64,
}

impl Response {
    /// Build a response from a completion and the request latency.
    ///
    /// Token counts fall back to whitespace-delimited word counts when the
    /// server does not report them.
    fn from_generation(generation: Generation, latency: Duration) -> Self {
        let secs = latency.as_secs_f64();
        let n = generation.completion_tokens;
        let (internal_token_latency, throughput) = if n > 0 && secs > 0.0 {
            (secs / n as f64, n as f64 / secs)
        } else {
            (0.0, 0.0)
        };

        let trimmed = generation.completion.trim();
        let prediction = (!trimmed.is_empty()).then(|| trimmed.to_string());

        Self {
            prediction,
            usage: TokenUsage {
                prompt_tokens: generation.prompt_tokens,
                completion_tokens: n,
                total_tokens: generation.prompt_tokens + n,
            },
            perf: Perf {
                time_to_prediction: secs,
                time_to_first_token: secs,
                internal_token_latency,
                throughput,
            },
            completion: generation.completion,
        }
    }
}

fn word_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

// ============================================================================
// Backend registry
// ============================================================================

/// Constructor registered for a [`BackendKind`].
pub type BackendConstructor = fn(&BackendConfig) -> Result<Arc<dyn ModelBackend>, RouterError>;

/// The closed set of serving backends selectable by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Hugging Face text-generation-inference.
    Huggingface,
    /// vLLM server.
    Vllm,
    /// OpenAI-compatible HTTP API.
    Api,
}

impl BackendKind {
    /// Every recognized kind.
    pub const ALL: [BackendKind; 3] = [Self::Huggingface, Self::Vllm, Self::Api];

    /// Configuration name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Huggingface => "huggingface",
            Self::Vllm => "vllm",
            Self::Api => "api",
        }
    }

    /// Constructor for this kind.
    pub fn constructor(self) -> BackendConstructor {
        match self {
            Self::Huggingface => HuggingfaceBackend::shared,
            Self::Vllm => VllmBackend::shared,
            Self::Api => ApiBackend::shared,
        }
    }
}

impl FromStr for BackendKind {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| RouterError::UnsupportedBackend(s.to_string()))
    }
}

/// Resolve `config.backend` and construct the backend.
///
/// # Errors
///
/// - [`RouterError::UnsupportedBackend`] if the kind is not recognized.
/// - Any construction error of the resolved backend.
pub fn build_backend(config: &BackendConfig) -> Result<Arc<dyn ModelBackend>, RouterError> {
    let kind: BackendKind = config.backend.parse()?;
    let backend = (kind.constructor())(config)?;
    tracing::info!(backend = kind.as_str(), model = %config.model, "model backend constructed");
    Ok(backend)
}

/// Save the cache of every backend and release it, in order.
///
/// Every backend is visited even when an earlier one fails. Each failure is
/// logged and the first one is returned.
///
/// # Errors
///
/// The first error raised by any `save_cache` or `cleanup` call.
pub async fn release_backends(backends: &[Arc<dyn ModelBackend>]) -> Result<(), RouterError> {
    let mut first = None;
    for backend in backends {
        let saved = backend.save_cache().await;
        let cleaned = backend.cleanup().await;
        for result in [saved, cleaned] {
            if let Err(e) = result {
                tracing::warn!(backend = backend.name(), error = %e, "backend release failed");
                first.get_or_insert(e);
            }
        }
    }
    first.map_or(Ok(()), Err)
}

// ============================================================================
// Shared HTTP plumbing
// ============================================================================

/// State shared by all HTTP backends.
struct HttpCore {
    client: reqwest::Client,
    url: String,
    config: BackendConfig,
    cache: ResponseCache,
}

impl HttpCore {
    fn new(config: &BackendConfig, default_url: &str) -> Result<Self, RouterError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| RouterError::Other(format!("failed to build HTTP client: {e}")))?;

        let url = config
            .url
            .clone()
            .unwrap_or_else(|| default_url.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            url,
            config: config.clone(),
            cache: ResponseCache::for_config(config),
        })
    }

    /// Prompt text with the optional system prompt prepended.
    fn prompt_with_system(&self, prompt: &str) -> String {
        match &self.config.system_prompt {
            Some(system) => format!("{system}\n\n{prompt}"),
            None => prompt.to_string(),
        }
    }

    /// Answer from cache or run `generate`, recording latency.
    async fn predict<G>(&self, backend: &G, query: &Query) -> Result<Response, RouterError>
    where
        G: Generate + ?Sized,
    {
        let prompt = query.text();
        let key = ResponseCache::key(&self.config, &prompt);

        if self.config.use_cache {
            if let Some(hit) = self.cache.get(&key) {
                tracing::debug!(backend = backend.label(), "response cache hit");
                return Ok(hit);
            }
        }

        let started = Instant::now();
        let generation = backend.generate(&prompt).await?;
        let response = Response::from_generation(generation, started.elapsed());

        if self.config.use_cache {
            self.cache.insert(key, response.clone());
        }
        Ok(response)
    }
}

/// Turn a non-success HTTP response into an inference error carrying the status.
async fn check_status(
    backend: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, RouterError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();
    Err(RouterError::Inference(format!(
        "{backend} error {status}: {error_text}"
    )))
}

#[async_trait]
trait Generate: Send + Sync {
    fn label(&self) -> &'static str;
    async fn generate(&self, prompt: &str) -> Result<Generation, RouterError>;
}

// ============================================================================
// Hugging Face TGI Backend
// ============================================================================

#[derive(Debug, Serialize)]
struct TgiRequest<'a> {
    inputs: &'a str,
    parameters: TgiParameters,
}

#[derive(Debug, Serialize)]
struct TgiParameters {
    max_new_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    repetition_penalty: f32,
    do_sample: bool,
    details: bool,
}

#[derive(Debug, Deserialize)]
struct TgiResponse {
    generated_text: String,
    #[serde(default)]
    details: Option<TgiDetails>,
}

#[derive(Debug, Deserialize)]
struct TgiDetails {
    generated_tokens: u64,
}

/// Hugging Face text-generation-inference backend
///
/// Posts to `{url}/generate`; `url` defaults to `http://localhost:8080`.
pub struct HuggingfaceBackend {
    core: HttpCore,
}

impl HuggingfaceBackend {
    /// Default server URL.
    pub const DEFAULT_URL: &'static str = "http://localhost:8080";

    /// Create a backend from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Other`] if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, RouterError> {
        Ok(Self {
            core: HttpCore::new(config, Self::DEFAULT_URL)?,
        })
    }

    fn shared(config: &BackendConfig) -> Result<Arc<dyn ModelBackend>, RouterError> {
        Ok(Arc::new(Self::new(config)?))
    }
}

#[async_trait]
impl Generate for HuggingfaceBackend {
    fn label(&self) -> &'static str {
        "huggingface"
    }

    async fn generate(&self, prompt: &str) -> Result<Generation, RouterError> {
        let config = &self.core.config;
        let inputs = self.core.prompt_with_system(prompt);
        // TGI rejects temperature == 0 and top_p == 1; both mean "disabled".
        let sampling = config.temperature > 0.0;
        let request = TgiRequest {
            inputs: &inputs,
            parameters: TgiParameters {
                max_new_tokens: config.max_tokens,
                temperature: sampling.then_some(config.temperature),
                top_p: (config.top_p < 1.0).then_some(config.top_p),
                repetition_penalty: config.repetition_penalty,
                do_sample: sampling,
                details: true,
            },
        };

        let response = self
            .core
            .client
            .post(format!("{}/generate", self.core.url))
            .json(&request)
            .send()
            .await
            .map_err(|e| RouterError::Inference(format!("huggingface request failed: {e}")))?;

        let body: TgiResponse = check_status("huggingface", response)
            .await?
            .json()
            .await
            .map_err(|e| RouterError::Inference(format!("Failed to parse response: {e}")))?;

        let completion_tokens = body
            .details
            .map(|d| d.generated_tokens)
            .unwrap_or_else(|| word_count(&body.generated_text));

        Ok(Generation {
            prompt_tokens: word_count(&inputs),
            completion_tokens,
            completion: body.generated_text,
        })
    }
}

#[async_trait]
impl ModelBackend for HuggingfaceBackend {
    fn name(&self) -> &str {
        "huggingface"
    }

    async fn predict(&self, query: &Query) -> Result<Response, RouterError> {
        self.core.predict(self, query).await
    }

    async fn save_cache(&self) -> Result<(), RouterError> {
        self.core.cache.persist().await
    }
}

// ============================================================================
// vLLM Backend
// ============================================================================

#[derive(Debug, Serialize)]
struct VllmRequest<'a> {
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    repetition_penalty: f32,
}

#[derive(Debug, Deserialize)]
struct VllmResponse {
    text: Vec<String>,
}

/// vLLM inference server backend
///
/// Posts to `{url}/generate`; `url` defaults to `http://localhost:8000`.
pub struct VllmBackend {
    core: HttpCore,
}

impl VllmBackend {
    /// Default server URL.
    pub const DEFAULT_URL: &'static str = "http://localhost:8000";

    /// Create a backend from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Other`] if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, RouterError> {
        Ok(Self {
            core: HttpCore::new(config, Self::DEFAULT_URL)?,
        })
    }

    fn shared(config: &BackendConfig) -> Result<Arc<dyn ModelBackend>, RouterError> {
        Ok(Arc::new(Self::new(config)?))
    }
}

#[async_trait]
impl Generate for VllmBackend {
    fn label(&self) -> &'static str {
        "vllm"
    }

    async fn generate(&self, prompt: &str) -> Result<Generation, RouterError> {
        let config = &self.core.config;
        let full_prompt = self.core.prompt_with_system(prompt);
        let request = VllmRequest {
            prompt: &full_prompt,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
            repetition_penalty: config.repetition_penalty,
        };

        let response = self
            .core
            .client
            .post(format!("{}/generate", self.core.url))
            .json(&request)
            .send()
            .await
            .map_err(|e| RouterError::Inference(format!("vLLM request failed: {e}")))?;

        let body: VllmResponse = check_status("vLLM", response)
            .await?
            .json()
            .await
            .map_err(|e| RouterError::Inference(format!("Failed to parse response: {e}")))?;

        let Some(text) = body.text.into_iter().next() else {
            return Err(RouterError::Inference(
                "Empty response from vLLM".to_string(),
            ));
        };

        // The native vLLM endpoint echoes the prompt in front of the output.
        let completion = text
            .strip_prefix(full_prompt.as_str())
            .map(str::to_string)
            .unwrap_or(text);

        Ok(Generation {
            prompt_tokens: word_count(&full_prompt),
            completion_tokens: word_count(&completion),
            completion,
        })
    }
}

#[async_trait]
impl ModelBackend for VllmBackend {
    fn name(&self) -> &str {
        "vllm"
    }

    async fn predict(&self, query: &Query) -> Result<Response, RouterError> {
        self.core.predict(self, query).await
    }

    async fn save_cache(&self) -> Result<(), RouterError> {
        self.core.cache.persist().await
    }
}

// ============================================================================
// OpenAI-compatible API Backend
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Debug, Deserialize)]
struct ChatContent {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

/// OpenAI-compatible chat completions backend
///
/// Posts to `{url}/chat/completions`; `url` defaults to
/// `https://api.openai.com/v1`. The key comes from `api_key` or, failing
/// that, `OPENAI_API_KEY`.
pub struct ApiBackend {
    core: HttpCore,
    api_key: String,
}

impl ApiBackend {
    /// Default API base URL.
    pub const DEFAULT_URL: &'static str = "https://api.openai.com/v1";

    /// Create a backend from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Config`] if no API key is available, so that
    /// misconfiguration surfaces at load time rather than at the first query.
    pub fn new(config: &BackendConfig) -> Result<Self, RouterError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                RouterError::Config(ConfigError::InvalidField {
                    field: "api_key".into(),
                    value: String::new(),
                    reason: "set api_key or OPENAI_API_KEY for the api backend".into(),
                })
            })?;

        Ok(Self {
            core: HttpCore::new(config, Self::DEFAULT_URL)?,
            api_key,
        })
    }

    fn shared(config: &BackendConfig) -> Result<Arc<dyn ModelBackend>, RouterError> {
        Ok(Arc::new(Self::new(config)?))
    }
}

#[async_trait]
impl Generate for ApiBackend {
    fn label(&self) -> &'static str {
        "api"
    }

    async fn generate(&self, prompt: &str) -> Result<Generation, RouterError> {
        let config = &self.core.config;
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &config.system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let request = ChatRequest {
            model: &config.model,
            messages,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
        };

        let response = self
            .core
            .client
            .post(format!("{}/chat/completions", self.core.url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RouterError::Inference(format!("API request failed: {e}")))?;

        let body: ChatResponse = check_status("API", response)
            .await?
            .json()
            .await
            .map_err(|e| RouterError::Inference(format!("Failed to parse response: {e}")))?;

        let Some(choice) = body.choices.into_iter().next() else {
            return Err(RouterError::Inference(
                "No choices in API response".to_string(),
            ));
        };
        let completion = choice.message.content.unwrap_or_default();

        let (prompt_tokens, completion_tokens) = match body.usage {
            Some(usage) => (usage.prompt_tokens, usage.completion_tokens),
            None => (word_count(prompt), word_count(&completion)),
        };

        Ok(Generation {
            completion,
            prompt_tokens,
            completion_tokens,
        })
    }
}

#[async_trait]
impl ModelBackend for ApiBackend {
    fn name(&self) -> &str {
        "api"
    }

    async fn predict(&self, query: &Query) -> Result<Response, RouterError> {
        self.core.predict(self, query).await
    }

    async fn save_cache(&self) -> Result<(), RouterError> {
        self.core.cache.persist().await
    }
}

// ============================================================================
// Echo Backend (Testing)
// ============================================================================

/// Dummy echo backend for testing
///
/// Returns the query text as the completion. Useful for routing smoke tests
/// without real model servers.
pub struct EchoBackend {
    /// Simulated inference delay
    pub delay_ms: u64,
}

impl EchoBackend {
    /// Create an echo backend with a 10 ms delay.
    pub fn new() -> Self {
        Self { delay_ms: 10 }
    }

    /// Create an echo backend with a custom delay.
    pub fn with_delay(delay_ms: u64) -> Self {
        Self { delay_ms }
    }
}

impl Default for EchoBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelBackend for EchoBackend {
    fn name(&self) -> &str {
        "echo"
    }

    async fn predict(&self, query: &Query) -> Result<Response, RouterError> {
        let started = Instant::now();
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;

        let text = query.text().into_owned();
        let generation = Generation {
            prompt_tokens: word_count(&text),
            completion_tokens: word_count(&text),
            completion: text,
        };
        Ok(Response::from_generation(generation, started.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts lifecycle calls and fails them when asked to.
    struct Tracked {
        fail: bool,
        saves: AtomicUsize,
        cleanups: AtomicUsize,
    }

    impl Tracked {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                saves: AtomicUsize::new(0),
                cleanups: AtomicUsize::new(0),
            })
        }

        fn outcome(&self, what: &str) -> Result<(), RouterError> {
            if self.fail {
                Err(RouterError::Other(format!("{what} failed")))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ModelBackend for Tracked {
        fn name(&self) -> &str {
            "tracked"
        }

        async fn predict(&self, _query: &Query) -> Result<Response, RouterError> {
            Err(RouterError::Inference("unused".into()))
        }

        async fn save_cache(&self) -> Result<(), RouterError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.outcome("save")
        }

        async fn cleanup(&self) -> Result<(), RouterError> {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
            self.outcome("cleanup")
        }
    }

    #[tokio::test]
    async fn test_release_backends_visits_all_after_failure() {
        let failing = Tracked::new(true);
        let healthy = Tracked::new(false);
        let backends: Vec<Arc<dyn ModelBackend>> = vec![failing.clone(), healthy.clone()];

        let err = release_backends(&backends).await.expect_err("test: first failure");
        assert!(matches!(err, RouterError::Other(ref m) if m == "save failed"));
        assert_eq!(failing.cleanups.load(Ordering::SeqCst), 1);
        assert_eq!(healthy.saves.load(Ordering::SeqCst), 1);
        assert_eq!(healthy.cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_release_backends_ok_when_all_succeed() {
        let backends: Vec<Arc<dyn ModelBackend>> = vec![Tracked::new(false), Arc::new(EchoBackend::new())];
        assert!(release_backends(&backends).await.is_ok());
    }

    #[test]
    fn test_backend_kind_parses_recognized_names() {
        assert_eq!("huggingface".parse::<BackendKind>().ok(), Some(BackendKind::Huggingface));
        assert_eq!("vllm".parse::<BackendKind>().ok(), Some(BackendKind::Vllm));
        assert_eq!("api".parse::<BackendKind>().ok(), Some(BackendKind::Api));
    }

    #[test]
    fn test_backend_kind_rejects_unknown_name() {
        match "unsupported".parse::<BackendKind>() {
            Err(RouterError::UnsupportedBackend(name)) => assert_eq!(name, "unsupported"),
            other => panic!("expected UnsupportedBackend, got {other:?}"),
        }
    }

    #[test]
    fn test_backend_kind_is_case_sensitive() {
        assert!("HuggingFace".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_build_backend_constructs_each_kind() {
        for kind in BackendKind::ALL {
            let config = BackendConfig::new("m")
                .with_backend(kind.as_str())
                .with_api_key("sk-test");
            let backend = build_backend(&config).expect("test: build");
            assert_eq!(backend.name(), kind.as_str());
        }
    }

    #[test]
    fn test_response_from_generation_computes_perf() {
        let generation = Generation {
            completion: "  B  ".into(),
            prompt_tokens: 10,
            completion_tokens: 4,
        };
        let r = Response::from_generation(generation, Duration::from_secs(2));
        assert_eq!(r.prediction.as_deref(), Some("B"));
        assert_eq!(r.usage.total_tokens, 14);
        assert!((r.perf.time_to_first_token - 2.0).abs() < 1e-9);
        assert!((r.perf.internal_token_latency - 0.5).abs() < 1e-9);
        assert!((r.perf.throughput - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_response_from_empty_generation_has_no_prediction() {
        let generation = Generation {
            completion: "   ".into(),
            prompt_tokens: 3,
            completion_tokens: 0,
        };
        let r = Response::from_generation(generation, Duration::from_millis(5));
        assert!(r.prediction.is_none());
        assert!(r.perf.throughput.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_echo_backend() {
        let backend = EchoBackend::with_delay(1);
        let result = backend.predict(&Query::new("hello world")).await.expect("test: echo");
        assert_eq!(result.completion, "hello world");
        assert_eq!(result.prediction.as_deref(), Some("hello world"));
        assert!(result.perf.time_to_first_token > 0.0);
    }
}
