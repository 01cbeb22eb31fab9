//! Inference response cache.
//!
//! Identical prompts sent with identical generation parameters return the
//! stored [`Response`] without touching the network. The cache can be backed
//! by a JSON file: it is read once at construction and written back by
//! [`ResponseCache::persist`], which model backends call from `save_cache()`.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use dashmap::DashMap;

use crate::backend::Response;
use crate::config::BackendConfig;
use crate::RouterError;

/// Prompt → response cache, optionally persisted to disk.
#[derive(Debug, Default)]
pub struct ResponseCache {
    path: Option<PathBuf>,
    entries: DashMap<String, Response>,
}

impl ResponseCache {
    /// Create an empty cache that lives only in memory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a file-backed cache.
    ///
    /// A missing file starts an empty cache. A file that cannot be read or
    /// parsed is logged and ignored; it will be overwritten on the next
    /// [`persist`](Self::persist).
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<HashMap<String, Response>>(&content) {
                Ok(entries) => {
                    tracing::info!(path = %path.display(), entries = entries.len(), "response cache loaded");
                    entries
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "response cache unreadable, starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "response cache unreadable, starting empty");
                HashMap::new()
            }
        };

        Self {
            path: Some(path),
            entries: entries.into_iter().collect(),
        }
    }

    /// Build the cache for a backend config: file-backed when `cache_path` is set.
    pub fn for_config(config: &BackendConfig) -> Self {
        match &config.cache_path {
            Some(path) => Self::open(path.clone()),
            None => Self::in_memory(),
        }
    }

    /// Cache key for `prompt` under the generation parameters of `config`.
    pub fn key(config: &BackendConfig, prompt: &str) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}",
            config.model,
            config.temperature,
            config.top_p,
            config.repetition_penalty,
            config.max_tokens,
            config.system_prompt.as_deref().unwrap_or_default(),
            prompt
        )
    }

    /// Look up a cached response.
    pub fn get(&self, key: &str) -> Option<Response> {
        let hit = self.entries.get(key).map(|e| e.value().clone());
        tracing::debug!(hit = hit.is_some(), "response cache lookup");
        hit
    }

    /// Store a response.
    pub fn insert(&self, key: String, response: Response) {
        self.entries.insert(key, response);
    }

    /// Number of cached responses.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the cache to its backing file. No-op for in-memory caches.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Other`] if serialization or the write fails.
    pub async fn persist(&self) -> Result<(), RouterError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        // Sorted so the file diffs cleanly between runs.
        let snapshot: BTreeMap<String, Response> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        let body = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| RouterError::Other(format!("response cache serialization failed: {e}")))?;

        tokio::fs::write(path, body).await.map_err(|e| {
            RouterError::Other(format!(
                "failed to write response cache {}: {e}",
                path.display()
            ))
        })?;

        tracing::debug!(path = %path.display(), entries = snapshot.len(), "response cache saved");
        Ok(())
    }
}
