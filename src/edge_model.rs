//! Edge model facade.
//!
//! [`EdgeModel`] owns the configuration of the local model and resolves it
//! to a concrete [`ModelBackend`] on [`load`](EdgeModel::load). Callers see a
//! single `predict` entry point regardless of the serving framework behind it.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::backend::{BackendKind, ModelBackend, Response};
use crate::config::BackendConfig;
use crate::{Query, RouterError};

/// Facade over the configured edge inference backend.
///
/// Lifecycle: `new` → `load` → `predict`* → `cleanup`. `load` may be called
/// again to replace the backend; `cleanup` without a prior `load` is a no-op.
///
/// # Panics
///
/// This type and its methods never panic.
pub struct EdgeModel {
    config: BackendConfig,
    backend: RwLock<Option<Arc<dyn ModelBackend>>>,
}

impl std::fmt::Debug for EdgeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeModel")
            .field("model", &self.config.model)
            .field("backend", &self.config.backend)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl EdgeModel {
    /// Store the configuration. No backend is constructed until [`load`](Self::load).
    pub fn new(config: BackendConfig) -> Self {
        tracing::info!(
            model = %config.model,
            backend = %config.backend,
            "initializing edge model"
        );
        Self {
            config,
            backend: RwLock::new(None),
        }
    }

    /// The configuration this facade was created with.
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Construct the backend named by `config.backend`.
    ///
    /// # Errors
    ///
    /// - [`RouterError::UnsupportedBackend`] naming the offending value.
    /// - Any construction error of the backend itself.
    pub fn load(&self) -> Result<(), RouterError> {
        let kind: BackendKind = self.config.backend.parse()?;
        let backend = (kind.constructor())(&self.config)?;

        let mut slot = self
            .backend
            .write()
            .map_err(|_| RouterError::Other("edge model lock poisoned".to_string()))?;
        *slot = Some(backend);

        tracing::info!(backend = kind.as_str(), model = %self.config.model, "edge model loaded");
        Ok(())
    }

    /// Return `true` once [`load`](Self::load) has succeeded and before [`cleanup`](Self::cleanup).
    pub fn is_loaded(&self) -> bool {
        self.backend.read().map(|b| b.is_some()).unwrap_or(false)
    }

    fn current(&self) -> Option<Arc<dyn ModelBackend>> {
        self.backend.read().ok().and_then(|b| b.clone())
    }
}

#[async_trait]
impl ModelBackend for EdgeModel {
    fn name(&self) -> &str {
        &self.config.model
    }

    /// Delegate to the loaded backend.
    ///
    /// # Errors
    ///
    /// [`RouterError::NotLoaded`] before `load`; otherwise backend errors verbatim.
    async fn predict(&self, query: &Query) -> Result<Response, RouterError> {
        let backend = self.current().ok_or(RouterError::NotLoaded)?;
        backend.predict(query).await
    }

    async fn save_cache(&self) -> Result<(), RouterError> {
        match self.current() {
            Some(backend) => backend.save_cache().await,
            None => Ok(()),
        }
    }

    /// Save the backend's cache, release it, and drop the handle.
    ///
    /// Both steps run even if the first fails; the first error is returned.
    async fn cleanup(&self) -> Result<(), RouterError> {
        let taken = match self.backend.write() {
            Ok(mut slot) => slot.take(),
            Err(_) => return Err(RouterError::Other("edge model lock poisoned".to_string())),
        };
        let Some(backend) = taken else {
            return Ok(());
        };

        let saved = backend.save_cache().await;
        let cleaned = backend.cleanup().await;
        if let Err(e) = &saved {
            tracing::warn!(error = %e, "edge model cache save failed");
        }
        tracing::info!(model = %self.config.model, "edge model released");
        saved.and(cleaned)
    }
}
