//! Filter registry and factory.
//!
//! Maps filter names to factory closures. [`FilterRegistry::new`] registers
//! the built-in filters under their snake_case names and their CamelCase
//! aliases; custom filters can be added with [`FilterRegistry::register`].

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::classifier::ClassifierFilter;
use super::config::{from_params, ClassifierFilterConfig, RandomFilterConfig};
use super::filters::{CloudOnlyFilter, EdgeOnlyFilter, RandomFilter, RoutingFilter};
use super::oracle::OracleFilter;
use crate::backend::ModelBackend;
use crate::classifier::ClassifierBackend;
use crate::config::FilterSpec;
use crate::RouterError;

/// In-process handles a filter factory may need.
///
/// These cannot come from a TOML table, so they travel next to it.
#[derive(Clone, Default)]
pub struct FilterContext {
    /// Edge model handle (`edgemodel`).
    pub edge: Option<Arc<dyn ModelBackend>>,
    /// Cloud model handle (`cloudmodel`).
    pub cloud: Option<Arc<dyn ModelBackend>>,
    /// Pre-built classifier. When absent the classifier filter builds an HTTP one.
    pub classifier: Option<Arc<dyn ClassifierBackend>>,
}

impl std::fmt::Debug for FilterContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterContext")
            .field("edge", &self.edge.as_ref().map(|b| b.name().to_string()))
            .field("cloud", &self.cloud.as_ref().map(|b| b.name().to_string()))
            .field("classifier", &self.classifier.as_ref().map(|c| c.name().to_string()))
            .finish()
    }
}

impl FilterContext {
    /// Empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the edge handle.
    pub fn with_edge(mut self, edge: Arc<dyn ModelBackend>) -> Self {
        self.edge = Some(edge);
        self
    }

    /// Attach the cloud handle.
    pub fn with_cloud(mut self, cloud: Arc<dyn ModelBackend>) -> Self {
        self.cloud = Some(cloud);
        self
    }

    /// Attach a classifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn ClassifierBackend>) -> Self {
        self.classifier = Some(classifier);
        self
    }
}

/// Factory function type for creating filters
pub type FilterFactory = Arc<
    dyn Fn(&Map<String, Value>, &FilterContext) -> Result<Box<dyn RoutingFilter>, RouterError>
        + Send
        + Sync,
>;

/// Wrap a closure as a [`FilterFactory`].
pub fn filter_factory<F>(f: F) -> FilterFactory
where
    F: Fn(&Map<String, Value>, &FilterContext) -> Result<Box<dyn RoutingFilter>, RouterError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

/// Registry of routing filter factories.
///
/// # Example
///
/// ```
/// use edge_cloud_router::{FilterContext, FilterRegistry, FilterSpec, RoutingFilter};
///
/// let registry = FilterRegistry::new();
/// let filter = registry
///     .build(&FilterSpec::new("random").with_param("threshold", 0.3), &FilterContext::new())
///     .unwrap();
/// assert_eq!(filter.name(), "random");
/// ```
#[derive(Clone)]
pub struct FilterRegistry {
    factories: HashMap<String, FilterFactory>,
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterRegistry {
    /// Create a registry with the built-in filters.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_builtin();
        registry
    }

    /// Create a registry with no filters.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    fn register_builtin(&mut self) {
        let edge_only = filter_factory(|_, _| Ok(Box::new(EdgeOnlyFilter)));
        self.register_aliases(&["edge_only", "EdgeOnly"], edge_only);

        let cloud_only = filter_factory(|_, _| Ok(Box::new(CloudOnlyFilter)));
        self.register_aliases(&["cloud_only", "CloudOnly"], cloud_only);

        let random = filter_factory(|params, _| {
            let config: RandomFilterConfig = from_params("random", params)?;
            Ok(Box::new(RandomFilter::new(config)?))
        });
        self.register_aliases(&["random", "RandomRouter"], random);

        let classifier = filter_factory(|params, ctx| {
            let config: ClassifierFilterConfig = from_params("classifier", params)?;
            let filter = match &ctx.classifier {
                Some(classifier) => ClassifierFilter::new(config, classifier.clone())?,
                None => ClassifierFilter::from_config(config)?,
            };
            Ok(Box::new(filter))
        });
        self.register_aliases(&["classifier", "BERTRouter"], classifier);

        let oracle = filter_factory(|_, ctx| {
            let edge = ctx.edge.clone().ok_or(RouterError::MissingHandle("edgemodel"))?;
            let cloud = ctx
                .cloud
                .clone()
                .ok_or(RouterError::MissingHandle("cloudmodel"))?;
            Ok(Box::new(OracleFilter::new(edge, cloud)))
        });
        self.register_aliases(&["oracle", "OracleRouter"], oracle);
    }

    fn register_aliases(&mut self, names: &[&str], factory: FilterFactory) {
        for name in names {
            self.register(*name, factory.clone());
        }
    }

    /// Register a factory, replacing any previous one with the same name.
    pub fn register(&mut self, name: impl Into<String>, factory: FilterFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Return `true` if a factory is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Build the filter described by `spec`.
    ///
    /// # Errors
    ///
    /// - [`RouterError::UnknownFilter`] if `spec.kind` is not registered.
    /// - Any configuration error raised by the factory.
    pub fn build(
        &self,
        spec: &FilterSpec,
        ctx: &FilterContext,
    ) -> Result<Box<dyn RoutingFilter>, RouterError> {
        let factory = self
            .factories
            .get(&spec.kind)
            .ok_or_else(|| RouterError::UnknownFilter(spec.kind.clone()))?;
        let filter = factory(&spec.params, ctx)?;
        tracing::info!(kind = %spec.kind, filter = filter.name(), "routing filter built");
        Ok(filter)
    }
}
