//! Capability registry and per-agent capability sets.

use super::{
    CapabilityDescriptor, CapabilityProvider, DocumentTextProvider, ImageNormalizeProvider,
    JobKeywordProvider, PageFetchProvider, RepositoryProvider, WebSearchProvider,
};
use crate::config::CapabilitiesConfig;
use crate::error::ApiError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Closed set of providers bound to one agent.
#[derive(Clone, Default)]
pub struct CapabilitySet {
    providers: BTreeMap<String, Arc<dyn CapabilityProvider>>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, provider: Arc<dyn CapabilityProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn with(mut self, provider: Arc<dyn CapabilityProvider>) -> Self {
        self.insert(provider);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn CapabilityProvider>> {
        self.providers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn descriptors(&self) -> Vec<CapabilityDescriptor> {
        self.providers.values().map(|p| p.descriptor()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.providers.keys()).finish()
    }
}

/// Every provider available to a run, keyed by name.
///
/// Built once from configuration; agents take closed subsets via [`bind`](Self::bind).
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    providers: BTreeMap<String, Arc<dyn CapabilityProvider>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the built-in providers.
    pub fn from_config(config: &CapabilitiesConfig) -> Result<Self, ApiError> {
        let mut registry = Self::new();
        registry.register(Arc::new(WebSearchProvider::from_config(&config.search)?));
        registry.register(Arc::new(PageFetchProvider::from_config(&config.fetch)?));
        registry.register(Arc::new(RepositoryProvider::from_config(&config.github)?));
        registry.register(Arc::new(DocumentTextProvider::from_config(&config.documents)));
        registry.register(Arc::new(ImageNormalizeProvider::from_config(&config.image)));
        registry.register(Arc::new(JobKeywordProvider::from_config(&config.keywords)));
        Ok(registry)
    }

    /// Register or replace a provider under its own name.
    pub fn register(&mut self, provider: Arc<dyn CapabilityProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn CapabilityProvider>> {
        self.providers.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    /// Build a capability set from provider names; unknown names are a configuration error.
    pub fn bind<S: AsRef<str>>(&self, names: &[S]) -> Result<CapabilitySet, ApiError> {
        let mut set = CapabilitySet::new();
        for name in names {
            let name = name.as_ref();
            let provider = self.providers.get(name).ok_or_else(|| {
                ApiError::ConfigError(format!(
                    "Unknown capability '{}' (available: {})",
                    name,
                    self.providers.keys().cloned().collect::<Vec<_>>().join(", ")
                ))
            })?;
            set.insert(Arc::clone(provider));
        }
        Ok(set)
    }
}
