use std::collections::HashMap;
use std::sync::Arc;

use super::adapter::PlatformAdapter;
use super::adapters;
use super::apply_flow::ApplyLimits;
use super::site::SiteAdapter;
use super::Platform;
use crate::common::{Pacer, TaskError};

/// Static mapping from platform to adapter, built once at startup.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Platform, Arc<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in site.
    pub fn with_defaults(limits: ApplyLimits, pacer: Pacer) -> Self {
        let mut registry = Self::new();
        for platform in Platform::ALL {
            registry.register(Arc::new(SiteAdapter::new(
                adapters::profile(platform),
                limits,
                pacer.clone(),
            )));
        }
        registry
    }

    /// Replaces any adapter already registered for the same platform.
    pub fn register(&mut self, adapter: Arc<dyn PlatformAdapter>) {
        self.adapters.insert(adapter.platform(), adapter);
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.get(&platform).cloned()
    }

    /// Resolve the raw platform name carried by a task.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn PlatformAdapter>, TaskError> {
        name.parse::<Platform>()
            .ok()
            .and_then(|platform| self.get(platform))
            .ok_or_else(|| TaskError::UnsupportedPlatform(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_every_platform() {
        let registry = AdapterRegistry::with_defaults(ApplyLimits::default(), Pacer::instant());

        assert_eq!(registry.len(), Platform::ALL.len());
        for platform in Platform::ALL {
            assert_eq!(registry.get(platform).unwrap().platform(), platform);
        }
    }

    #[test]
    fn test_resolve_unknown_platform() {
        let registry = AdapterRegistry::with_defaults(ApplyLimits::default(), Pacer::instant());

        let err = registry.resolve("dice").err().unwrap();

        assert_eq!(err.reason(), "unsupported-platform");
        assert!(registry.resolve("LinkedIn").is_ok());
    }

    #[test]
    fn test_empty_registry_rejects_known_platform() {
        let registry = AdapterRegistry::new();
        assert!(matches!(
            registry.resolve("indeed"),
            Err(TaskError::UnsupportedPlatform(name)) if name == "indeed"
        ));
    }
}
