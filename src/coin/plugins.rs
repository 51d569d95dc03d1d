//! Named session coiners configured under `PlugIn`
//!
//! Plugins are registered by name when the [`Coiner`](super::Coiner) is
//! built and looked up per session; there is no dynamic loading.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use super::{CoinContext, SessionUnit, SessionWork};
use crate::error::CoinError;

/// Something that can coin one session into the bids folder
#[async_trait]
pub trait SessionCoiner: Send + Sync {
    fn name(&self) -> &str;

    /// Convert what this coiner understands in `session`, adding any
    /// demographic fields to `work.personals`
    async fn coin(
        &self,
        ctx: &CoinContext<'_>,
        session: &SessionUnit,
        work: &mut SessionWork,
    ) -> Result<(), CoinError>;
}

#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, Arc<dyn SessionCoiner>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a coiner under its own name, replacing an earlier one
    pub fn register(&mut self, plugin: Arc<dyn SessionCoiner>) {
        self.plugins.insert(plugin.name().to_string(), plugin);
    }

    pub fn with(mut self, plugin: Arc<dyn SessionCoiner>) -> Self {
        self.register(plugin);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SessionCoiner>> {
        self.plugins.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.plugins.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    #[async_trait]
    impl SessionCoiner for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn coin(
            &self,
            _ctx: &CoinContext<'_>,
            _session: &SessionUnit,
            work: &mut SessionWork,
        ) -> Result<(), CoinError> {
            work.personals.set("plugin", self.0);
            Ok(())
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = PluginRegistry::new()
            .with(Arc::new(Named("physio")))
            .with(Arc::new(Named("eyetracker")));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["eyetracker", "physio"]);
        assert!(registry.contains("physio"));
        assert_eq!(registry.get("physio").unwrap().name(), "physio");
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = PluginRegistry::new();
        registry.register(Arc::new(Named("physio")));
        registry.register(Arc::new(Named("physio")));
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
    }
}
