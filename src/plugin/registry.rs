//! Restraint-type tag → plugin lookup.

use super::types::Plugin;
use crate::error::{FitError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Maps each restraint type tag to the single plugin that handles it.
#[derive(Debug, Default, Clone)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
    by_type: BTreeMap<String, usize>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a plugin for every tag it declares.
    ///
    /// Fails without modifying the registry if any tag is already taken.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> Result<()> {
        for tag in plugin.types() {
            if let Some(&idx) = self.by_type.get(tag) {
                return Err(FitError::DuplicateRestraintType {
                    tag: tag.clone(),
                    existing: self.plugins[idx].name().to_string(),
                });
            }
        }

        let idx = self.plugins.len();
        for tag in plugin.types() {
            self.by_type.insert(tag.clone(), idx);
        }
        self.plugins.push(plugin);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Result<Self> {
        self.register(plugin)?;
        Ok(self)
    }

    /// Returns the plugin handling `tag`.
    pub fn resolve(&self, tag: &str) -> Result<&Arc<dyn Plugin>> {
        self.by_type
            .get(tag)
            .map(|&idx| &self.plugins[idx])
            .ok_or_else(|| FitError::UnhandledRestraintType(tag.to_string()))
    }

    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    /// All handled tags, sorted.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.by_type.keys().map(String::as_str)
    }
}
