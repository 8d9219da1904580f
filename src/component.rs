//! Candidate components and their plugin-owned attributes.

use crate::error::{FitError, Result};
use crate::plugin::{Block, PluginData, PluginRegistry};
use std::collections::BTreeMap;
use tracing::info;

/// A named candidate structure. Its physical data lives in `attributes`,
/// keyed by restraint type and owned by the matching plugin.
#[derive(Debug, Clone)]
pub struct Component {
    pub name: String,
    pub attributes: BTreeMap<String, PluginData>,
}

impl Component {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, kind: impl Into<String>, data: PluginData) -> Self {
        self.attributes.insert(kind.into(), data);
        self
    }
}

/// All components known to a run, addressed by name.
#[derive(Debug, Clone, Default)]
pub struct ComponentLibrary {
    components: BTreeMap<String, Component>,
}

impl ComponentLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a component.
    pub fn insert(&mut self, component: Component) {
        self.components.insert(component.name.clone(), component);
    }

    /// Builds a component from blocks, asking the plugin for each block's
    /// type to fill the attribute.
    pub fn load_component(
        &mut self,
        name: &str,
        blocks: &[Block],
        registry: &PluginRegistry,
    ) -> Result<()> {
        let mut component = Component::new(name);

        for block in blocks {
            let plugin = registry.resolve(&block.kind)?;
            let mut attribute = PluginData::empty();
            let messages = plugin
                .load_attribute(&mut attribute, block)
                .map_err(|source| FitError::AttributeLoad {
                    plugin: plugin.name().to_string(),
                    component: name.to_string(),
                    source,
                })?;
            for message in messages {
                info!(plugin = plugin.name(), component = name, "{message}");
            }
            component.attributes.insert(block.kind.clone(), attribute);
        }

        self.insert(component);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Component> {
        self.components
            .get(name)
            .ok_or_else(|| FitError::UnknownComponent(name.to_string()))
    }

    /// Component names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.components.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Attributes of `names` (in order) for one restraint type.
    pub fn attributes_for(&self, names: &[String], kind: &str) -> Result<Vec<&PluginData>> {
        names
            .iter()
            .map(|name| {
                self.get(name)?
                    .attributes
                    .get(kind)
                    .ok_or_else(|| FitError::MissingAttribute {
                        component: name.clone(),
                        restraint: kind.to_string(),
                    })
            })
            .collect()
    }
}
