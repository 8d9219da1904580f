//! The restraint plugin contract.
//!
//! A [`Plugin`] handles one or more restraint types. The core resolves a
//! plugin once per restraint when a target is loaded and afterwards calls
//! it through the [`Restraint`] that holds it.

use super::data::PluginData;
use crate::error::PluginError;
use rand::RngCore;
use std::fmt;
use std::sync::Arc;

/// A pre-parsed block of a target or component file.
///
/// `header` holds the whitespace-separated tokens of the block's first line
/// (`header[0]` is the type tag, `header[1]` the weighting for restraints);
/// `content` holds the remaining lines verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    pub kind: String,
    pub header: Vec<String>,
    pub content: Vec<String>,
    pub line_start: usize,
    pub line_end: usize,
}

impl Block {
    /// Builds a block from its header line.
    pub fn new(header_line: &str) -> Self {
        let header: Vec<String> = header_line.split_whitespace().map(str::to_string).collect();
        Self {
            kind: header.first().cloned().unwrap_or_default(),
            header,
            ..Self::default()
        }
    }

    pub fn with_content<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.content = lines.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_lines(mut self, start: usize, end: usize) -> Self {
        self.line_start = start;
        self.line_end = end;
        self
    }
}

/// One weighted piece of experimental data.
///
/// `weight` scales the restraint's contribution to fitness; applying it is
/// the plugin's job. `data` is plugin-opaque.
#[derive(Clone)]
pub struct Restraint {
    pub weight: f64,
    pub kind: String,
    pub data: PluginData,
    plugin: Arc<dyn Plugin>,
}

impl Restraint {
    pub fn new(weight: f64, kind: impl Into<String>, plugin: Arc<dyn Plugin>) -> Self {
        Self {
            weight,
            kind: kind.into(),
            data: PluginData::empty(),
            plugin,
        }
    }

    /// The plugin that created this restraint.
    pub fn plugin(&self) -> &Arc<dyn Plugin> {
        &self.plugin
    }
}

impl fmt::Debug for Restraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Restraint")
            .field("weight", &self.weight)
            .field("kind", &self.kind)
            .field("plugin", &self.plugin.name())
            .field("data", &self.data)
            .finish()
    }
}

/// A restraint-type handler.
///
/// New restraint types are added by implementing this trait and registering
/// the implementation in a [`PluginRegistry`](super::PluginRegistry); the
/// core is never modified.
///
/// Plugins are shared across worker threads during ratio optimization, so
/// they must be `Send + Sync`. Any mutable per-ensemble state belongs in the
/// `ensemble_data` slot passed to [`calc_fitness`](Plugin::calc_fitness).
///
/// Every method that returns messages returns human-readable lines that the
/// caller logs; they carry no semantics.
pub trait Plugin: Send + Sync + fmt::Debug {
    /// Brief name of the plugin.
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// User-facing description.
    fn info(&self) -> &str {
        ""
    }

    /// Restraint type tags this plugin understands (e.g. `"SAXS"`).
    fn types(&self) -> &[String];

    /// Fills `restraint` from a target-file block.
    ///
    /// An error aborts loading of the whole target.
    fn load_restraint(
        &self,
        restraint: &mut Restraint,
        block: &Block,
        target_data: &mut PluginData,
    ) -> Result<Vec<String>, PluginError>;

    /// Fills a component attribute from a component-file block.
    fn load_attribute(
        &self,
        _attribute: &mut PluginData,
        _block: &Block,
    ) -> Result<Vec<String>, PluginError> {
        Ok(Vec::new())
    }

    /// Fills `bootstrap` with a statistically resampled version of `source`,
    /// using the ensemble's accumulated plugin state.
    ///
    /// `bootstrap` starts as a clone of `source`.
    fn load_bootstrap(
        &self,
        bootstrap: &mut Restraint,
        source: &Restraint,
        ensemble_data: &PluginData,
        target_data: &mut PluginData,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<String>, PluginError>;

    /// Scores a weighted combination of component attributes against a
    /// restraint. Lower is better.
    ///
    /// `attributes[i]` belongs to the ensemble's i-th component and is
    /// weighted by `ratios[i]`. `ratios` may be unnormalized while an
    /// optimizer is searching.
    fn calc_fitness(
        &self,
        restraint: &Restraint,
        target_data: &PluginData,
        ensemble_data: &mut PluginData,
        attributes: &[&PluginData],
        ratios: &[f64],
    ) -> Result<f64, PluginError>;

    /// Summarizes the plugin's view of a population for one restraint.
    ///
    /// `ensembles` holds every ensemble's data for the restraint, best first.
    fn ensemble_state(
        &self,
        _restraint: &Restraint,
        _target_data: &PluginData,
        _ensembles: &[&PluginData],
    ) -> Result<Vec<String>, PluginError> {
        Ok(Vec::new())
    }
}
