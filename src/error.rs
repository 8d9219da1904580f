//! Error types.
//!
//! [`PluginError`] is what restraint plugins return; [`FitError`] is the
//! crate-level error that wraps it with the context needed to locate the
//! failure (plugin, source, line range, ensemble, target, restraint type).

use std::path::PathBuf;
use thiserror::Error;

/// Error raised by a plugin operation.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("{0}")]
    Message(String),

    #[error("scratch storage at {path:?} is unavailable: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("scratch storage has no entry for key \"{0}\"")]
    MissingKey(String),

    #[error("scratch storage at {0:?} is attached read-only")]
    ReadOnly(PathBuf),
}

impl PluginError {
    /// Convenience constructor for free-form plugin failures.
    pub fn msg(message: impl Into<String>) -> Self {
        PluginError::Message(message.into())
    }
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum FitError {
    #[error(
        "plugin \"{plugin}\" could not create a restraint from \"{source_name}\" lines {line_start}-{line_end}: {source}"
    )]
    RestraintLoad {
        plugin: String,
        source_name: String,
        line_start: usize,
        line_end: usize,
        #[source]
        source: PluginError,
    },

    #[error("plugin \"{plugin}\" could not load attribute for component \"{component}\": {source}")]
    AttributeLoad {
        plugin: String,
        component: String,
        #[source]
        source: PluginError,
    },

    #[error("target \"{0}\" has no NAME block")]
    MissingTargetName(String),

    #[error("restraint on line {line} of \"{source_name}\" does not have a weighting value")]
    MissingWeight { source_name: String, line: usize },

    #[error("no plugin handles restraint type \"{0}\"")]
    UnhandledRestraintType(String),

    #[error("restraint type \"{tag}\" is already handled by plugin \"{existing}\"")]
    DuplicateRestraintType { tag: String, existing: String },

    #[error("fitness evaluation failed for ensemble {ensemble}, target \"{target}\", restraint \"{restraint}\": {source}")]
    Fitness {
        ensemble: usize,
        target: String,
        restraint: String,
        #[source]
        source: PluginError,
    },

    #[error("bootstrap resample failed for target \"{target}\", restraint \"{restraint}\": {source}")]
    Bootstrap {
        target: String,
        restraint: String,
        #[source]
        source: PluginError,
    },

    #[error("plugin \"{plugin}\" could not summarize restraint \"{restraint}\" of target \"{target}\": {source}")]
    EnsembleState {
        plugin: String,
        target: String,
        restraint: String,
        #[source]
        source: PluginError,
    },

    #[error("unknown component \"{0}\"")]
    UnknownComponent(String),

    #[error("component \"{component}\" has no attribute for restraint type \"{restraint}\"")]
    MissingAttribute { component: String, restraint: String },

    #[error("ensemble {ensemble} has no ratio vector or fitness for target \"{target}\"")]
    UnknownTarget { ensemble: usize, target: String },

    #[error("ratio vector of ensemble {ensemble} for target \"{target}\" sums to {sum}")]
    ZeroRatioSum {
        ensemble: usize,
        target: String,
        sum: f64,
    },

    #[error("population is empty")]
    EmptyPopulation,

    #[error("parent and offspring populations differ in size ({parents} vs {offspring})")]
    PopulationSizeMismatch { parents: usize, offspring: usize },

    #[error("ensemble {ensemble} has not been scored against target \"{target}\"")]
    Unscored { ensemble: usize, target: String },

    #[error("composition of ensemble {ensemble} changed during a bootstrap pass")]
    CompositionChanged { ensemble: usize },

    #[error("component pool is empty")]
    EmptyComponentPool,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unknown ratio optimizer algorithm id {0} (expected 0-6)")]
    UnknownAlgorithm(u8),
}

/// Result alias used throughout the crate.
pub type Result<T, E = FitError> = std::result::Result<T, E>;
