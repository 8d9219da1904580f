//! Genetic-algorithm core for fitting conformational ensembles to
//! experimental restraints.
//!
//! A population of fixed-size ensembles is evolved against one or more
//! targets. Each ensemble is a multiset of component names with, per target,
//! a vector of non-negative ratios summing to one. Scoring is delegated to
//! plugins, one per restraint type.
//!
//! - **Plugins**: the [`Plugin`] contract, its opaque [`PluginData`] blobs
//!   and the type-to-plugin [`PluginRegistry`].
//! - **Targets and components**: parsed restraint blocks ([`Target`]) and
//!   per-component plugin attributes ([`ComponentLibrary`]).
//! - **Ensembles**: construction, composition edits and per-target
//!   optimization caches ([`Ensemble`]).
//! - **Ratio optimization**: seven interchangeable backends selected by a
//!   numeric id ([`optimize::RatioAlgorithm`]) and the population-wide
//!   [`optimize_ratios`] pass.
//! - **Evolution**: crossover and mutation ([`evolve()`]) and truncation
//!   selection ([`select_best_half`]).
//! - **Statistics**: score summaries, component prevalence and bootstrap
//!   ratio uncertainty ([`stats`]).
//!
//! # Example
//!
//! ```
//! use ensemble_fit::optimize::RatioAlgorithm;
//! use ensemble_fit::FitConfig;
//!
//! let config = FitConfig::default()
//!     .with_ensembles(20)
//!     .with_algorithm(RatioAlgorithm::try_from(4u8).unwrap());
//! assert_eq!(config.ratio_optimizer().algorithm, RatioAlgorithm::BoundedQuasiNewton);
//! ```
//!
//! The generation loop itself (parse, generate, optimize, select, report)
//! is left to the caller; this crate provides the primitives.

pub mod component;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod evolve;
pub mod optimize;
pub mod plugin;
pub mod progress;
pub mod selection;
pub mod stats;
pub mod target;

#[cfg(test)]
mod testing;

pub use component::{Component, ComponentLibrary};
pub use config::FitConfig;
pub use ensemble::{get_unique_ensembles, make_ensembles, CacheState, Ensemble, FillMode};
pub use error::{FitError, PluginError, Result};
pub use evolve::{evolve, EvolveSummary, MutationSource};
pub use optimize::{optimize_ratios, OptStatus, RatioOptimizer};
pub use plugin::{Block, Plugin, PluginData, PluginRegistry, Restraint};
pub use progress::{Progress, ProgressReporter};
pub use selection::{select_best_half, Origin, SelectionStats};
pub use stats::bootstrap_ratio_errors;
pub use target::Target;
