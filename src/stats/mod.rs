//! Population statistics and bootstrap uncertainty.
//!
//! # Key Functions
//!
//! - [`ratio_stats`] / [`component_prevalence`]: Component weights and how
//!   often each component appears
//! - [`restraint_stats`]: Best, mean and stdev of each restraint score
//! - [`bootstrap_ratio_errors`]: Per-position ratio mean and stdev under
//!   resampled targets
//! - [`optimization_report`] / [`plugin_state`]: Optimizer status table and
//!   plugin summaries

mod bootstrap;
mod ratios;
mod restraints;
mod summary;

pub use bootstrap::{bootstrap_ratio_errors, ComponentRatio, RatioErrors};
pub use ratios::{component_prevalence, ratio_stats, Prevalence, RatioStats};
pub use restraints::{optimization_report, plugin_state, restraint_stats};
pub use summary::{mean_stdev, ScoreSummary};
