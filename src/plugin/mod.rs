//! Restraint plugin contract.
//!
//! Everything restraint-specific lives behind [`Plugin`]: how a restraint is
//! read from a target block, how a component attribute is read, how a
//! resampled (bootstrap) restraint is produced, and how a weighted mixture
//! of attributes is scored against a restraint.
//!
//! # Key Types
//!
//! - [`Plugin`]: The capability interface every restraint handler implements
//! - [`PluginRegistry`]: Resolves a restraint type tag to its handler
//! - [`Restraint`]: One weighted piece of experimental data
//! - [`PluginData`]: Plugin-owned opaque state relayed by the core
//! - [`ScratchStore`]: Optional run-scoped key/value storage for plugins

mod data;
mod registry;
mod scratch;
mod types;

pub use data::PluginData;
pub use registry::PluginRegistry;
pub use scratch::{ScratchStore, ScratchStoreState};
pub use types::{Block, Plugin, Restraint};
