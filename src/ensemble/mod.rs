//! Ensembles and population construction.
//!
//! # Key Types
//!
//! - [`Ensemble`]: Component composition plus per-target ratios, fitness,
//!   cache state, optimizer status, and plugin state
//! - [`CacheState`]: Per-(ensemble, target) ratio-optimization cache state
//! - [`FillMode`]: How generation-0 ensembles are filled

mod types;

pub use types::{uniform_ratios, CacheState, Ensemble, FillMode};

pub(crate) use types::normalized_ratios;

use crate::error::{FitError, Result};
use crate::target::Target;
use rand::Rng;
use tracing::info;

/// Creates the generation-0 population.
///
/// Every ensemble has `size` components drawn from `pool` according to
/// `fill_mode`, uniform ratios, and stale caches for every target.
pub fn make_ensembles<R: Rng>(
    count: usize,
    size: usize,
    pool: &[String],
    fill_mode: FillMode,
    targets: &[Target],
    rng: &mut R,
) -> Result<Vec<Ensemble>> {
    if pool.is_empty() {
        return Err(FitError::EmptyComponentPool);
    }
    if size == 0 {
        return Err(FitError::Config("ensemble size must be at least 1".into()));
    }
    if count == 0 {
        return Err(FitError::EmptyPopulation);
    }

    let population: Vec<Ensemble> = (0..count)
        .map(|i| match fill_mode {
            FillMode::Random => Ensemble::random(targets, size, pool, &mut *rng),
            FillMode::Uniform => Ensemble::uniform(targets, i, size, pool),
        })
        .collect();

    info!(
        count,
        size,
        pool = pool.len(),
        ?fill_mode,
        "Created initial ensembles."
    );
    Ok(population)
}

/// Keeps the first ensemble of every distinct component set, in order.
///
/// Sets compare by membership only: `[A, B]`, `[B, A]` and `[A, A, B]` are
/// the same set.
pub fn get_unique_ensembles(population: &[Ensemble]) -> Vec<&Ensemble> {
    let mut unique: Vec<&Ensemble> = Vec::new();
    for e in population {
        let set = e.component_set();
        if !unique.iter().any(|seen| seen.component_set() == set) {
            unique.push(e);
        }
    }
    unique
}
