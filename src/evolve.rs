//! Evolution operators: crossover and mutation of ensemble compositions.
//!
//! Both operators work in place and never change an ensemble's size. Any
//! ensemble whose composition changes is invalidated for every target.

use crate::config::FitConfig;
use crate::ensemble::Ensemble;
use crate::error::{FitError, Result};
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::BTreeSet;
use tracing::{info, instrument};

/// Where mutation draws replacement components from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MutationSource {
    /// Any component in the pool.
    #[default]
    Pool,
    /// Components present somewhere in the current population.
    Population,
}

/// What one [`evolve`] call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvolveSummary {
    /// Crossovers that exchanged at least one component.
    pub crossovers: usize,
    /// Positions whose component was replaced by a different one.
    pub mutations: usize,
    /// Ensembles whose composition changed.
    pub changed: usize,
}

/// Applies crossover, then mutation, to every ensemble.
///
/// Crossover: with probability `crossover_rate` an ensemble picks a partner
/// uniformly from the population (itself included, which is a no-op) and
/// the two swap their components from a random position to the end.
///
/// Mutation: every position is replaced with probability `mutation_rate` by
/// a component drawn from `pool` or from the population, per
/// `mutation_source`. The population snapshot is taken after crossover.
/// Replacements may duplicate a component already in the ensemble.
#[instrument(skip_all, name = "evolve", fields(ensembles = population.len()))]
pub fn evolve<R: Rng>(
    population: &mut [Ensemble],
    pool: &[String],
    config: &FitConfig,
    rng: &mut R,
) -> Result<EvolveSummary> {
    if population.is_empty() {
        return Err(FitError::EmptyPopulation);
    }

    let n = population.len();
    let mut summary = EvolveSummary::default();
    let mut changed = vec![false; n];

    for i in 0..n {
        if rng.random::<f64>() >= config.crossover_rate {
            continue;
        }
        let j = rng.random_range(0..n);
        if i == j {
            continue;
        }
        let size = population[i].size().min(population[j].size());
        if size == 0 {
            continue;
        }
        let point = rng.random_range(0..size);
        let (a, b) = pair_mut(population, i, j);
        if a.exchange_components(b, point..size) {
            summary.crossovers += 1;
            changed[i] = true;
            changed[j] = true;
        }
    }

    let source: Vec<String> = match config.mutation_source {
        MutationSource::Pool => pool.to_vec(),
        MutationSource::Population => population
            .iter()
            .flat_map(|e| e.component_names().iter().cloned())
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect(),
    };

    if config.mutation_rate > 0.0 {
        if source.is_empty() {
            return Err(FitError::EmptyComponentPool);
        }
        for (ensemble, flag) in population.iter_mut().zip(changed.iter_mut()) {
            for position in 0..ensemble.size() {
                if rng.random::<f64>() >= config.mutation_rate {
                    continue;
                }
                if let Some(name) = source.choose(&mut *rng) {
                    if ensemble.replace_component(position, name) {
                        summary.mutations += 1;
                        *flag = true;
                    }
                }
            }
        }
    }

    summary.changed = changed.iter().filter(|&&c| c).count();
    info!(
        crossovers = summary.crossovers,
        mutations = summary.mutations,
        changed = summary.changed,
        "Evolved ensembles."
    );
    Ok(summary)
}

/// Two distinct mutable elements of a slice.
fn pair_mut<T>(items: &mut [T], i: usize, j: usize) -> (&mut T, &mut T) {
    debug_assert_ne!(i, j);
    if i < j {
        let (left, right) = items.split_at_mut(j);
        (&mut left[i], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(i);
        (&mut right[0], &mut left[j])
    }
}
