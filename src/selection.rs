//! Truncation selection over the combined parent and offspring populations.

use crate::ensemble::{get_unique_ensembles, Ensemble};
use crate::error::{FitError, Result};
use crate::stats::ScoreSummary;
use crate::target::Target;
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// Which population a ranked ensemble came from, with its index there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Origin {
    Parent(usize),
    Offspring(usize),
}

/// Statistics of one [`select_best_half`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionStats {
    /// All `2N` candidates, best first.
    pub ranking: Vec<(Origin, f64)>,
    /// Survivors that came from the offspring.
    pub from_offspring: usize,
    /// Fraction of survivors inherited from the parents, in `[0, 1]`.
    pub survival_ratio: f64,
    /// Distinct component sets among the survivors.
    pub unique: usize,
    /// Grand-total score summary of the survivors.
    pub total: ScoreSummary,
    /// Per-target score summary of the survivors.
    pub per_target: BTreeMap<String, ScoreSummary>,
}

/// Keeps the best `N` of `N` parents and `N` offspring.
///
/// An ensemble's score is its total fitness summed over `targets`; lower is
/// better. Candidates are ranked with a stable sort, so ties keep parents
/// ahead of offspring and lower indices ahead of higher ones. The survivors
/// are returned best first.
///
/// Every ensemble must be scored against every target. Unscored ensembles
/// are reported with their combined index (`0..N` parents, `N..2N`
/// offspring).
#[instrument(skip_all, name = "select_best_half", fields(ensembles = parents.len()))]
pub fn select_best_half(
    parents: Vec<Ensemble>,
    offspring: Vec<Ensemble>,
    targets: &[Target],
) -> Result<(Vec<Ensemble>, SelectionStats)> {
    let n = parents.len();
    if n == 0 {
        return Err(FitError::EmptyPopulation);
    }
    if offspring.len() != n {
        return Err(FitError::PopulationSizeMismatch {
            parents: n,
            offspring: offspring.len(),
        });
    }

    let parent_scores = target_scores(&parents, targets, 0)?;
    let offspring_scores = target_scores(&offspring, targets, n)?;

    let mut ranking: Vec<(Origin, f64)> = parent_scores
        .iter()
        .enumerate()
        .map(|(i, s)| (Origin::Parent(i), s.iter().sum()))
        .chain(
            offspring_scores
                .iter()
                .enumerate()
                .map(|(i, s)| (Origin::Offspring(i), s.iter().sum())),
        )
        .collect();
    ranking.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut parents: Vec<Option<Ensemble>> = parents.into_iter().map(Some).collect();
    let mut offspring: Vec<Option<Ensemble>> = offspring.into_iter().map(Some).collect();

    let mut survivors = Vec::with_capacity(n);
    let mut totals = Vec::with_capacity(n);
    let mut per_target: Vec<Vec<f64>> = vec![Vec::with_capacity(n); targets.len()];
    let mut from_offspring = 0;

    for &(origin, score) in ranking.iter().take(n) {
        let (slot, scores) = match origin {
            Origin::Parent(i) => (&mut parents[i], &parent_scores[i]),
            Origin::Offspring(i) => {
                from_offspring += 1;
                (&mut offspring[i], &offspring_scores[i])
            }
        };
        if let Some(ensemble) = slot.take() {
            survivors.push(ensemble);
        }
        totals.push(score);
        for (column, &s) in per_target.iter_mut().zip(scores) {
            column.push(s);
        }
    }

    let total = ScoreSummary::from_ranked(&totals).ok_or(FitError::EmptyPopulation)?;
    let per_target = targets
        .iter()
        .zip(&per_target)
        .filter_map(|(t, column)| Some((t.name.clone(), ScoreSummary::from_ranked(column)?)))
        .collect();
    let survival_ratio = (n - from_offspring) as f64 / n as f64;
    let unique = get_unique_ensembles(&survivors).len();

    info!(
        best = total.best,
        mean = total.mean,
        survival_ratio,
        unique,
        "Selected best half."
    );

    Ok((
        survivors,
        SelectionStats {
            ranking,
            from_offspring,
            survival_ratio,
            unique,
            total,
            per_target,
        },
    ))
}

/// Per ensemble, its total fitness for each target in order.
fn target_scores(population: &[Ensemble], targets: &[Target], offset: usize) -> Result<Vec<Vec<f64>>> {
    population
        .iter()
        .enumerate()
        .map(|(i, e)| {
            targets
                .iter()
                .map(|t| {
                    e.total_fitness(&t.name).ok_or_else(|| FitError::Unscored {
                        ensemble: offset + i,
                        target: t.name.clone(),
                    })
                })
                .collect()
        })
        .collect()
}
