//! Per-restraint scores, optimizer status table and plugin summaries.

use super::summary::ScoreSummary;
use crate::ensemble::Ensemble;
use crate::error::{FitError, Result};
use crate::optimize::OptStatus;
use crate::plugin::PluginData;
use crate::target::Target;
use std::collections::BTreeMap;

/// For every restraint type and target, the first ensemble's score with the
/// population mean and standard deviation.
///
/// The population is expected best first, as [`select_best_half`] returns
/// it. Keyed by restraint type, then target name.
///
/// [`select_best_half`]: crate::selection::select_best_half
pub fn restraint_stats(
    targets: &[Target],
    population: &[Ensemble],
) -> Result<BTreeMap<String, BTreeMap<String, ScoreSummary>>> {
    let mut stats: BTreeMap<String, BTreeMap<String, ScoreSummary>> = BTreeMap::new();

    for target in targets {
        for kind in target.restraint_types() {
            let scores = population
                .iter()
                .enumerate()
                .map(|(index, e)| {
                    e.fitness(&target.name)
                        .and_then(|f| f.get(kind))
                        .copied()
                        .ok_or_else(|| FitError::Unscored {
                            ensemble: index,
                            target: target.name.clone(),
                        })
                })
                .collect::<Result<Vec<f64>>>()?;

            if let Some(summary) = ScoreSummary::from_ranked(&scores) {
                stats
                    .entry(kind.to_string())
                    .or_default()
                    .insert(target.name.clone(), summary);
            }
        }
    }
    Ok(stats)
}

/// Per ensemble, the last optimizer status for each target (`None` if the
/// pair has never been optimized).
pub fn optimization_report(
    targets: &[Target],
    population: &[Ensemble],
) -> Vec<BTreeMap<String, Option<OptStatus>>> {
    population
        .iter()
        .map(|e| {
            targets
                .iter()
                .map(|t| (t.name.clone(), e.opt_status(&t.name)))
                .collect()
        })
        .collect()
}

/// Asks every restraint's plugin to summarize the population's plugin
/// state, and returns the messages in target and restraint order.
pub fn plugin_state(targets: &[Target], population: &[Ensemble]) -> Result<Vec<String>> {
    let empty = PluginData::empty();
    let mut messages = Vec::new();

    for target in targets {
        for restraint in &target.restraints {
            let kind = restraint.kind.as_str();
            let target_data = target.plugin_data.get(kind).unwrap_or(&empty);
            let ensembles: Vec<&PluginData> = population
                .iter()
                .map(|e| e.plugin_data(&target.name, kind).unwrap_or(&empty))
                .collect();

            let plugin = restraint.plugin();
            let lines = plugin
                .ensemble_state(restraint, target_data, &ensembles)
                .map_err(|source| FitError::EnsembleState {
                    plugin: plugin.name().to_string(),
                    target: target.name.clone(),
                    restraint: restraint.kind.clone(),
                    source,
                })?;
            messages.extend(lines);
        }
    }
    Ok(messages)
}
