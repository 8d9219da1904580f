//! Bootstrap estimates of fitted-ratio uncertainty.

use super::summary::mean_stdev;
use crate::component::ComponentLibrary;
use crate::ensemble::Ensemble;
use crate::error::{FitError, Result};
use crate::optimize::{optimize_ensemble, RatioOptimizer};
use crate::progress::{Progress, ProgressReporter};
use crate::target::Target;
use rand::Rng;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Mean weight of one ensemble position, with its bootstrap spread.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComponentRatio {
    pub component: String,
    pub mean: f64,
    /// `None` when no resampling was done.
    pub stdev: Option<f64>,
}

/// Per target, one [`ComponentRatio`] per ensemble position.
pub type RatioErrors = BTreeMap<String, Vec<ComponentRatio>>;

/// Estimates ratio uncertainty for every ensemble by refitting against
/// bootstrap-resampled targets.
///
/// With `trials == 0` the current ratios are returned with no stdev.
/// Otherwise each trial resamples every target through its plugins from
/// the ensemble's fitted state, refits a copy of the ensemble against the
/// resamples, and records the ratios; mean and stdev are taken per
/// position over the trials.
///
/// The population is not modified. A trial that changes the copy's
/// composition is an error.
#[instrument(skip_all, name = "bootstrap_ratio_errors", fields(trials = trials, ensembles = population.len()))]
pub fn bootstrap_ratio_errors<R: Rng>(
    trials: usize,
    settings: &RatioOptimizer,
    population: &[Ensemble],
    targets: &[Target],
    library: &ComponentLibrary,
    rng: &mut R,
    reporter: &ProgressReporter<'_>,
) -> Result<Vec<RatioErrors>> {
    settings.validate()?;
    let minimizer = settings.algorithm.minimizer();
    let mut results = Vec::with_capacity(population.len());

    for (index, ensemble) in population.iter().enumerate() {
        reporter.report(Progress::Message(format!(
            "Bootstrapping ensemble {} of {}",
            index + 1,
            population.len()
        )));

        let mut samples: BTreeMap<&str, Vec<Vec<f64>>> = BTreeMap::new();
        if trials == 0 {
            for target in targets {
                let ratios = current_ratios(index, ensemble, target)?;
                samples.entry(&target.name).or_default().push(ratios);
            }
        }

        for trial in 0..trials {
            let mut copy = ensemble.clone();
            for target in targets {
                let resampled = target.make_bootstrap(ensemble, &mut *rng)?;
                copy.invalidate_target(&target.name);
                let status = optimize_ensemble(
                    settings,
                    minimizer.as_ref(),
                    index,
                    &mut copy,
                    &resampled,
                    library,
                    rng.random(),
                )?;
                debug!(ensemble = index, trial, target = %target.name, %status, "Bootstrap refit.");

                if copy.component_names() != ensemble.component_names() {
                    return Err(FitError::CompositionChanged { ensemble: index });
                }
                let ratios = current_ratios(index, &copy, target)?;
                samples.entry(&target.name).or_default().push(ratios);
            }
        }

        let errors = samples
            .into_iter()
            .map(|(target, rows)| {
                let summary = ensemble
                    .component_names()
                    .iter()
                    .enumerate()
                    .map(|(i, name)| {
                        let column: Vec<f64> = rows.iter().filter_map(|r| r.get(i).copied()).collect();
                        let (mean, stdev) = mean_stdev(&column).unwrap_or((f64::NAN, f64::NAN));
                        ComponentRatio {
                            component: name.clone(),
                            mean,
                            stdev: (trials > 0).then_some(stdev),
                        }
                    })
                    .collect();
                (target.to_string(), summary)
            })
            .collect();
        results.push(errors);
    }

    Ok(results)
}

fn current_ratios(index: usize, ensemble: &Ensemble, target: &Target) -> Result<Vec<f64>> {
    ensemble
        .ratios(&target.name)
        .map(<[f64]>::to_vec)
        .ok_or_else(|| FitError::UnknownTarget {
            ensemble: index,
            target: target.name.clone(),
        })
}
