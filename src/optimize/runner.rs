//! The ratio-optimization pass over a population.

use super::config::RatioOptimizer;
use super::types::{Minimizer, OptStatus};
use crate::component::ComponentLibrary;
use crate::ensemble::{normalized_ratios, uniform_ratios, CacheState, Ensemble};
use crate::error::{FitError, Result};
use crate::plugin::PluginData;
use crate::progress::{Progress, ProgressReporter};
use crate::target::Target;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Counts of one [`optimize_ratios`] pass, over (ensemble, target) pairs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeSummary {
    /// Pairs whose backend reported success.
    pub optimized: usize,
    /// Pairs already converged and left alone.
    pub skipped: usize,
    /// Pairs whose backend did not converge.
    pub failed: usize,
}

enum Outcome {
    Skipped,
    Ran(OptStatus),
}

/// Fits the ratio vector of every (ensemble, target) pair that is not
/// cached as converged.
///
/// Each fitted vector is clamped non-negative and normalized to sum to one,
/// and the ensemble's fitness for the target is evaluated at the stored
/// vector. The cache state becomes [`CacheState::Converged`] on success,
/// [`CacheState::Failed`] otherwise, and stays [`CacheState::Stale`] when
/// `settings.force` is set.
///
/// Ensembles are independent; with the `parallel` feature and
/// `settings.parallel` they are fitted on the rayon pool. The result does
/// not depend on the thread count since every ensemble gets its own seed
/// drawn from `rng` up front.
#[instrument(skip_all, name = "optimize_ratios", fields(algorithm = ?settings.algorithm, ensembles = population.len()))]
pub fn optimize_ratios<R: Rng>(
    settings: &RatioOptimizer,
    population: &mut [Ensemble],
    targets: &[Target],
    library: &ComponentLibrary,
    rng: &mut R,
    reporter: &ProgressReporter<'_>,
) -> Result<OptimizeSummary> {
    settings.validate()?;
    let minimizer = settings.algorithm.minimizer();
    let mut summary = OptimizeSummary::default();

    reporter.report(Progress::TaskStart {
        total_steps: (targets.len() * population.len()) as u64,
    });

    for target in targets {
        let seeds: Vec<u64> = (0..population.len()).map(|_| rng.random()).collect();
        let outcomes = run_target(
            settings,
            minimizer.as_ref(),
            population,
            &seeds,
            target,
            library,
            reporter,
        );

        for outcome in outcomes {
            match outcome? {
                Outcome::Skipped => summary.skipped += 1,
                Outcome::Ran(status) if status.is_success() => summary.optimized += 1,
                Outcome::Ran(_) => summary.failed += 1,
            }
        }
    }

    reporter.report(Progress::TaskFinish);
    info!(
        optimized = summary.optimized,
        skipped = summary.skipped,
        failed = summary.failed,
        "Optimized ensemble ratios."
    );
    Ok(summary)
}

fn run_target(
    settings: &RatioOptimizer,
    minimizer: &dyn Minimizer,
    population: &mut [Ensemble],
    seeds: &[u64],
    target: &Target,
    library: &ComponentLibrary,
    reporter: &ProgressReporter<'_>,
) -> Vec<Result<Outcome>> {
    let task = |(index, (ensemble, &seed)): (usize, (&mut Ensemble, &u64))| {
        let outcome = if ensemble.cache_state(&target.name).needs_optimization() {
            optimize_ensemble(settings, minimizer, index, ensemble, target, library, seed)
                .map(Outcome::Ran)
        } else {
            Ok(Outcome::Skipped)
        };
        reporter.report(Progress::TaskIncrement);
        outcome
    };

    #[cfg(feature = "parallel")]
    if settings.parallel {
        return population
            .par_iter_mut()
            .zip(seeds.par_iter())
            .enumerate()
            .map(task)
            .collect();
    }

    population.iter_mut().zip(seeds.iter()).enumerate().map(task).collect()
}

/// Fits one ensemble's ratios for one target and records the outcome.
///
/// Runs regardless of the cache state.
pub(crate) fn optimize_ensemble(
    settings: &RatioOptimizer,
    minimizer: &dyn Minimizer,
    index: usize,
    ensemble: &mut Ensemble,
    target: &Target,
    library: &ComponentLibrary,
    seed: u64,
) -> Result<OptStatus> {
    let name = target.name.as_str();
    let mut attributes: BTreeMap<&str, Vec<&PluginData>> = BTreeMap::new();
    for kind in target.restraint_types() {
        attributes.insert(kind, library.attributes_for(ensemble.component_names(), kind)?);
    }

    let size = ensemble.size();
    let initial = match ensemble.ratios(name) {
        Some(r) if r.len() == size => r.to_vec(),
        _ => uniform_ratios(size),
    };

    // Plugin state is taken out of the ensemble for the duration of the fit
    // so the objective can hand it to the plugins mutably.
    let mut slots = std::mem::take(ensemble.target_plugin_data_mut(name));

    let mut failure: Option<FitError> = None;
    let mut objective = |x: &[f64]| -> f64 {
        if failure.is_some() {
            return f64::INFINITY;
        }
        match evaluate_fitness(index, target, &attributes, &mut slots, x) {
            Ok(scores) => scores.values().sum(),
            Err(err) => {
                failure = Some(err);
                f64::INFINITY
            }
        }
    };

    let mut rng = StdRng::seed_from_u64(seed);
    let minimum = minimizer.minimize(
        &mut objective,
        &initial,
        &settings.algorithm.bounds(),
        settings.precision,
        settings.max_evaluations,
        &mut rng,
    );

    // Nothing is written back to the ensemble unless normalization and
    // scoring both succeed.
    let result = match failure {
        Some(err) => Err(err),
        None => normalized_ratios(index, name, &minimum.x).and_then(|ratios| {
            evaluate_fitness(index, target, &attributes, &mut slots, &ratios)
                .map(|scores| (ratios, scores))
        }),
    };
    *ensemble.target_plugin_data_mut(name) = slots;
    let (ratios, scores) = result?;

    let status = minimum.status;
    let state = if settings.force {
        CacheState::Stale
    } else if status.is_success() {
        CacheState::Converged
    } else {
        CacheState::Failed
    };

    if status.is_success() {
        debug!(
            ensemble = index,
            target = name,
            evaluations = minimum.evaluations,
            value = minimum.value,
            %status,
            "Fitted ratios."
        );
    } else {
        warn!(
            ensemble = index,
            target = name,
            backend = minimizer.name(),
            evaluations = minimum.evaluations,
            %status,
            "Ratio optimization did not converge."
        );
    }

    ensemble.set_ratios(name, ratios);
    ensemble.set_fitness(name, scores);
    ensemble.set_opt_status(name, status);
    ensemble.set_cache_state(name, state);
    Ok(status)
}

/// Per-restraint-type fitness of `ratios` against `target`.
///
/// Restraints of the same type are summed. `slots` holds the ensemble's
/// plugin state for this target, keyed by restraint type.
pub(crate) fn evaluate_fitness(
    index: usize,
    target: &Target,
    attributes: &BTreeMap<&str, Vec<&PluginData>>,
    slots: &mut BTreeMap<String, PluginData>,
    ratios: &[f64],
) -> Result<BTreeMap<String, f64>> {
    let empty = PluginData::empty();
    let mut scores: BTreeMap<String, f64> = BTreeMap::new();

    for restraint in &target.restraints {
        let kind = restraint.kind.as_str();
        let target_data = target.plugin_data.get(kind).unwrap_or(&empty);
        let ensemble_data = slots.entry(restraint.kind.clone()).or_default();
        let attrs = attributes.get(kind).map(Vec::as_slice).unwrap_or(&[]);

        let value = restraint
            .plugin()
            .calc_fitness(restraint, target_data, ensemble_data, attrs, ratios)
            .map_err(|source| FitError::Fitness {
                ensemble: index,
                target: target.name.clone(),
                restraint: restraint.kind.clone(),
                source,
            })?;
        *scores.entry(restraint.kind.clone()).or_insert(0.0) += value;
    }
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::RatioAlgorithm;
    use crate::testing::{components, names, targets};
    use std::sync::atomic::{AtomicU64, Ordering};

    fn population(lists: &[&[&str]]) -> Vec<Ensemble> {
        let t = targets();
        lists.iter().map(|l| Ensemble::new(&t, names(l))).collect()
    }

    fn run(settings: &RatioOptimizer, pop: &mut [Ensemble]) -> OptimizeSummary {
        let mut rng = StdRng::seed_from_u64(17);
        optimize_ratios(
            settings,
            pop,
            &targets(),
            &components(),
            &mut rng,
            &ProgressReporter::new(),
        )
        .unwrap()
    }

    fn assert_normalized(e: &Ensemble) {
        let r = e.ratios("T1").unwrap();
        assert!((r.iter().sum::<f64>() - 1.0).abs() < 1e-9, "{r:?}");
        assert!(r.iter().all(|&v| v >= 0.0), "{r:?}");
    }

    #[test]
    fn test_skip_algorithm_uniform_and_converged() {
        let settings = RatioOptimizer::default().with_algorithm(RatioAlgorithm::Skip);
        let mut pop = population(&[&["A", "B", "C"]]);
        let summary = run(&settings, &mut pop);

        assert_eq!(summary.optimized, 1);
        let r = pop[0].ratios("T1").unwrap();
        assert!(r.iter().all(|&v| (v - 1.0 / 3.0).abs() < 1e-12));
        assert_eq!(pop[0].opt_status("T1"), Some(OptStatus::NotApplicable));
        assert_eq!(pop[0].opt_status("T1").unwrap().to_string(), "N/A");
        assert_eq!(pop[0].cache_state("T1"), CacheState::Converged);
        assert!(pop[0].total_fitness("T1").unwrap() > 0.0);
    }

    #[test]
    fn test_every_backend_leaves_normalized_ratios() {
        for id in 0..=6u8 {
            let settings = RatioOptimizer::default()
                .with_algorithm(RatioAlgorithm::try_from(id).unwrap())
                .with_max_evaluations(400)
                .with_parallel(false);
            let mut pop = population(&[&["A", "B", "C"], &["A", "A", "B"]]);
            run(&settings, &mut pop);
            for e in &pop {
                assert_normalized(e);
                assert!(e.total_fitness("T1").is_some());
                assert!(e.opt_status("T1").is_some());
            }
        }
    }

    #[test]
    fn test_gradient_recovers_mixture() {
        let settings = RatioOptimizer::default()
            .with_precision(1e-8)
            .with_max_evaluations(5_000);
        let mut pop = population(&[&["A", "B", "C"]]);
        run(&settings, &mut pop);

        let r = pop[0].ratios("T1").unwrap();
        assert!((r[0] - 0.7).abs() < 1e-3, "{r:?}");
        assert!((r[1] - 0.3).abs() < 1e-3, "{r:?}");
        assert!(r[2] < 1e-3, "{r:?}");
        assert!(pop[0].total_fitness("T1").unwrap() < 1e-5);
        assert!(pop[0].plugin_data("T1", "PROF").is_some_and(|d| !d.is_empty()));
    }

    #[test]
    fn test_converged_pairs_are_skipped() {
        let settings = RatioOptimizer::default().with_algorithm(RatioAlgorithm::Skip);
        let mut pop = population(&[&["A", "B"], &["B", "C"]]);
        let first = run(&settings, &mut pop);
        assert_eq!(first.optimized, 2);

        let second = run(&settings, &mut pop);
        assert_eq!(second.skipped, 2);
        assert_eq!(second.optimized, 0);

        pop[0].invalidate();
        let third = run(&settings, &mut pop);
        assert_eq!(third.optimized, 1);
        assert_eq!(third.skipped, 1);
    }

    #[test]
    fn test_force_leaves_cache_stale() {
        let settings = RatioOptimizer::default()
            .with_algorithm(RatioAlgorithm::Skip)
            .with_force(true);
        let mut pop = population(&[&["A", "B"]]);
        run(&settings, &mut pop);
        assert_eq!(pop[0].cache_state("T1"), CacheState::Stale);
        assert_eq!(run(&settings, &mut pop).optimized, 1);
    }

    #[test]
    fn test_budget_exhaustion_marks_failed() {
        let settings = RatioOptimizer::default()
            .with_algorithm(RatioAlgorithm::BoundedGradient)
            .with_max_evaluations(2);
        let mut pop = population(&[&["A", "B", "C"]]);
        let summary = run(&settings, &mut pop);
        assert_eq!(summary.failed, 1);
        assert_eq!(pop[0].cache_state("T1"), CacheState::Failed);
        assert_eq!(pop[0].opt_status("T1"), Some(OptStatus::EvaluationLimit));
        assert_normalized(&pop[0]);
    }

    /// Returns an all-zero vector without touching the objective.
    struct Collapse;

    impl Minimizer for Collapse {
        fn name(&self) -> &'static str {
            "collapse"
        }

        fn minimize(
            &self,
            _objective: &mut dyn FnMut(&[f64]) -> f64,
            initial: &[f64],
            _bounds: &crate::optimize::Bounds,
            _tolerance: f64,
            _budget: usize,
            _rng: &mut dyn rand::RngCore,
        ) -> crate::optimize::Minimum {
            crate::optimize::Minimum {
                x: vec![0.0; initial.len()],
                value: 0.0,
                evaluations: 0,
                status: OptStatus::Converged,
            }
        }
    }

    #[test]
    fn test_zero_ratio_sum_leaves_ensemble_untouched() {
        let settings = RatioOptimizer::default().with_algorithm(RatioAlgorithm::Skip);
        let mut pop = population(&[&["A", "B"]]);
        run(&settings, &mut pop);
        let ratios = pop[0].ratios("T1").unwrap().to_vec();
        let fitness = pop[0].total_fitness("T1");
        pop[0].invalidate_target("T1");

        let err = optimize_ensemble(
            &settings,
            &Collapse,
            0,
            &mut pop[0],
            &targets()[0],
            &components(),
            1,
        )
        .unwrap_err();
        assert!(matches!(err, FitError::ZeroRatioSum { ensemble: 0, .. }));
        assert_eq!(pop[0].ratios("T1").unwrap(), ratios.as_slice());
        assert_eq!(pop[0].cache_state("T1"), CacheState::Stale);
        assert_eq!(pop[0].opt_status("T1"), Some(OptStatus::NotApplicable));
        assert!(pop[0].total_fitness("T1").is_none());
        assert!(fitness.is_some());
    }

    #[test]
    fn test_unknown_component_is_an_error() {
        let mut pop = population(&[&["A", "Z"]]);
        let mut rng = StdRng::seed_from_u64(1);
        let err = optimize_ratios(
            &RatioOptimizer::default(),
            &mut pop,
            &targets(),
            &components(),
            &mut rng,
            &ProgressReporter::new(),
        )
        .unwrap_err();
        assert!(matches!(err, FitError::UnknownComponent(n) if n == "Z"));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let lists: &[&[&str]] = &[&["A", "B", "C"], &["B", "C", "C"], &["A", "C", "B"]];
        let base = RatioOptimizer::default().with_algorithm(RatioAlgorithm::LocalizedRandom);

        let mut seq = population(lists);
        run(&base.clone().with_parallel(false), &mut seq);
        let mut par = population(lists);
        run(&base.with_parallel(true), &mut par);

        for (a, b) in seq.iter().zip(&par) {
            assert_eq!(a.ratios("T1"), b.ratios("T1"));
        }
    }

    #[test]
    fn test_progress_events() {
        let increments = AtomicU64::new(0);
        let reporter = ProgressReporter::with_callback(Box::new(|event: Progress| {
            if event == Progress::TaskIncrement {
                increments.fetch_add(1, Ordering::Relaxed);
            }
        }));
        let mut pop = population(&[&["A"], &["B"], &["C"]]);
        let mut rng = StdRng::seed_from_u64(3);
        optimize_ratios(
            &RatioOptimizer::default().with_algorithm(RatioAlgorithm::Skip),
            &mut pop,
            &targets(),
            &components(),
            &mut rng,
            &reporter,
        )
        .unwrap();
        assert_eq!(increments.load(Ordering::Relaxed), 3);
    }
}
