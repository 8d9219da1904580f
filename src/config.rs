//! Run configuration.
//!
//! [`FitConfig`] gathers every option the GA primitives consume: population
//! shape, evolution rates, the ratio optimizer and its budget, bootstrap
//! trials and the reporting threshold. Besides [`evolve`](crate::evolve())
//! and [`ratio_optimizer`](FitConfig::ratio_optimizer), the options reach
//! the primitives through [`FitConfig::rng`],
//! [`FitConfig::initial_population`], [`FitConfig::bootstrap`] and
//! [`FitConfig::prevalence`].

use crate::component::ComponentLibrary;
use crate::ensemble::{make_ensembles, Ensemble, FillMode};
use crate::error::{FitError, Result};
use crate::evolve::MutationSource;
use crate::optimize::{RatioAlgorithm, RatioOptimizer};
use crate::progress::ProgressReporter;
use crate::stats::{bootstrap_ratio_errors, component_prevalence, Prevalence, RatioErrors, RatioStats};
use crate::target::Target;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

/// Configuration of an ensemble fit.
///
/// # Defaults
///
/// ```
/// use ensemble_fit::FitConfig;
///
/// let config = FitConfig::default();
/// assert_eq!(config.ensembles, 100);
/// assert_eq!(config.ensemble_size, 3);
/// assert_eq!(config.algorithm.id(), 3);
/// ```
///
/// # Builder Pattern
///
/// ```
/// use ensemble_fit::{FitConfig, MutationSource};
/// use ensemble_fit::optimize::RatioAlgorithm;
///
/// let config = FitConfig::default()
///     .with_ensembles(50)
///     .with_mutation_source(MutationSource::Population)
///     .with_algorithm(RatioAlgorithm::NelderMead)
///     .with_bootstrap_trials(20)
///     .with_seed(7);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FitConfig {
    /// Number of ensembles in the population.
    pub ensembles: usize,

    /// Components per ensemble.
    pub ensemble_size: usize,

    /// Probability that an ensemble undergoes crossover (0.0–1.0).
    pub crossover_rate: f64,

    /// Per-position probability of mutation (0.0–1.0).
    pub mutation_rate: f64,

    pub mutation_source: MutationSource,

    /// How generation-0 ensembles are filled.
    pub fill_mode: FillMode,

    /// Ratio optimizer backend.
    pub algorithm: RatioAlgorithm,

    /// Ratio optimizer tolerance.
    pub precision: f64,

    /// Objective evaluations allowed per (ensemble, target) fit.
    pub max_evaluations: usize,

    /// Refit every ensemble on every pass, even when converged.
    pub force_reoptimize: bool,

    /// Bootstrap resamples per ensemble; 0 disables uncertainty estimates.
    pub bootstrap_trials: usize,

    /// Components below this prevalence (percent of the population) are
    /// left out of prevalence reports.
    pub min_prevalence: f64,

    /// Whether to optimize ensembles in parallel using rayon.
    pub parallel: bool,

    /// Random seed for reproducibility.
    ///
    /// `None` uses a random seed.
    pub seed: Option<u64>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            ensembles: 100,
            ensemble_size: 3,
            crossover_rate: 0.8,
            mutation_rate: 0.1,
            mutation_source: MutationSource::default(),
            fill_mode: FillMode::default(),
            algorithm: RatioAlgorithm::default(),
            precision: 1e-4,
            max_evaluations: 1000,
            force_reoptimize: false,
            bootstrap_trials: 0,
            min_prevalence: 0.0,
            parallel: true,
            seed: None,
        }
    }
}

impl FitConfig {
    pub fn with_ensembles(mut self, n: usize) -> Self {
        self.ensembles = n;
        self
    }

    pub fn with_ensemble_size(mut self, n: usize) -> Self {
        self.ensemble_size = n;
        self
    }

    /// Sets the crossover rate.
    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the mutation rate.
    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_mutation_source(mut self, source: MutationSource) -> Self {
        self.mutation_source = source;
        self
    }

    pub fn with_fill_mode(mut self, mode: FillMode) -> Self {
        self.fill_mode = mode;
        self
    }

    pub fn with_algorithm(mut self, algorithm: RatioAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_precision(mut self, precision: f64) -> Self {
        self.precision = precision.max(0.0);
        self
    }

    pub fn with_max_evaluations(mut self, n: usize) -> Self {
        self.max_evaluations = n;
        self
    }

    pub fn with_force_reoptimize(mut self, force: bool) -> Self {
        self.force_reoptimize = force;
        self
    }

    pub fn with_bootstrap_trials(mut self, n: usize) -> Self {
        self.bootstrap_trials = n;
        self
    }

    /// Sets the prevalence threshold, in percent.
    pub fn with_min_prevalence(mut self, percent: f64) -> Self {
        self.min_prevalence = percent.clamp(0.0, 100.0);
        self
    }

    /// Enables or disables parallel optimization.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets the random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// The optimizer settings this configuration implies.
    pub fn ratio_optimizer(&self) -> RatioOptimizer {
        RatioOptimizer {
            algorithm: self.algorithm,
            precision: self.precision,
            max_evaluations: self.max_evaluations,
            force: self.force_reoptimize,
            parallel: self.parallel,
        }
    }

    /// Run generator: seeded from [`seed`](Self::seed), or from a random
    /// seed when unset.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::seed_from_u64(rand::random()),
        }
    }

    /// Generation-0 population of [`ensembles`](Self::ensembles) ensembles
    /// of [`ensemble_size`](Self::ensemble_size) components, filled per
    /// [`fill_mode`](Self::fill_mode).
    pub fn initial_population<R: Rng>(
        &self,
        pool: &[String],
        targets: &[Target],
        rng: &mut R,
    ) -> Result<Vec<Ensemble>> {
        self.validate()?;
        make_ensembles(
            self.ensembles,
            self.ensemble_size,
            pool,
            self.fill_mode,
            targets,
            rng,
        )
    }

    /// [`bootstrap_ratio_errors`] with [`bootstrap_trials`](Self::bootstrap_trials)
    /// resamples and this configuration's optimizer.
    pub fn bootstrap<R: Rng>(
        &self,
        population: &[Ensemble],
        targets: &[Target],
        library: &ComponentLibrary,
        rng: &mut R,
        reporter: &ProgressReporter<'_>,
    ) -> Result<Vec<RatioErrors>> {
        bootstrap_ratio_errors(
            self.bootstrap_trials,
            &self.ratio_optimizer(),
            population,
            targets,
            library,
            rng,
            reporter,
        )
    }

    /// [`component_prevalence`] filtered at [`min_prevalence`](Self::min_prevalence).
    pub fn prevalence(
        &self,
        stats: &RatioStats,
        population_size: usize,
    ) -> BTreeMap<String, Vec<Prevalence>> {
        component_prevalence(stats, population_size, self.min_prevalence)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.ensembles == 0 {
            return Err(FitError::Config("ensembles must be at least 1".into()));
        }
        if self.ensemble_size == 0 {
            return Err(FitError::Config("ensemble_size must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.crossover_rate) {
            return Err(FitError::Config("crossover_rate must be within 0-1".into()));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(FitError::Config("mutation_rate must be within 0-1".into()));
        }
        if !(0.0..=100.0).contains(&self.min_prevalence) {
            return Err(FitError::Config("min_prevalence must be within 0-100".into()));
        }
        self.ratio_optimizer().validate()
    }
}
