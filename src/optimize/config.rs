//! Ratio optimizer configuration.

use super::local::{BoundedGradient, BoundedQuasiNewton, NelderMead, Powell};
use super::random::{BlindRandomSearch, LocalizedRandomSearch, UniformRatios};
use super::types::{Bounds, Minimizer};
use crate::error::FitError;

/// Numerical backend used to fit ratio vectors.
///
/// The discriminants are the integer ids accepted by [`TryFrom<u8>`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum RatioAlgorithm {
    /// Evaluate once at uniform ratios.
    Skip = 0,
    BlindRandom = 1,
    LocalizedRandom = 2,
    #[default]
    BoundedGradient = 3,
    BoundedQuasiNewton = 4,
    Powell = 5,
    NelderMead = 6,
}

impl RatioAlgorithm {
    /// Integer id of the algorithm.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Builds the backend.
    pub fn minimizer(self) -> Box<dyn Minimizer> {
        match self {
            RatioAlgorithm::Skip => Box::new(UniformRatios),
            RatioAlgorithm::BlindRandom => Box::new(BlindRandomSearch),
            RatioAlgorithm::LocalizedRandom => Box::new(LocalizedRandomSearch::default()),
            RatioAlgorithm::BoundedGradient => Box::new(BoundedGradient),
            RatioAlgorithm::BoundedQuasiNewton => Box::new(BoundedQuasiNewton),
            RatioAlgorithm::Powell => Box::new(Powell),
            RatioAlgorithm::NelderMead => Box::new(NelderMead),
        }
    }

    /// Ratio bounds handed to the backend; `x >= 0` for every algorithm.
    pub fn bounds(self) -> Bounds {
        Bounds::non_negative()
    }
}

impl TryFrom<u8> for RatioAlgorithm {
    type Error = FitError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Ok(match id {
            0 => RatioAlgorithm::Skip,
            1 => RatioAlgorithm::BlindRandom,
            2 => RatioAlgorithm::LocalizedRandom,
            3 => RatioAlgorithm::BoundedGradient,
            4 => RatioAlgorithm::BoundedQuasiNewton,
            5 => RatioAlgorithm::Powell,
            6 => RatioAlgorithm::NelderMead,
            other => return Err(FitError::UnknownAlgorithm(other)),
        })
    }
}

/// Parameters of one ratio-optimization pass.
///
/// ```
/// use ensemble_fit::optimize::{RatioAlgorithm, RatioOptimizer};
///
/// let opt = RatioOptimizer::default()
///     .with_algorithm(RatioAlgorithm::NelderMead)
///     .with_max_evaluations(500)
///     .with_parallel(false);
/// assert_eq!(opt.algorithm.id(), 6);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RatioOptimizer {
    pub algorithm: RatioAlgorithm,

    /// Convergence tolerance handed to the backend (relative `x` tolerance
    /// for the NLopt backends).
    pub precision: f64,

    /// Objective evaluation budget per (ensemble, target).
    pub max_evaluations: usize,

    /// Leave every ensemble stale after optimizing, so the next pass refits
    /// it regardless of convergence.
    pub force: bool,

    /// Fan ensembles out over the rayon pool (needs the `parallel` feature).
    pub parallel: bool,
}

impl Default for RatioOptimizer {
    fn default() -> Self {
        Self {
            algorithm: RatioAlgorithm::default(),
            precision: 1e-4,
            max_evaluations: 1000,
            force: false,
            parallel: true,
        }
    }
}

impl RatioOptimizer {
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

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Validates the parameters.
    pub fn validate(&self) -> Result<(), FitError> {
        if self.max_evaluations == 0 {
            return Err(FitError::Config("max_evaluations must be at least 1".into()));
        }
        if !self.precision.is_finite() {
            return Err(FitError::Config("precision must be finite".into()));
        }
        Ok(())
    }
}
