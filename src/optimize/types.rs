//! Core definitions for the ratio minimizers.

use rand::RngCore;
use std::fmt;

/// Convergence status reported by a minimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OptStatus {
    /// The backend has no notion of convergence (uniform ratios, random
    /// search). Treated as success.
    NotApplicable,
    /// Convergence criteria met.
    Converged,
    /// The evaluation budget ran out first.
    EvaluationLimit,
    /// Roundoff errors stopped progress before the tolerance was met.
    RoundoffLimited,
    /// The objective was not finite at the returned point.
    NonFinite,
    /// The backend rejected its arguments or aborted.
    Failed,
}

impl OptStatus {
    /// Numeric status code; `None` for [`NotApplicable`](Self::NotApplicable).
    pub fn code(self) -> Option<u8> {
        match self {
            OptStatus::NotApplicable => None,
            OptStatus::Converged => Some(0),
            OptStatus::EvaluationLimit => Some(1),
            OptStatus::RoundoffLimited => Some(2),
            OptStatus::NonFinite => Some(3),
            OptStatus::Failed => Some(4),
        }
    }

    /// Whether the ratios may be cached as converged.
    pub fn is_success(self) -> bool {
        matches!(self, OptStatus::NotApplicable | OptStatus::Converged)
    }
}

impl fmt::Display for OptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            OptStatus::NotApplicable => "N/A",
            OptStatus::Converged => "converged",
            OptStatus::EvaluationLimit => "maximum function evaluations reached",
            OptStatus::RoundoffLimited => "roundoff errors limited progress",
            OptStatus::NonFinite => "non-finite objective",
            OptStatus::Failed => "optimizer failed",
        };
        f.write_str(text)
    }
}

/// Box bounds applied to every coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl Bounds {
    /// `x_i >= 0`, no upper bound. The bounds used for ratio vectors.
    pub fn non_negative() -> Self {
        Self {
            lower: Some(0.0),
            upper: None,
        }
    }

    /// Clamps `x` into the box in place.
    pub fn project(&self, x: &mut [f64]) {
        for v in x.iter_mut() {
            if let Some(lo) = self.lower {
                if *v < lo || v.is_nan() {
                    *v = lo;
                }
            }
            if let Some(hi) = self.upper {
                if *v > hi {
                    *v = hi;
                }
            }
        }
    }
}

/// Outcome of one minimization.
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    /// Best point found.
    pub x: Vec<f64>,
    /// Objective value at `x`.
    pub value: f64,
    /// Number of objective evaluations spent.
    pub evaluations: usize,
    pub status: OptStatus,
}

/// A numerical minimization backend.
///
/// Implementations must not spend more than `budget` evaluations and must
/// return the best point they evaluated. Bounded backends keep every
/// evaluated point inside `bounds`.
/// Non-finite objective values are treated as `+inf`.
pub trait Minimizer: Send + Sync {
    /// Short backend name for diagnostics.
    fn name(&self) -> &'static str;

    fn minimize(
        &self,
        objective: &mut dyn FnMut(&[f64]) -> f64,
        initial: &[f64],
        bounds: &Bounds,
        tolerance: f64,
        budget: usize,
        rng: &mut dyn RngCore,
    ) -> Minimum;
}

/// Budget-enforcing wrapper around an objective that tracks the best point.
pub(crate) struct Objective<'a> {
    f: &'a mut dyn FnMut(&[f64]) -> f64,
    budget: usize,
    evaluations: usize,
    best_x: Vec<f64>,
    best_value: f64,
}

impl<'a> Objective<'a> {
    pub(crate) fn new(f: &'a mut dyn FnMut(&[f64]) -> f64, budget: usize) -> Self {
        Self {
            f,
            budget: budget.max(1),
            evaluations: 0,
            best_x: Vec::new(),
            best_value: f64::INFINITY,
        }
    }

    /// Evaluates at `x`; returns `+inf` once the budget is spent.
    pub(crate) fn eval(&mut self, x: &[f64]) -> f64 {
        if self.exhausted() {
            return f64::INFINITY;
        }
        self.evaluations += 1;
        let value = (self.f)(x);
        let value = if value.is_nan() { f64::INFINITY } else { value };
        if value < self.best_value || self.best_x.is_empty() {
            self.best_value = value;
            self.best_x = x.to_vec();
        }
        value
    }

    pub(crate) fn exhausted(&self) -> bool {
        self.evaluations >= self.budget
    }

    /// Finishes with the best evaluated point. A non-finite best value
    /// overrides `status`.
    pub(crate) fn finish(self, fallback: &[f64], status: OptStatus) -> Minimum {
        let (x, value) = if self.best_x.is_empty() {
            (fallback.to_vec(), f64::INFINITY)
        } else {
            (self.best_x, self.best_value)
        };
        let status = if value.is_finite() {
            status
        } else {
            OptStatus::NonFinite
        };
        Minimum {
            x,
            value,
            evaluations: self.evaluations,
            status,
        }
    }
}
