//! Evaluation-only and stochastic backends (algorithms 0–2).
//!
//! None of these report convergence; their status is always
//! [`OptStatus::NotApplicable`] unless the objective is non-finite.

use super::types::{Bounds, Minimizer, Minimum, Objective, OptStatus};
use crate::ensemble::uniform_ratios;
use rand::{Rng, RngCore};

/// Consecutive insignificant samples, per dimension, before a random
/// search stops early.
const STALL_PER_DIM: usize = 10;

/// Algorithm 0: no optimization, a single evaluation at `[1/n; n]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformRatios;

impl Minimizer for UniformRatios {
    fn name(&self) -> &'static str {
        "uniform"
    }

    fn minimize(
        &self,
        objective: &mut dyn FnMut(&[f64]) -> f64,
        initial: &[f64],
        _bounds: &Bounds,
        _tolerance: f64,
        budget: usize,
        _rng: &mut dyn RngCore,
    ) -> Minimum {
        let x = uniform_ratios(initial.len());
        let mut obj = Objective::new(objective, budget);
        obj.eval(&x);
        obj.finish(&x, OptStatus::NotApplicable)
    }
}

/// Algorithm 1: blind random search.
///
/// Samples points uniformly on the ratio simplex and keeps the best one.
/// Stops when the budget is spent or after a long run of samples that
/// improve the best value by less than `tolerance` (relative).
#[derive(Debug, Clone, Copy, Default)]
pub struct BlindRandomSearch;

impl Minimizer for BlindRandomSearch {
    fn name(&self) -> &'static str {
        "blind-random"
    }

    fn minimize(
        &self,
        objective: &mut dyn FnMut(&[f64]) -> f64,
        initial: &[f64],
        bounds: &Bounds,
        tolerance: f64,
        budget: usize,
        rng: &mut dyn RngCore,
    ) -> Minimum {
        let n = initial.len();
        let mut obj = Objective::new(objective, budget);

        let mut start = initial.to_vec();
        bounds.project(&mut start);
        let mut best = obj.eval(&start);

        let stall_limit = STALL_PER_DIM * n.max(1);
        let mut stall = 0usize;
        let mut candidate = vec![0.0; n];

        while !obj.exhausted() && stall < stall_limit {
            for c in candidate.iter_mut() {
                // Exponential spacings give a uniform draw on the simplex.
                *c = -(1.0 - rng.random::<f64>()).ln();
            }
            let sum: f64 = candidate.iter().sum();
            if sum > 0.0 {
                candidate.iter_mut().for_each(|c| *c /= sum);
            }
            bounds.project(&mut candidate);

            let value = obj.eval(&candidate);
            if significant(best, value, tolerance) {
                stall = 0;
            } else {
                stall += 1;
            }
            best = best.min(value);
        }

        obj.finish(initial, OptStatus::NotApplicable)
    }
}

/// Algorithm 2: localized random search.
///
/// Perturbs the best point found so far by a uniform step in every
/// coordinate. The step radius halves after a run of failed perturbations;
/// the search stops when the radius drops below `tolerance` or the budget
/// is spent.
#[derive(Debug, Clone, Copy)]
pub struct LocalizedRandomSearch {
    /// Starting step radius.
    pub initial_step: f64,
}

impl Default for LocalizedRandomSearch {
    fn default() -> Self {
        Self { initial_step: 0.25 }
    }
}

impl Minimizer for LocalizedRandomSearch {
    fn name(&self) -> &'static str {
        "localized-random"
    }

    fn minimize(
        &self,
        objective: &mut dyn FnMut(&[f64]) -> f64,
        initial: &[f64],
        bounds: &Bounds,
        tolerance: f64,
        budget: usize,
        rng: &mut dyn RngCore,
    ) -> Minimum {
        let n = initial.len();
        let mut obj = Objective::new(objective, budget);

        let mut x = initial.to_vec();
        bounds.project(&mut x);
        let mut fx = obj.eval(&x);

        let patience = 2 * n + 5;
        let min_step = tolerance.max(f64::EPSILON);
        let mut step = self.initial_step;
        let mut failures = 0usize;
        let mut candidate = vec![0.0; n];

        while !obj.exhausted() && step >= min_step {
            for (c, &xi) in candidate.iter_mut().zip(&x) {
                *c = xi + rng.random_range(-step..=step);
            }
            bounds.project(&mut candidate);

            let value = obj.eval(&candidate);
            if value < fx {
                x.copy_from_slice(&candidate);
                fx = value;
                failures = 0;
            } else {
                failures += 1;
                if failures >= patience {
                    step *= 0.5;
                    failures = 0;
                }
            }
        }

        obj.finish(initial, OptStatus::NotApplicable)
    }
}

/// Relative improvement of `new` over `old` reaches `tolerance`.
fn significant(old: f64, new: f64, tolerance: f64) -> bool {
    if new >= old {
        return false;
    }
    if !old.is_finite() {
        return true;
    }
    (old - new) / old.abs().max(f64::MIN_POSITIVE) >= tolerance
}
