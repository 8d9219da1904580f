//! Local minimizers backed by NLopt (algorithms 3–6).
//!
//! The gradient-based backends get a forward-difference gradient computed
//! from the same budgeted objective, so every difference step counts toward the
//! evaluation budget.

use super::types::{Bounds, Minimizer, Minimum, Objective, OptStatus};
use nlopt::{Algorithm, FailState, Nlopt, SuccessState, Target};
use rand::RngCore;

/// Relative finite-difference step, `sqrt(f64::EPSILON)`.
const FD_STEP: f64 = 1.490_116_119_384_765_6e-8;

/// Algorithm 3: bound-constrained truncated Newton.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundedGradient;

/// Algorithm 4: bound-constrained limited-memory BFGS.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundedQuasiNewton;

/// Algorithm 5: Powell's derivative-free BOBYQA (COBYLA for a single
/// coordinate, which BOBYQA cannot handle).
#[derive(Debug, Clone, Copy, Default)]
pub struct Powell;

/// Algorithm 6: Nelder-Mead downhill simplex.
#[derive(Debug, Clone, Copy, Default)]
pub struct NelderMead;

impl Minimizer for BoundedGradient {
    fn name(&self) -> &'static str {
        "truncated-newton"
    }

    fn minimize(
        &self,
        objective: &mut dyn FnMut(&[f64]) -> f64,
        initial: &[f64],
        bounds: &Bounds,
        tolerance: f64,
        budget: usize,
        _rng: &mut dyn RngCore,
    ) -> Minimum {
        run_local(Algorithm::TNewtonPrecondRestart, true, objective, initial, bounds, tolerance, budget)
    }
}

impl Minimizer for BoundedQuasiNewton {
    fn name(&self) -> &'static str {
        "lbfgs"
    }

    fn minimize(
        &self,
        objective: &mut dyn FnMut(&[f64]) -> f64,
        initial: &[f64],
        bounds: &Bounds,
        tolerance: f64,
        budget: usize,
        _rng: &mut dyn RngCore,
    ) -> Minimum {
        run_local(Algorithm::Lbfgs, true, objective, initial, bounds, tolerance, budget)
    }
}

impl Minimizer for Powell {
    fn name(&self) -> &'static str {
        "bobyqa"
    }

    fn minimize(
        &self,
        objective: &mut dyn FnMut(&[f64]) -> f64,
        initial: &[f64],
        bounds: &Bounds,
        tolerance: f64,
        budget: usize,
        _rng: &mut dyn RngCore,
    ) -> Minimum {
        let algorithm = if initial.len() >= 2 {
            Algorithm::Bobyqa
        } else {
            Algorithm::Cobyla
        };
        run_local(algorithm, false, objective, initial, bounds, tolerance, budget)
    }
}

impl Minimizer for NelderMead {
    fn name(&self) -> &'static str {
        "nelder-mead"
    }

    fn minimize(
        &self,
        objective: &mut dyn FnMut(&[f64]) -> f64,
        initial: &[f64],
        bounds: &Bounds,
        tolerance: f64,
        budget: usize,
        _rng: &mut dyn RngCore,
    ) -> Minimum {
        run_local(Algorithm::Neldermead, false, objective, initial, bounds, tolerance, budget)
    }
}

struct LocalData<'a, 'b> {
    objective: &'b mut Objective<'a>,
    upper: Option<f64>,
    gradient: bool,
}

fn local_objective(x: &[f64], gradient: Option<&mut [f64]>, data: &mut LocalData<'_, '_>) -> f64 {
    let fx = data.objective.eval(x);
    if let Some(grad) = gradient {
        if data.gradient {
            fd_gradient(data.objective, x, fx, data.upper, grad);
        }
    }
    fx
}

/// Forward differences; flips to a backward step where the forward step
/// would cross the upper bound.
fn fd_gradient(obj: &mut Objective<'_>, x: &[f64], fx: f64, upper: Option<f64>, grad: &mut [f64]) {
    let mut shifted = x.to_vec();
    for i in 0..x.len() {
        let mut h = FD_STEP * x[i].abs().max(1.0);
        if upper.is_some_and(|hi| x[i] + h > hi) {
            h = -h;
        }
        shifted[i] = x[i] + h;
        let fp = obj.eval(&shifted);
        grad[i] = if fp.is_finite() && fx.is_finite() {
            (fp - fx) / h
        } else {
            0.0
        };
        shifted[i] = x[i];
    }
}

fn run_local(
    algorithm: Algorithm,
    gradient: bool,
    objective: &mut dyn FnMut(&[f64]) -> f64,
    initial: &[f64],
    bounds: &Bounds,
    tolerance: f64,
    budget: usize,
) -> Minimum {
    let n = initial.len();
    let mut obj = Objective::new(objective, budget);
    let mut x = initial.to_vec();
    bounds.project(&mut x);
    if n == 0 {
        obj.eval(&x);
        return obj.finish(&x, OptStatus::Converged);
    }

    // Each gradient call costs n + 1 evaluations.
    let calls = if gradient { budget / (n + 1) } else { budget }.max(1);

    let status = {
        let data = LocalData {
            objective: &mut obj,
            upper: bounds.upper,
            gradient,
        };
        let mut opt = Nlopt::new(algorithm, n, local_objective, Target::Minimize, data);
        match configure(&mut opt, n, bounds, tolerance, calls) {
            Ok(()) => status_of(opt.optimize(&mut x)),
            Err(_) => OptStatus::Failed,
        }
    };

    // Once the budget is spent the backend only saw +inf, so its own
    // verdict is meaningless.
    let status = if obj.exhausted() {
        OptStatus::EvaluationLimit
    } else {
        status
    };
    obj.finish(&x, status)
}

fn configure<F, T>(
    opt: &mut Nlopt<F, T>,
    n: usize,
    bounds: &Bounds,
    tolerance: f64,
    calls: usize,
) -> Result<(), FailState>
where
    F: nlopt::ObjFn<T>,
{
    if let Some(lo) = bounds.lower {
        opt.set_lower_bounds(&vec![lo; n])?;
    }
    if let Some(hi) = bounds.upper {
        opt.set_upper_bounds(&vec![hi; n])?;
    }
    opt.set_maxeval(u32::try_from(calls).unwrap_or(u32::MAX))?;
    opt.set_xtol_rel(tolerance)?;
    Ok(())
}

fn status_of(result: Result<(SuccessState, f64), (FailState, f64)>) -> OptStatus {
    match result {
        Ok((SuccessState::MaxEvalReached | SuccessState::MaxTimeReached, _)) => {
            OptStatus::EvaluationLimit
        }
        Ok(_) => OptStatus::Converged,
        Err((FailState::RoundoffLimited, _)) => OptStatus::RoundoffLimited,
        Err(_) => OptStatus::Failed,
    }
}
