//! Ratio optimization.
//!
//! Fits each ensemble's ratio vector to a target by minimizing the summed
//! restraint fitness. The numerical backend is a [`Minimizer`] strategy
//! chosen through [`RatioAlgorithm`].
//!
//! # Key Types
//!
//! - [`RatioOptimizer`]: Algorithm, tolerance, evaluation budget, force flag
//! - [`Minimizer`]: Backend trait, one implementation per algorithm id
//! - [`OptStatus`]: Backend convergence status
//! - [`OptimizeSummary`]: Counts of one [`optimize_ratios`] pass
//!
//! # Backends
//!
//! | id | Backend | Bounds |
//! |----|---------|--------|
//! | 0 | [`UniformRatios`] | n/a |
//! | 1 | [`BlindRandomSearch`] | `x >= 0` |
//! | 2 | [`LocalizedRandomSearch`] | `x >= 0` |
//! | 3 | [`BoundedGradient`] (NLopt truncated Newton) | `x >= 0` |
//! | 4 | [`BoundedQuasiNewton`] (NLopt L-BFGS) | `x >= 0` |
//! | 5 | [`Powell`] (NLopt BOBYQA) | `x >= 0` |
//! | 6 | [`NelderMead`] (NLopt Nelder-Mead) | `x >= 0` |

mod config;
mod local;
mod random;
mod runner;
mod types;

pub use config::{RatioAlgorithm, RatioOptimizer};
pub use local::{BoundedGradient, BoundedQuasiNewton, NelderMead, Powell};
pub use random::{BlindRandomSearch, LocalizedRandomSearch, UniformRatios};
pub use runner::{optimize_ratios, OptimizeSummary};
pub use types::{Bounds, Minimizer, Minimum, OptStatus};

pub(crate) use runner::optimize_ensemble;
