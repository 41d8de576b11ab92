//! # dp-model
//!
//! Response modelling for the DOE pipeline.
//!
//! Provides Derringer–Suich desirability functions, polynomial response
//! models fitted by least squares, a bounded local minimizer and the optimum
//! predictor that ties them together. The numerical primitives sit behind
//! the [`LeastSquaresSolver`] and [`BoundedMinimizer`] traits.

mod desirability;
mod lstsq;
mod minimize;
mod optimum;
mod polynomial;

pub use desirability::{build_desirabilities, Desirability};
pub use lstsq::{LeastSquaresSolver, SvdSolver};
pub use minimize::{Bound, BoundedMinimizer, MinimizeOutcome, ProjectedGradient};
pub use optimum::{column_median, OptimumPredictor};
pub use polynomial::{combinations_with_replacement, feature_terms, PolynomialModel};
