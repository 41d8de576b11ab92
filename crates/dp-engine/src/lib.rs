//! # dp-engine
//!
//! Experiment designer for the DOE pipeline.
//!
//! The [`ExperimentDesigner`] alternates between generating a design sheet
//! for the current factor settings and evaluating the measured responses:
//! a screening round narrows the factors to the neighbourhood of the best
//! run, optimization rounds fit a response surface and move the design
//! towards its predicted optimum until the optimum sits well inside the
//! design.

mod designer;
mod evaluate;
mod history;

pub use designer::{ExperimentDesigner, DEFAULT_DEGREE, DEFAULT_TOL};
pub use evaluate::{
    best_run, evaluate_optimization, evaluate_screening, recenter, Recentering,
};
pub use history::RoundRecord;

pub use dp_design::{Design, DesignMatrix};
pub use dp_types::{
    DesignSheet, DesignerConfig, DpError, DpResult, OptimizationResult, Phase, ResponseSheet,
};
