//! Round outcomes and designer phase.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of the designer state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Coarse generalized subset design over the global factor bounds.
    Screening,
    /// Response-surface designs over the current working ranges.
    Optimization,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Screening => f.write_str("screening"),
            Self::Optimization => f.write_str("optimization"),
        }
    }
}

/// Result of evaluating one round of responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Predicted (or, after screening, best observed) factor settings in
    /// design-sheet column order.
    pub predicted_optimum: Vec<(String, f64)>,
    pub converged: bool,
    /// Tolerance used for the convergence test.
    pub tol: f64,
}

impl OptimizationResult {
    /// Optimum value for one factor.
    pub fn optimum(&self, name: &str) -> Option<f64> {
        self.predicted_optimum
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }
}
