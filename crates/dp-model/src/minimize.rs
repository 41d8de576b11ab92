//! Bounded local minimization.

use serde::{Deserialize, Serialize};

use dp_types::{validation_error, DpResult};

/// Lower and upper bound of one coordinate; `None` means unbounded.
pub type Bound = (Option<f64>, Option<f64>);

/// Outcome of a minimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimizeOutcome {
    pub x: Vec<f64>,
    pub fun: f64,
    pub success: bool,
    pub message: String,
    pub iterations: usize,
}

/// Local minimizer of a scalar function inside box bounds.
///
/// `bounds` has one entry per coordinate of `x0`. The returned point always
/// lies inside the bounds; `success` is false when the method gave up.
pub trait BoundedMinimizer: Send + Sync {
    fn minimize(
        &self,
        objective: &dyn Fn(&[f64]) -> f64,
        x0: &[f64],
        bounds: &[Bound],
    ) -> DpResult<MinimizeOutcome>;

    fn name(&self) -> &str;
}

/// Clamp `x` into `bounds` coordinate-wise.
pub(crate) fn project(x: &mut [f64], bounds: &[Bound]) {
    for (value, (low, high)) in x.iter_mut().zip(bounds) {
        if let Some(low) = low {
            *value = value.max(*low);
        }
        if let Some(high) = high {
            *value = value.min(*high);
        }
    }
}

/// Projected gradient descent with Armijo backtracking.
///
/// Gradients are central finite differences. Stops successfully when the
/// projected gradient falls below `pgtol`, or when the relative decrease of
/// the objective falls below `ftol` while the projected gradient is below
/// `sqrt(pgtol)`. Coordinates should be of comparable scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedGradient {
    pub max_iter: usize,
    /// Tolerance on the infinity norm of the projected gradient step,
    /// relative to `max(|f|, 1)`.
    pub pgtol: f64,
    /// Tolerance on `(f_k − f_{k+1}) / max(|f_k|, |f_{k+1}|, 1)`.
    pub ftol: f64,
    /// Relative finite-difference step.
    pub fd_step: f64,
}

impl Default for ProjectedGradient {
    fn default() -> Self {
        Self {
            max_iter: 15_000,
            pgtol: 1e-8,
            ftol: 1e7 * f64::EPSILON,
            fd_step: 1e-6,
        }
    }
}

impl ProjectedGradient {
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tolerances(mut self, pgtol: f64, ftol: f64) -> Self {
        self.pgtol = pgtol;
        self.ftol = ftol;
        self
    }

    fn gradient(&self, objective: &dyn Fn(&[f64]) -> f64, x: &[f64]) -> Vec<f64> {
        let mut shifted = x.to_vec();
        (0..x.len())
            .map(|i| {
                let h = self.fd_step * x[i].abs().max(1.0);
                shifted[i] = x[i] + h;
                let forward = objective(&shifted);
                shifted[i] = x[i] - h;
                let backward = objective(&shifted);
                shifted[i] = x[i];
                (forward - backward) / (2.0 * h)
            })
            .collect()
    }
}

const ARMIJO_C: f64 = 1e-4;
const MIN_STEP: f64 = 1e-20;
const MAX_STEP: f64 = 1e10;

impl BoundedMinimizer for ProjectedGradient {
    fn minimize(
        &self,
        objective: &dyn Fn(&[f64]) -> f64,
        x0: &[f64],
        bounds: &[Bound],
    ) -> DpResult<MinimizeOutcome> {
        if x0.len() != bounds.len() {
            return Err(validation_error!(
                "{} bounds for {} coordinates",
                bounds.len(),
                x0.len()
            ));
        }
        if let Some((low, high)) = bounds
            .iter()
            .filter_map(|(l, h)| l.zip(*h))
            .find(|(l, h)| l > h)
        {
            return Err(validation_error!("empty bound interval [{}, {}]", low, high));
        }

        let mut x = x0.to_vec();
        project(&mut x, bounds);
        let mut fx = objective(&x);
        let outcome = |x: Vec<f64>, fun: f64, success: bool, message: &str, iterations| {
            Ok(MinimizeOutcome {
                x,
                fun,
                success,
                message: message.to_string(),
                iterations,
            })
        };
        if !fx.is_finite() {
            return outcome(x, fx, false, "objective is not finite at the start point", 0);
        }

        let mut step = 1.0;
        for iteration in 1..=self.max_iter {
            let grad = self.gradient(objective, &x);

            let mut unit = x.iter().zip(&grad).map(|(xi, gi)| xi - gi).collect::<Vec<_>>();
            project(&mut unit, bounds);
            let pg_norm = unit
                .iter()
                .zip(&x)
                .map(|(u, xi)| (u - xi).abs())
                .fold(0.0, f64::max);
            if pg_norm <= self.pgtol * fx.abs().max(1.0) {
                return outcome(x, fx, true, "projected gradient below tolerance", iteration);
            }

            // Backtrack along the projected path until the Armijo condition holds.
            let accepted = loop {
                let mut candidate: Vec<f64> =
                    x.iter().zip(&grad).map(|(xi, gi)| xi - step * gi).collect();
                project(&mut candidate, bounds);
                let decrease: f64 = grad
                    .iter()
                    .zip(candidate.iter().zip(&x))
                    .map(|(g, (c, xi))| g * (c - xi))
                    .sum();
                let f_candidate = objective(&candidate);
                if f_candidate.is_finite() && f_candidate <= fx + ARMIJO_C * decrease {
                    break Some((candidate, f_candidate));
                }
                step *= 0.5;
                if step < MIN_STEP {
                    break None;
                }
            };
            let Some((x_next, f_next)) = accepted else {
                return outcome(
                    x,
                    fx,
                    false,
                    "line search could not decrease the objective",
                    iteration,
                );
            };

            let reduction = (fx - f_next) / fx.abs().max(f_next.abs()).max(1.0);
            let scale = fx.abs().max(1.0);
            x = x_next;
            fx = f_next;
            // A stalled objective only counts as converged near a stationary point.
            if reduction <= self.ftol && pg_norm <= self.pgtol.sqrt() * scale {
                return outcome(
                    x,
                    fx,
                    true,
                    "relative reduction of objective below tolerance",
                    iteration,
                );
            }
            step = (step * 2.0).min(MAX_STEP);
        }

        outcome(x, fx, false, "iteration limit reached", self.max_iter)
    }

    fn name(&self) -> &str {
        "projected-gradient"
    }
}
