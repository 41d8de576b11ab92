//! Linear least-squares solvers.

use nalgebra::{DMatrix, DVector};

use dp_types::{DpError, DpResult};

/// Solves `min ‖A·x − b‖₂` for `x`.
///
/// `a` is `m × n` and `b` has length `m`; the solution has length `n`.
/// Rank-deficient systems must still produce a solution (the minimum-norm
/// one for the default solver).
pub trait LeastSquaresSolver: Send + Sync {
    fn solve(&self, a: &DMatrix<f64>, b: &DVector<f64>) -> DpResult<DVector<f64>>;

    fn name(&self) -> &str;
}

/// SVD pseudo-inverse solver.
///
/// Singular values below `rcond · σ_max` are treated as zero. With
/// `rcond = None` the cut-off is `max(m, n) · ε`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SvdSolver {
    pub rcond: Option<f64>,
}

impl SvdSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rcond(rcond: f64) -> Self {
        Self { rcond: Some(rcond) }
    }
}

impl LeastSquaresSolver for SvdSolver {
    fn solve(&self, a: &DMatrix<f64>, b: &DVector<f64>) -> DpResult<DVector<f64>> {
        if a.nrows() != b.len() {
            return Err(DpError::Numerical(format!(
                "system has {} rows but {} right-hand values",
                a.nrows(),
                b.len()
            )));
        }
        if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
            return Err(DpError::Numerical(
                "least-squares input contains non-finite values".to_string(),
            ));
        }

        let svd = a.clone().svd(true, true);
        let sigma_max = svd.singular_values.max();
        let rcond = self
            .rcond
            .unwrap_or(a.nrows().max(a.ncols()) as f64 * f64::EPSILON);
        svd.solve(b, rcond * sigma_max)
            .map_err(|e| DpError::Numerical(e.to_string()))
    }

    fn name(&self) -> &str {
        "svd"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_fit_of_line() {
        // y = 1 + 2x
        let a = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let b = DVector::from_vec(vec![1.0, 3.0, 5.0]);
        let x = SvdSolver::new().solve(&a, &b).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-10);
        assert!((x[1] - 2.0).abs() < 1e-10);
    }

    #[test]
    fn overdetermined_system_minimizes_residual() {
        let a = DMatrix::from_row_slice(4, 1, &[1.0, 1.0, 1.0, 1.0]);
        let b = DVector::from_vec(vec![1.0, 2.0, 3.0, 6.0]);
        let x = SvdSolver::new().solve(&a, &b).unwrap();
        assert!((x[0] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn rank_deficient_gives_minimum_norm() {
        // Two identical columns: any x0 + x1 = 2 fits, minimum norm is (1, 1).
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let b = DVector::from_vec(vec![2.0, 2.0]);
        let x = SvdSolver::new().solve(&a, &b).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-10);
        assert!((x[1] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn rejects_bad_input() {
        let a = DMatrix::from_row_slice(2, 1, &[1.0, f64::NAN]);
        let b = DVector::from_vec(vec![1.0, 2.0]);
        assert!(matches!(
            SvdSolver::new().solve(&a, &b),
            Err(DpError::Numerical(_))
        ));

        let b = DVector::from_vec(vec![1.0]);
        assert!(SvdSolver::new().solve(&DMatrix::zeros(2, 1), &b).is_err());
    }
}
