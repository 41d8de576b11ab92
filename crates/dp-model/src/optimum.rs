//! Optimum prediction from a fitted response surface.

use tracing::{debug, info};

use dp_types::{not_implemented, Criterion, DesignSheet, DpError, DpResult, FactorSpace};

use crate::lstsq::{LeastSquaresSolver, SvdSolver};
use crate::minimize::{project, Bound, BoundedMinimizer, ProjectedGradient};
use crate::polynomial::PolynomialModel;

/// Elementwise median of each sheet column, averaging the two middle values
/// of even-length columns.
pub fn column_median(sheet: &DesignSheet) -> Vec<f64> {
    (0..sheet.n_cols())
        .map(|i| {
            let mut values = sheet.column_at(i).map(<[f64]>::to_vec).unwrap_or_default();
            values.sort_by(f64::total_cmp);
            let n = values.len();
            match n {
                0 => f64::NAN,
                _ if n % 2 == 1 => values[n / 2],
                _ => (values[n / 2 - 1] + values[n / 2]) / 2.0,
            }
        })
        .collect()
}

/// Affine map between natural units and coded units, where every design
/// column spans `[-1, 1]`.
///
/// The response surface is fitted and searched in coded units so that
/// factors of very different magnitude are equally well resolved.
#[derive(Debug, Clone, PartialEq)]
struct CodedUnits {
    centers: Vec<f64>,
    half_spans: Vec<f64>,
}

impl CodedUnits {
    fn from_sheet(sheet: &DesignSheet) -> Self {
        let (centers, half_spans) = (0..sheet.n_cols())
            .map(|i| {
                let column = sheet.column_at(i).unwrap_or_default();
                let low = column.iter().copied().fold(f64::INFINITY, f64::min);
                let high = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let half = (high - low) / 2.0;
                if half.is_finite() && half > 0.0 {
                    ((high + low) / 2.0, half)
                } else if low.is_finite() {
                    (low, 1.0)
                } else {
                    (0.0, 1.0)
                }
            })
            .unzip();
        Self {
            centers,
            half_spans,
        }
    }

    fn encode(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(self.centers.iter().zip(&self.half_spans))
            .map(|(x, (c, h))| (x - c) / h)
            .collect()
    }

    fn decode(&self, u: &[f64]) -> Vec<f64> {
        u.iter()
            .zip(self.centers.iter().zip(&self.half_spans))
            .map(|(u, (c, h))| c + h * u)
            .collect()
    }

    fn encode_sheet(&self, sheet: &DesignSheet) -> DpResult<DesignSheet> {
        let columns: Vec<Vec<f64>> = (0..sheet.n_cols())
            .map(|i| {
                let (c, h) = (self.centers[i], self.half_spans[i]);
                let column = sheet.column_at(i).unwrap_or_default();
                column.iter().map(|x| (x - c) / h).collect()
            })
            .collect();
        DesignSheet::from_columns(sheet.columns().to_vec(), columns)
    }

    fn bounds(&self, bounds: &[Bound]) -> Vec<Bound> {
        bounds
            .iter()
            .zip(self.centers.iter().zip(&self.half_spans))
            .map(|((low, high), (c, h))| (low.map(|l| (l - c) / h), high.map(|u| (u - c) / h)))
            .collect()
    }
}

/// Fits a polynomial response surface and locates its optimum inside the
/// global factor bounds.
pub struct OptimumPredictor {
    solver: Box<dyn LeastSquaresSolver>,
    minimizer: Box<dyn BoundedMinimizer>,
}

impl Default for OptimumPredictor {
    fn default() -> Self {
        Self::new(Box::new(SvdSolver::new()), Box::new(ProjectedGradient::default()))
    }
}

impl std::fmt::Debug for OptimumPredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimumPredictor")
            .field("solver", &self.solver.name())
            .field("minimizer", &self.minimizer.name())
            .finish()
    }
}

impl OptimumPredictor {
    pub fn new(solver: Box<dyn LeastSquaresSolver>, minimizer: Box<dyn BoundedMinimizer>) -> Self {
        Self { solver, minimizer }
    }

    /// Predicted optimal setting, one value per design sheet column.
    ///
    /// Bounds are the global `min`/`max` of the factor named by each column;
    /// infinite bounds leave that side open. The search starts from the
    /// column medians. Fails with `OptimizationFailed` when the minimizer
    /// does not converge and with `NotImplemented` for target criteria.
    pub fn predict_optimum(
        &self,
        sheet: &DesignSheet,
        response: &[f64],
        criterion: Criterion,
        factors: &FactorSpace,
        degree: usize,
    ) -> DpResult<Vec<f64>> {
        let invert = match criterion {
            Criterion::Maximize => true,
            Criterion::Minimize => false,
            Criterion::Target => return Err(not_implemented!("optimizing towards a target")),
        };

        let bounds = sheet
            .columns()
            .iter()
            .map(|name| {
                let factor = factors.require(name)?;
                let finite = |v: f64| v.is_finite().then_some(v);
                Ok((finite(factor.min()), finite(factor.max())))
            })
            .collect::<DpResult<Vec<Bound>>>()?;

        let mut x0 = column_median(sheet);
        project(&mut x0, &bounds);
        debug!("Starting optimum search from {:?}", x0);

        let coding = CodedUnits::from_sheet(sheet);
        let coded_sheet = coding.encode_sheet(sheet)?;
        let model = PolynomialModel::fit(&coded_sheet, response, degree, self.solver.as_ref())?;
        let coded_bounds = coding.bounds(&bounds);
        let coded_x0 = coding.encode(&x0);
        let objective = |u: &[f64]| model.predict(u, invert);
        let outcome = self.minimizer.minimize(&objective, &coded_x0, &coded_bounds)?;
        if !outcome.success {
            return Err(DpError::OptimizationFailed(outcome.message));
        }
        info!(
            "Optimum search ({}) finished after {} iterations: {}",
            self.minimizer.name(),
            outcome.iterations,
            outcome.message
        );
        let mut optimum = coding.decode(&outcome.x);
        project(&mut optimum, &bounds);
        Ok(optimum)
    }
}
