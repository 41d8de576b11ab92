//! Design sheet generation for both designer phases.

use tracing::{debug, warn};

use dp_types::{
    not_implemented, validation_error, DesignSheet, DpResult, EdgePolicy, Factor, FactorSpace,
    GsdReduction, Phase, ScreeningSpacing,
};

use crate::families::{CodedMatrix, DesignFamily, MatrixDesigner};
use crate::gsd::gsd;

/// Coded counterpart of a design sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum DesignMatrix {
    /// Screening designs: 0-based level index per factor, plus the sorted
    /// distinct levels of every column in sheet column order.
    Levels {
        indices: Vec<Vec<usize>>,
        levels: Vec<Vec<f64>>,
    },
    /// Optimization designs: coded units, roughly `[-1, 1]`.
    Coded(CodedMatrix),
}

/// A generated design: the natural-unit sheet plus the matrix it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Design {
    pub phase: Phase,
    pub sheet: DesignSheet,
    pub matrix: DesignMatrix,
}

impl Design {
    pub fn runs(&self) -> usize {
        self.sheet.n_rows()
    }
}

/// Produces screening and optimization designs for a factor space.
pub struct DesignGenerator {
    designer: Box<dyn MatrixDesigner>,
    edge_policy: EdgePolicy,
    gsd_reduction: GsdReduction,
}

impl std::fmt::Debug for DesignGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesignGenerator")
            .field("designer", &self.designer.name())
            .field("edge_policy", &self.edge_policy)
            .field("gsd_reduction", &self.gsd_reduction)
            .finish()
    }
}

impl DesignGenerator {
    /// Create a generator for a named design family.
    ///
    /// Fails with `UnsupportedDesign` if the name is not a known family.
    pub fn new(
        design_type: &str,
        edge_policy: EdgePolicy,
        gsd_reduction: GsdReduction,
    ) -> DpResult<Self> {
        let family: DesignFamily = design_type.parse()?;
        Ok(Self::with_designer(Box::new(family), edge_policy, gsd_reduction))
    }

    /// Create a generator around any coded matrix source.
    pub fn with_designer(
        designer: Box<dyn MatrixDesigner>,
        edge_policy: EdgePolicy,
        gsd_reduction: GsdReduction,
    ) -> Self {
        Self {
            designer,
            edge_policy,
            gsd_reduction,
        }
    }

    pub fn design_name(&self) -> &str {
        self.designer.name()
    }

    pub fn edge_policy(&self) -> EdgePolicy {
        self.edge_policy
    }

    pub fn generate(&self, phase: Phase, factors: &FactorSpace) -> DpResult<Design> {
        match phase {
            Phase::Screening => self.screening(factors),
            Phase::Optimization => self.optimization(factors),
        }
    }

    /// Generalized subset design over the global bounds of every factor.
    ///
    /// Columns are in factor-name order.
    pub fn screening(&self, factors: &FactorSpace) -> DpResult<Design> {
        let names = factors.sorted_names();
        let levels = names
            .iter()
            .map(|name| screening_levels(name, factors.require(name)?))
            .collect::<DpResult<Vec<Vec<f64>>>>()?;

        let counts: Vec<usize> = levels.iter().map(Vec::len).collect();
        let reduction = match self.gsd_reduction {
            GsdReduction::Auto => names.len().max(2),
            GsdReduction::Fixed(n) => n,
        };
        let indices = gsd(&counts, reduction)?;
        debug!(
            "Generated screening design: {} runs, reduction {}",
            indices.len(),
            reduction
        );

        let data = levels
            .iter()
            .enumerate()
            .map(|(col, values)| indices.iter().map(|row| values[row[col]]).collect())
            .collect();
        let sheet = DesignSheet::from_columns(names, data)?;

        Ok(Design {
            phase: Phase::Screening,
            sheet,
            matrix: DesignMatrix::Levels { indices, levels },
        })
    }

    /// Response-surface design scaled to the current working ranges.
    ///
    /// Columns are in factor insertion order.
    pub fn optimization(&self, factors: &FactorSpace) -> DpResult<Design> {
        let coded = self.designer.coded_matrix(factors.len())?;
        let mut data: Vec<Vec<f64>> = Vec::with_capacity(factors.len());
        let mut out_of_bounds = false;

        for (col, (name, factor)) in factors.iter().enumerate() {
            let (low, high) = factor.working_range()?;
            let half_span = (high - low) / 2.0;
            let center = (high + low) / 2.0;
            debug!("Current setting {}: {}", name, factor);

            let column: Vec<f64> = coded
                .iter()
                .map(|row| {
                    let value = row[col] * half_span + center;
                    if factor.is_ordinal() {
                        value.round_ties_even()
                    } else {
                        value
                    }
                })
                .collect();
            out_of_bounds |= column
                .iter()
                .any(|v| *v < factor.min() || *v > factor.max());
            data.push(column);
        }

        if out_of_bounds {
            warn!(
                "Out of design space factors. Adjusts factors by {}",
                match self.edge_policy {
                    EdgePolicy::Distort => "distorting",
                    EdgePolicy::Shrink => "shrinking",
                }
            );
            match self.edge_policy {
                EdgePolicy::Distort => {
                    for (column, (_, factor)) in data.iter_mut().zip(factors.iter()) {
                        for value in column.iter_mut() {
                            *value = value.max(factor.min()).min(factor.max());
                        }
                    }
                }
                EdgePolicy::Shrink => return Err(not_implemented!("at_edges = shrink")),
            }
        }

        let names = factors.names().map(str::to_string).collect();
        let sheet = DesignSheet::from_columns(names, data)?;
        Ok(Design {
            phase: Phase::Optimization,
            sheet,
            matrix: DesignMatrix::Coded(coded),
        })
    }
}

/// Discrete screening levels of one factor between its global bounds.
pub fn screening_levels(name: &str, factor: &Factor) -> DpResult<Vec<f64>> {
    let (min, max) = (factor.min(), factor.max());
    if !min.is_finite() || !max.is_finite() {
        return Err(validation_error!(
            "Can't perform screening with unbounded factors ({})",
            name
        ));
    }

    let count = factor.screening_levels();
    let step = |i: usize| i as f64 / (count - 1) as f64;
    let mut values: Vec<f64> = match factor.screening_spacing() {
        ScreeningSpacing::Linear => (0..count).map(|i| min + step(i) * (max - min)).collect(),
        ScreeningSpacing::Logarithmic => {
            if min <= 0.0 {
                return Err(validation_error!(
                    "logarithmic screening of {} needs positive bounds",
                    name
                ));
            }
            let (log_min, log_max) = (min.ln(), max.ln());
            (0..count)
                .map(|i| (log_min + step(i) * (log_max - log_min)).exp())
                .collect()
        }
    };

    if factor.is_ordinal() {
        values = values.into_iter().map(f64::round_ties_even).collect();
        values.sort_by(f64::total_cmp);
        values.dedup();
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dp_types::{DpError, FactorType};

    fn two_factor_space(low: f64, high: f64) -> FactorSpace {
        FactorSpace::new()
            .with_factor(
                "x1",
                Factor::quantitative(f64::INFINITY, 0.0)
                    .unwrap()
                    .with_range(low, high)
                    .unwrap(),
            )
            .unwrap()
            .with_factor(
                "x2",
                Factor::quantitative(f64::INFINITY, 0.0)
                    .unwrap()
                    .with_range(low, high)
                    .unwrap(),
            )
            .unwrap()
    }

    fn generator(design: &str, policy: EdgePolicy) -> DesignGenerator {
        DesignGenerator::new(design, policy, GsdReduction::Auto).unwrap()
    }

    #[test]
    fn unknown_design_is_rejected() {
        let result = DesignGenerator::new("nonsense", EdgePolicy::Distort, GsdReduction::Auto);
        assert!(matches!(result, Err(DpError::UnsupportedDesign(_))));
    }

    #[test]
    fn optimization_design_round_trips_to_coded_units() {
        let space = two_factor_space(0.0, 10.0);
        let design = generator("ccf", EdgePolicy::Distort).optimization(&space).unwrap();
        let DesignMatrix::Coded(coded) = &design.matrix else {
            panic!("expected coded matrix");
        };

        let (center, half_span) = (5.0, 5.0);
        for (r, row) in design.sheet.rows().enumerate() {
            for (c, value) in row.iter().enumerate() {
                let recovered = (value - center) / half_span;
                assert!((recovered - coded[r][c]).abs() < 1e-12);
            }
        }
        assert_eq!(design.sheet.columns(), &["x1".to_string(), "x2".to_string()]);
    }

    #[test]
    fn distort_clips_to_bounds() {
        // ccc axial points reach 5 ± 5*sqrt(2.5) which leaves [0, 12]
        let mut space = two_factor_space(0.0, 10.0);
        space.require_mut("x1").unwrap().set_max(12.0).unwrap();

        let design = generator("ccc", EdgePolicy::Distort).optimization(&space).unwrap();
        let x1 = design.sheet.column("x1").unwrap();
        let x2 = design.sheet.column("x2").unwrap();
        assert!(x1.iter().all(|v| (0.0..=12.0).contains(v)));
        assert!(x1.contains(&12.0));
        assert!(x1.contains(&0.0));
        assert!(x2.iter().any(|v| *v > 12.0));
        assert!(x2.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn shrink_is_not_implemented() {
        let mut space = two_factor_space(0.0, 10.0);
        space.require_mut("x1").unwrap().set_max(12.0).unwrap();
        let result = generator("ccc", EdgePolicy::Shrink).optimization(&space);
        assert!(matches!(result, Err(DpError::NotImplemented(_))));

        // Within bounds, shrink never triggers.
        let space = two_factor_space(2.0, 8.0);
        assert!(generator("ccf", EdgePolicy::Shrink).optimization(&space).is_ok());
    }

    #[test]
    fn ordinal_columns_are_rounded() {
        let space = FactorSpace::new()
            .with_factor(
                "n",
                Factor::new(FactorType::Ordinal, 100.0, 0.0, Some(3.0), Some(8.0)).unwrap(),
            )
            .unwrap()
            .with_factor(
                "t",
                Factor::quantitative(100.0, 0.0).unwrap().with_range(3.0, 8.0).unwrap(),
            )
            .unwrap();
        let design = generator("ccc", EdgePolicy::Distort).optimization(&space).unwrap();
        assert!(design.sheet.column("n").unwrap().iter().all(|v| v.fract() == 0.0));
        assert!(design.sheet.column("t").unwrap().iter().any(|v| v.fract() != 0.0));
    }

    #[test]
    fn missing_working_range_fails() {
        let space = FactorSpace::new()
            .with_factor("x", Factor::quantitative(10.0, 0.0).unwrap())
            .unwrap();
        assert!(generator("fullfactorial2levels", EdgePolicy::Distort)
            .optimization(&space)
            .is_err());
    }

    #[test]
    fn screening_uses_global_bounds_and_sorted_columns() {
        let space = FactorSpace::new()
            .with_factor(
                "b",
                Factor::quantitative(40.0, 0.0).unwrap().with_range(10.0, 20.0).unwrap(),
            )
            .unwrap()
            .with_factor(
                "a",
                Factor::ordinal(3.0, 1.0).unwrap().with_range(1.0, 2.0).unwrap(),
            )
            .unwrap();

        let design = generator("ccf", EdgePolicy::Distort).screening(&space).unwrap();
        assert_eq!(design.phase, Phase::Screening);
        assert_eq!(design.sheet.columns(), &["a".to_string(), "b".to_string()]);

        let DesignMatrix::Levels { indices, levels } = &design.matrix else {
            panic!("expected level matrix");
        };
        assert_eq!(levels[0], vec![1.0, 2.0, 3.0]);
        assert_eq!(levels[1], vec![0.0, 10.0, 20.0, 30.0, 40.0]);
        assert_eq!(indices.len(), design.runs());
        for (row, idx) in indices.iter().enumerate() {
            assert_eq!(design.sheet.value(row, "a"), Some(levels[0][idx[0]]));
            assert_eq!(design.sheet.value(row, "b"), Some(levels[1][idx[1]]));
        }
    }

    #[test]
    fn screening_rejects_unbounded_factors() {
        let space = two_factor_space(0.0, 10.0);
        let result = generator("ccf", EdgePolicy::Distort).screening(&space);
        assert!(matches!(result, Err(DpError::Validation(_))));
    }

    #[test]
    fn logarithmic_levels_are_geometric() {
        let factor = Factor::quantitative(1000.0, 1.0)
            .unwrap()
            .with_screening(4, ScreeningSpacing::Logarithmic)
            .unwrap();
        let levels = screening_levels("conc", &factor).unwrap();
        for (value, expected) in levels.iter().zip([1.0, 10.0, 100.0, 1000.0]) {
            assert!((value - expected).abs() < 1e-9 * expected);
        }

        let factor = Factor::quantitative(10.0, 0.0)
            .unwrap()
            .with_screening(3, ScreeningSpacing::Logarithmic)
            .unwrap();
        assert!(screening_levels("conc", &factor).is_err());
    }
}
