//! Polynomial response models.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use dp_types::{validation_error, DesignSheet, DpResult};

use crate::lstsq::LeastSquaresSolver;

/// All multisets of size `k` drawn from `0..n`, in lexicographic order.
pub fn combinations_with_replacement(n: usize, k: usize) -> Vec<Vec<usize>> {
    if k == 0 {
        return vec![Vec::new()];
    }
    if n == 0 {
        return Vec::new();
    }

    let mut out = Vec::new();
    let mut current = vec![0usize; k];
    loop {
        out.push(current.clone());
        // Rightmost position that can still grow.
        let Some(pos) = current.iter().rposition(|&v| v < n - 1) else {
            return out;
        };
        let next = current[pos] + 1;
        for value in &mut current[pos..] {
            *value = next;
        }
    }
}

/// Monomial terms of a polynomial of `degree` in `n_cols` variables, without
/// the constant: every multiset of column indices of size `1..=degree`.
pub fn feature_terms(n_cols: usize, degree: usize) -> Vec<Vec<usize>> {
    (1..=degree)
        .flat_map(|d| combinations_with_replacement(n_cols, d))
        .collect()
}

/// Least-squares polynomial fitted to a design sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialModel {
    degree: usize,
    terms: Vec<Vec<usize>>,
    /// Constant first, then one coefficient per term.
    coefficients: Vec<f64>,
}

impl PolynomialModel {
    /// Fit `response ≈ c₀ + Σ cᵢ · termᵢ(row)` over the rows of `sheet`.
    pub fn fit(
        sheet: &DesignSheet,
        response: &[f64],
        degree: usize,
        solver: &dyn LeastSquaresSolver,
    ) -> DpResult<Self> {
        if degree == 0 {
            return Err(validation_error!("polynomial degree must be at least 1"));
        }
        if sheet.n_rows() != response.len() {
            return Err(validation_error!(
                "design has {} rows but response has {}",
                sheet.n_rows(),
                response.len()
            ));
        }

        let terms = feature_terms(sheet.n_cols(), degree);
        let rows: Vec<Vec<f64>> = sheet.rows().collect();
        let a = DMatrix::from_fn(rows.len(), terms.len() + 1, |r, c| {
            if c == 0 {
                1.0
            } else {
                term_value(&terms[c - 1], &rows[r])
            }
        });
        let b = DVector::from_column_slice(response);
        let coefficients = solver.solve(&a, &b)?.iter().copied().collect();
        debug!(
            "Fitted degree {} model with {} terms on {} runs using {}",
            degree,
            terms.len(),
            rows.len(),
            solver.name()
        );

        Ok(Self {
            degree,
            terms,
            coefficients,
        })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn terms(&self) -> &[Vec<usize>] {
        &self.terms
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Predicted response at `x`; negated when `invert` is set.
    pub fn predict(&self, x: &[f64], invert: bool) -> f64 {
        let value = self.coefficients[0]
            + self
                .terms
                .iter()
                .zip(&self.coefficients[1..])
                .map(|(term, c)| c * term_value(term, x))
                .sum::<f64>();
        if invert {
            -value
        } else {
            value
        }
    }
}

fn term_value(term: &[usize], x: &[f64]) -> f64 {
    term.iter().map(|&i| x[i]).product()
}
