//! Round evaluation.
//!
//! Both evaluators are pure: they read the current factor snapshot and the
//! design it produced, and return the next snapshot together with the round
//! result. The designer swaps the new snapshot in only when evaluation
//! succeeds.

use tracing::{debug, info};

use dp_design::{Design, DesignMatrix};
use dp_model::OptimumPredictor;
use dp_types::{
    not_implemented, validation_error, Criterion, DpResult, FactorSpace, OptimizationResult,
};

/// Index of the best response value under `criterion`; ties go to the first.
pub fn best_run(response: &[f64], criterion: Criterion) -> DpResult<usize> {
    if let Some(i) = response.iter().position(|v| v.is_nan()) {
        return Err(validation_error!("response of run {} is NaN", i));
    }
    let better: fn(f64, f64) -> bool = match criterion {
        Criterion::Maximize => |a, b| a > b,
        Criterion::Minimize => |a, b| a < b,
        Criterion::Target => return Err(not_implemented!("screening towards a target")),
    };
    let mut best = None;
    for (i, &value) in response.iter().enumerate() {
        match best {
            Some((_, current)) if !better(value, current) => {}
            _ => best = Some((i, value)),
        }
    }
    best.map(|(i, _)| i)
        .ok_or_else(|| validation_error!("empty response"))
}

/// Narrow every factor to the screening levels around the best run.
///
/// The levels of a factor are the distinct values its design column actually
/// ran, sorted. The new working range spans the neighbouring levels of the
/// best run's value (clamped at the outermost levels).
pub fn evaluate_screening(
    factors: &FactorSpace,
    design: &Design,
    response: &[f64],
    criterion: Criterion,
) -> DpResult<(FactorSpace, OptimizationResult)> {
    info!("Evaluates screening results.");
    if !matches!(design.matrix, DesignMatrix::Levels { .. }) {
        return Err(validation_error!(
            "screening evaluation needs a screening design"
        ));
    }
    let best = best_run(response, criterion)?;
    let best_row = design
        .sheet
        .row(best)
        .ok_or_else(|| validation_error!("run {} is not part of the design", best))?;

    let mut next = factors.clone();
    let mut optimum = Vec::with_capacity(design.sheet.n_cols());
    for (col, (name, &value)) in design.sheet.columns().iter().zip(&best_row).enumerate() {
        let mut observed = design.sheet.column_at(col).map(<[f64]>::to_vec).unwrap_or_default();
        observed.sort_by(f64::total_cmp);
        observed.dedup();
        let level = observed
            .iter()
            .position(|v| *v == value)
            .ok_or_else(|| validation_error!("{} = {} is not a level of the design", name, value))?;

        let factor = next.require_mut(name)?;
        let last = observed.len() - 1;
        let mut low = observed[level.saturating_sub(1)];
        let mut high = observed[(level + 1).min(last)];
        if factor.is_ordinal() {
            low = low.round_ties_even();
            high = high.round_ties_even();
        }
        factor.set_current_low(Some(low))?;
        factor.set_current_high(Some(high))?;
        debug!("New factor setting, {}: {}", name, factor);
        optimum.push((name.clone(), value));
    }

    let result = OptimizationResult {
        predicted_optimum: optimum,
        converged: false,
        tol: 0.0,
    };
    info!("Best screening result: {:?}", result.predicted_optimum);
    Ok((next, result))
}

/// Outcome of checking a predicted optimum against the current design.
#[derive(Debug, Clone, PartialEq)]
pub struct Recentering {
    pub factors: FactorSpace,
    pub converged: bool,
}

/// Convergence test and design move for a predicted optimum.
///
/// `optimum` holds one value per name in `names`. The design has converged
/// when `(current_high − optimum) / span` lies strictly inside
/// `(tol, 1 − tol)` for every factor. Otherwise the center moves towards the
/// optimum, by `step · span` along the unit displacement when a step is set,
/// or onto the optimum when it is not; spans are kept.
pub fn recenter(
    factors: &FactorSpace,
    names: &[String],
    optimum: &[f64],
    tol: f64,
    step: Option<f64>,
) -> DpResult<Recentering> {
    let mut centers = Vec::with_capacity(names.len());
    let mut spans = Vec::with_capacity(names.len());
    let mut converged = true;
    for (name, &opt) in names.iter().zip(optimum) {
        let (low, high) = factors.require(name)?.working_range()?;
        let span = high - low;
        let ratio = (high - opt) / span;
        converged &= ratio > tol && ratio < 1.0 - tol;
        centers.push((high + low) / 2.0);
        spans.push(span);
    }

    if converged {
        info!("Convergence reached.");
        return Ok(Recentering {
            factors: factors.clone(),
            converged,
        });
    }
    info!("Convergence not reached. Moves design.");

    let new_centers: Vec<f64> = match step {
        Some(step) => {
            let displacement: Vec<f64> = optimum.iter().zip(&centers).map(|(o, c)| o - c).collect();
            let norm = displacement.iter().map(|d| d * d).sum::<f64>().sqrt();
            if norm > 0.0 {
                centers
                    .iter()
                    .zip(&spans)
                    .zip(&displacement)
                    .map(|((c, s), d)| c + step * s * d / norm)
                    .collect()
            } else {
                centers.clone()
            }
        }
        None => optimum.to_vec(),
    };
    info!("New design center {:?} (old {:?})", new_centers, centers);

    let mut next = factors.clone();
    for ((name, center), span) in names.iter().zip(&new_centers).zip(&spans) {
        let factor = next.require_mut(name)?;
        let (low, high) = if factor.is_ordinal() {
            let half = (span / 2.0).round_ties_even();
            let center = center.round_ties_even();
            (center - half, center + half)
        } else {
            (center - span / 2.0, center + span / 2.0)
        };
        factor.set_current_low(Some(low))?;
        factor.set_current_high(Some(high))?;
        debug!("New factor setting, {}: {}", name, factor);
    }

    Ok(Recentering {
        factors: next,
        converged,
    })
}

/// Fit the response surface of an optimization design, then test for
/// convergence and move the design.
#[allow(clippy::too_many_arguments)]
pub fn evaluate_optimization(
    factors: &FactorSpace,
    design: &Design,
    response: &[f64],
    criterion: Criterion,
    degree: usize,
    tol: f64,
    step: Option<f64>,
    predictor: &OptimumPredictor,
) -> DpResult<(FactorSpace, OptimizationResult)> {
    info!("Finds optimum of current design.");
    let optimum =
        predictor.predict_optimum(&design.sheet, response, criterion, factors, degree)?;
    let names = design.sheet.columns();
    let recentered = recenter(factors, names, &optimum, tol, step)?;

    let result = OptimizationResult {
        predicted_optimum: names.iter().cloned().zip(optimum).collect(),
        converged: recentered.converged,
        tol,
    };
    info!("Predicted optimum: {:?}", result.predicted_optimum);
    Ok((recentered.factors, result))
}
