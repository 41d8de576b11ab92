//! Coded design families for the optimization phase.
//!
//! Every generator returns a row-major matrix with one column per factor and
//! values in coded units: `-1`/`+1` at the edges of the working range and `0`
//! at its center. Central composite designs place axial points beyond the
//! edges (`ccc`) or shrink the factorial points inside them (`cci`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use dp_types::{validation_error, DpError, DpResult};

/// Row-major matrix of coded values.
pub type CodedMatrix = Vec<Vec<f64>>;

/// Source of coded design matrices.
///
/// Implementations must return `runs × n_factors` matrices whose values are
/// centered on 0 and scaled so that the working range maps to `[-1, 1]`.
pub trait MatrixDesigner: Send + Sync {
    /// Generate the coded matrix for `n_factors` factors.
    fn coded_matrix(&self, n_factors: usize) -> DpResult<CodedMatrix>;

    /// Human-readable design name.
    fn name(&self) -> &str;
}

/// Supported response-surface and factorial families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DesignFamily {
    FullFactorial2Levels,
    FullFactorial3Levels,
    PlackettBurman,
    BoxBehnken,
    /// Central composite, circumscribed.
    Ccc,
    /// Central composite, face centered.
    Ccf,
    /// Central composite, inscribed.
    Cci,
}

impl DesignFamily {
    pub const ALL: [DesignFamily; 7] = [
        Self::FullFactorial2Levels,
        Self::FullFactorial3Levels,
        Self::PlackettBurman,
        Self::BoxBehnken,
        Self::Ccc,
        Self::Ccf,
        Self::Cci,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullFactorial2Levels => "fullfactorial2levels",
            Self::FullFactorial3Levels => "fullfactorial3levels",
            Self::PlackettBurman => "placketburman",
            Self::BoxBehnken => "boxbehnken",
            Self::Ccc => "ccc",
            Self::Ccf => "ccf",
            Self::Cci => "cci",
        }
    }
}

impl FromStr for DesignFamily {
    type Err = DpError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let lowered = name.to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|family| family.as_str() == lowered)
            .ok_or_else(|| DpError::UnsupportedDesign(name.to_string()))
    }
}

impl fmt::Display for DesignFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MatrixDesigner for DesignFamily {
    fn coded_matrix(&self, n_factors: usize) -> DpResult<CodedMatrix> {
        if n_factors == 0 {
            return Err(validation_error!("a design needs at least one factor"));
        }
        match self {
            Self::FullFactorial2Levels => two_level_factorial(n_factors),
            Self::FullFactorial3Levels => Ok(full_factorial(&vec![3; n_factors])?
                .into_iter()
                .map(|row| row.into_iter().map(|v| v as f64 - 1.0).collect())
                .collect()),
            Self::PlackettBurman => plackett_burman(n_factors),
            Self::BoxBehnken => box_behnken(n_factors),
            Self::Ccc => central_composite(n_factors, Face::Circumscribed),
            Self::Ccf => central_composite(n_factors, Face::Faced),
            Self::Cci => central_composite(n_factors, Face::Inscribed),
        }
    }

    fn name(&self) -> &str {
        self.as_str()
    }
}

/// General full factorial over level counts; entries are level indices and
/// the first column varies fastest. Fails when the run count overflows.
pub fn full_factorial(levels: &[usize]) -> DpResult<Vec<Vec<usize>>> {
    let runs = levels
        .iter()
        .try_fold(1usize, |runs, &count| runs.checked_mul(count))
        .ok_or_else(|| validation_error!("full factorial over {:?} levels is too large", levels))?;
    let mut rows = vec![vec![0usize; levels.len()]; runs];
    let mut repeat = 1;
    for (col, &count) in levels.iter().enumerate() {
        for (i, row) in rows.iter_mut().enumerate() {
            row[col] = (i / repeat) % count;
        }
        repeat *= count;
    }
    Ok(rows)
}

/// Two-level full factorial in coded units (`-1`/`+1`).
pub fn two_level_factorial(n_factors: usize) -> DpResult<CodedMatrix> {
    Ok(full_factorial(&vec![2; n_factors])?
        .into_iter()
        .map(|row| row.into_iter().map(|v| 2.0 * v as f64 - 1.0).collect())
        .collect())
}

fn hadamard_double(h: Vec<Vec<f64>>) -> Vec<Vec<f64>> {
    let top = h.iter().map(|row| {
        let mut r = row.clone();
        r.extend_from_slice(row);
        r
    });
    let bottom = h.iter().map(|row| {
        let mut r = row.clone();
        r.extend(row.iter().map(|v| -v));
        r
    });
    top.chain(bottom).collect()
}

/// Normalized Paley (type I) Hadamard matrix of order `q + 1`, `q ≡ 3 mod 4`
/// prime. First row and first column are all ones.
fn paley_hadamard(q: usize) -> Vec<Vec<f64>> {
    let mut residue = vec![false; q];
    for k in 1..q {
        residue[(k * k) % q] = true;
    }
    let chi = |a: usize| -> f64 {
        match a % q {
            0 => 0.0,
            r if residue[r] => 1.0,
            _ => -1.0,
        }
    };

    let n = q + 1;
    let mut h = vec![vec![0.0; n]; n];
    for (i, row) in h.iter_mut().enumerate() {
        for (j, value) in row.iter_mut().enumerate() {
            let skew = match (i, j) {
                (0, 0) => 0.0,
                (0, _) => 1.0,
                (_, 0) => -1.0,
                _ => chi(j + q - i),
            };
            let identity = if i == j { 1.0 } else { 0.0 };
            *value = skew + identity;
        }
    }
    for row in h.iter_mut().skip(1) {
        for value in row.iter_mut() {
            *value = -*value;
        }
    }
    h
}

/// Plackett–Burman screening design for `n_factors` factors.
///
/// Uses `4 * (n_factors / 4 + 1)` runs; that count must be a power of two
/// times 1, 12 or 20.
pub fn plackett_burman(n_factors: usize) -> DpResult<CodedMatrix> {
    let runs = 4 * (n_factors / 4 + 1);
    let (mut h, base) = if runs.is_power_of_two() {
        (vec![vec![1.0]], 1)
    } else if runs % 12 == 0 && (runs / 12).is_power_of_two() {
        (paley_hadamard(11), 12)
    } else if runs % 20 == 0 && (runs / 20).is_power_of_two() {
        (paley_hadamard(19), 20)
    } else {
        return Err(validation_error!(
            "no Plackett-Burman design with {} runs for {} factors",
            runs,
            n_factors
        ));
    };

    let mut order = base;
    while order < runs {
        h = hadamard_double(h);
        order *= 2;
    }

    Ok(h.into_iter()
        .rev()
        .map(|row| row[1..=n_factors].to_vec())
        .collect())
}

/// Box–Behnken design with a single center point. Needs at least 3 factors.
pub fn box_behnken(n_factors: usize) -> DpResult<CodedMatrix> {
    if n_factors < 3 {
        return Err(validation_error!(
            "Box-Behnken designs need at least 3 factors, not {}",
            n_factors
        ));
    }
    let pair_block = two_level_factorial(2)?;
    let mut rows = Vec::with_capacity(n_factors * (n_factors - 1) * 2 + 1);
    for i in 0..n_factors - 1 {
        for j in i + 1..n_factors {
            for pair in &pair_block {
                let mut row = vec![0.0; n_factors];
                row[i] = pair[0];
                row[j] = pair[1];
                rows.push(row);
            }
        }
    }
    rows.push(vec![0.0; n_factors]);
    Ok(rows)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Face {
    Circumscribed,
    Faced,
    Inscribed,
}

/// Center points added to the factorial and to the axial block.
const CCD_CENTER_POINTS: (usize, usize) = (0, 1);

/// Axial distance giving an orthogonal central composite design.
fn orthogonal_alpha(n_factors: usize) -> f64 {
    let n = n_factors as f64;
    let factorial_runs = n.exp2();
    let axial_runs = 2.0 * n;
    let (factorial_centers, axial_centers) = CCD_CENTER_POINTS;
    (n * (1.0 + axial_centers as f64 / axial_runs)
        / (1.0 + factorial_centers as f64 / factorial_runs))
        .sqrt()
}

fn star_points(n_factors: usize, alpha: f64) -> CodedMatrix {
    let mut rows = Vec::with_capacity(2 * n_factors);
    for i in 0..n_factors {
        for sign in [-1.0, 1.0] {
            let mut row = vec![0.0; n_factors];
            row[i] = sign * alpha;
            rows.push(row);
        }
    }
    rows
}

fn central_composite(n_factors: usize, face: Face) -> DpResult<CodedMatrix> {
    if n_factors < 2 {
        return Err(validation_error!(
            "central composite designs need at least 2 factors, not {}",
            n_factors
        ));
    }
    let alpha = orthogonal_alpha(n_factors);
    let (factorial, axial) = match face {
        Face::Circumscribed => (two_level_factorial(n_factors)?, star_points(n_factors, alpha)),
        Face::Faced => (two_level_factorial(n_factors)?, star_points(n_factors, 1.0)),
        Face::Inscribed => {
            let scaled = two_level_factorial(n_factors)?
                .into_iter()
                .map(|row| row.into_iter().map(|v| v / alpha).collect())
                .collect();
            (scaled, star_points(n_factors, 1.0))
        }
    };

    let (factorial_centers, axial_centers) = CCD_CENTER_POINTS;
    let center = vec![0.0; n_factors];
    let mut rows = factorial;
    rows.extend(std::iter::repeat(center.clone()).take(factorial_centers));
    rows.extend(axial);
    rows.extend(std::iter::repeat(center).take(axial_centers));
    Ok(rows)
}
