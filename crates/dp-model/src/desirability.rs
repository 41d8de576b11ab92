//! Derringer–Suich desirability functions.
//!
//! A desirability maps a response value to `[0, 1]`, where 1 is fully
//! acceptable. The exponent `s` (the response priority) shapes the ramp
//! between the limits.

use serde::{Deserialize, Serialize};

use dp_types::{config_error, Criterion, DpResult, OrderedMap, ResponseSpec};

/// Desirability function of one response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "criterion", rename_all = "lowercase")]
pub enum Desirability {
    /// 0 outside `[low, high]`, peaking at `target`.
    Target {
        low: f64,
        high: f64,
        target: f64,
        s: f64,
    },
    /// 0 below `low`, 1 above `target`.
    Maximize { low: f64, target: f64, s: f64 },
    /// 1 below `target`, 0 above `high`.
    Minimize { high: f64, target: f64, s: f64 },
}

impl Desirability {
    /// Build the desirability described by a response specification.
    ///
    /// Target responses need both limits (the target defaults to their
    /// midpoint); maximize needs `low_limit` and `target`; minimize needs
    /// `high_limit` and `target`.
    pub fn from_spec(name: &str, spec: &ResponseSpec) -> DpResult<Self> {
        let s = spec.priority;
        let require = |value: Option<f64>, field: &str| {
            value.ok_or_else(|| {
                config_error!("response {} ({}) requires {}", name, spec.criterion, field)
            })
        };

        let desirability = match spec.criterion {
            Criterion::Target => {
                let low = require(spec.low_limit, "low_limit")?;
                let high = require(spec.high_limit, "high_limit")?;
                let target = spec.target.unwrap_or((low + high) / 2.0);
                if !(low < target && target < high) {
                    return Err(config_error!(
                        "response {}: target {} must lie strictly inside ({}, {})",
                        name,
                        target,
                        low,
                        high
                    ));
                }
                Self::Target {
                    low,
                    high,
                    target,
                    s,
                }
            }
            Criterion::Maximize => {
                let low = require(spec.low_limit, "low_limit")?;
                let target = require(spec.target, "target")?;
                if target <= low {
                    return Err(config_error!(
                        "response {}: target {} must exceed low_limit {}",
                        name,
                        target,
                        low
                    ));
                }
                Self::Maximize { low, target, s }
            }
            Criterion::Minimize => {
                let high = require(spec.high_limit, "high_limit")?;
                let target = require(spec.target, "target")?;
                if target >= high {
                    return Err(config_error!(
                        "response {}: target {} must be below high_limit {}",
                        name,
                        target,
                        high
                    ));
                }
                Self::Minimize { high, target, s }
            }
        };
        Ok(desirability)
    }

    /// Desirability of response value `y`.
    pub fn evaluate(&self, y: f64) -> f64 {
        match *self {
            Self::Target {
                low,
                high,
                target,
                s,
            } => {
                if y < low || y > high {
                    0.0
                } else if y <= target {
                    ((y - low) / (target - low)).powf(s)
                } else {
                    ((y - high) / (target - high)).powf(s)
                }
            }
            Self::Maximize { low, target, s } => {
                if y < low {
                    0.0
                } else if y > target {
                    1.0
                } else {
                    ((y - low) / (target - low)).powf(s)
                }
            }
            Self::Minimize { high, target, s } => {
                if y < target {
                    1.0
                } else if y > high {
                    0.0
                } else {
                    ((y - high) / (target - high)).powf(s)
                }
            }
        }
    }
}

/// One desirability per response, in response order.
pub fn build_desirabilities(
    responses: &OrderedMap<ResponseSpec>,
) -> DpResult<Vec<(String, Desirability)>> {
    responses
        .iter()
        .map(|(name, spec)| Ok((name.to_string(), Desirability::from_spec(name, spec)?)))
        .collect()
}
