//! Experimental factors and the ordered factor space they live in.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{DpError, DpResult};
use crate::{not_implemented, validation_error};

/// Number of screening levels used when a factor does not specify one.
pub const DEFAULT_SCREENING_LEVELS: usize = 5;

/// Kind of a controllable variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorType {
    /// Real-valued factor.
    Quantitative,
    /// Integer-valued factor.
    Ordinal,
    /// Multilevel categorical factor (not supported).
    Categorical,
}

impl FactorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quantitative => "quantitative",
            Self::Ordinal => "ordinal",
            Self::Categorical => "categorical",
        }
    }
}

impl FromStr for FactorType {
    type Err = DpError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.to_lowercase().as_str() {
            "quantitative" => Ok(Self::Quantitative),
            "ordinal" => Ok(Self::Ordinal),
            "categorical" => Ok(Self::Categorical),
            _ => Err(DpError::UnsupportedFactorType(tag.to_string())),
        }
    }
}

impl fmt::Display for FactorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How screening levels are spread between a factor's global bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreeningSpacing {
    #[default]
    Linear,
    /// Geometric spacing; requires strictly positive bounds.
    Logarithmic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Min,
    Max,
    CurrentLow,
    CurrentHigh,
}

impl Field {
    fn name(self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
            Self::CurrentLow => "current_low",
            Self::CurrentHigh => "current_high",
        }
    }

    /// The one unbounded value this field accepts on ordinal factors.
    fn sentinel(self) -> Option<f64> {
        match self {
            Self::Min => Some(f64::NEG_INFINITY),
            Self::Max => Some(f64::INFINITY),
            _ => None,
        }
    }
}

/// A single controllable variable with global bounds and a working range.
///
/// All numeric fields are written through validated setters. For ordinal
/// factors every value must be integral, except `+inf` for `max` and `-inf`
/// for `min` which mark the factor as unbounded on that side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Factor {
    kind: FactorType,
    min: f64,
    max: f64,
    current_low: Option<f64>,
    current_high: Option<f64>,
    screening_levels: usize,
    screening_spacing: ScreeningSpacing,
}

impl Factor {
    /// Create a factor of the given kind.
    ///
    /// Fails with `NotImplemented` for categorical factors and with a
    /// validation error when an ordinal factor gets a non-integral value.
    pub fn new(
        kind: FactorType,
        max: f64,
        min: f64,
        current_low: Option<f64>,
        current_high: Option<f64>,
    ) -> DpResult<Self> {
        if kind == FactorType::Categorical {
            return Err(not_implemented!("categorical factors"));
        }

        let mut factor = Self {
            kind,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            current_low: None,
            current_high: None,
            screening_levels: DEFAULT_SCREENING_LEVELS,
            screening_spacing: ScreeningSpacing::Linear,
        };
        factor.set_max(max)?;
        factor.set_min(min)?;
        factor.set_current_low(current_low)?;
        factor.set_current_high(current_high)?;
        Ok(factor)
    }

    /// Map a type tag (case-insensitive) to the matching constructor.
    pub fn from_tag(
        tag: &str,
        max: f64,
        min: f64,
        current_low: Option<f64>,
        current_high: Option<f64>,
    ) -> DpResult<Self> {
        Self::new(tag.parse()?, max, min, current_low, current_high)
    }

    pub fn quantitative(max: f64, min: f64) -> DpResult<Self> {
        Self::new(FactorType::Quantitative, max, min, None, None)
    }

    pub fn ordinal(max: f64, min: f64) -> DpResult<Self> {
        Self::new(FactorType::Ordinal, max, min, None, None)
    }

    /// Set the working range in one call.
    pub fn with_range(mut self, low: f64, high: f64) -> DpResult<Self> {
        self.set_current_low(Some(low))?;
        self.set_current_high(Some(high))?;
        Ok(self)
    }

    pub fn with_screening(mut self, levels: usize, spacing: ScreeningSpacing) -> DpResult<Self> {
        if levels < 2 {
            return Err(validation_error!(
                "screening requires at least 2 levels, not {}",
                levels
            ));
        }
        self.screening_levels = levels;
        self.screening_spacing = spacing;
        Ok(self)
    }

    pub fn kind(&self) -> FactorType {
        self.kind
    }

    pub fn is_ordinal(&self) -> bool {
        self.kind == FactorType::Ordinal
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn current_low(&self) -> Option<f64> {
        self.current_low
    }

    pub fn current_high(&self) -> Option<f64> {
        self.current_high
    }

    pub fn screening_levels(&self) -> usize {
        self.screening_levels
    }

    pub fn screening_spacing(&self) -> ScreeningSpacing {
        self.screening_spacing
    }

    /// Distance between current high and low.
    pub fn span(&self) -> Option<f64> {
        Some(self.current_high? - self.current_low?)
    }

    /// Mean value of current high and low.
    pub fn center(&self) -> Option<f64> {
        Some((self.current_high? + self.current_low?) / 2.0)
    }

    /// The working range, failing if either end has not been set.
    pub fn working_range(&self) -> DpResult<(f64, f64)> {
        match (self.current_low, self.current_high) {
            (Some(low), Some(high)) => Ok((low, high)),
            _ => Err(validation_error!("factor working range is not set: {}", self)),
        }
    }

    pub fn set_min(&mut self, value: f64) -> DpResult<()> {
        self.min = self.checked(Field::Min, value)?;
        Ok(())
    }

    pub fn set_max(&mut self, value: f64) -> DpResult<()> {
        self.max = self.checked(Field::Max, value)?;
        Ok(())
    }

    pub fn set_current_low(&mut self, value: Option<f64>) -> DpResult<()> {
        self.current_low = value.map(|v| self.checked(Field::CurrentLow, v)).transpose()?;
        Ok(())
    }

    pub fn set_current_high(&mut self, value: Option<f64>) -> DpResult<()> {
        self.current_high = value.map(|v| self.checked(Field::CurrentHigh, v)).transpose()?;
        Ok(())
    }

    fn checked(&self, field: Field, value: f64) -> DpResult<f64> {
        if value.is_nan() {
            return Err(validation_error!("{} can not be NaN", field.name()));
        }
        if self.kind != FactorType::Ordinal || field.sentinel() == Some(value) {
            return Ok(value);
        }
        if !value.is_finite() || value.fract() != 0.0 {
            return Err(validation_error!(
                "{} requires an integer, not {}",
                field.name(),
                value
            ));
        }
        Ok(value.trunc())
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmt_opt = |v: Option<f64>| v.map_or_else(|| "None".to_string(), |v| v.to_string());
        write!(
            f,
            "{}(factor_max={}, factor_min={}, current_low={}, current_high={})",
            self.kind,
            self.max,
            self.min,
            fmt_opt(self.current_low),
            fmt_opt(self.current_high)
        )
    }
}

/// Ordered mapping from factor name to factor.
///
/// Insertion order is the column order of optimization designs. A space is a
/// plain value: each designer round takes one snapshot and produces the next.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FactorSpace {
    entries: Vec<(String, Factor)>,
}

impl FactorSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, factor: Factor) -> DpResult<()> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(validation_error!("duplicate factor name: {}", name));
        }
        self.entries.push((name, factor));
        Ok(())
    }

    pub fn with_factor(mut self, name: impl Into<String>, factor: Factor) -> DpResult<Self> {
        self.insert(name, factor)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Factor> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Factor> {
        self.entries.iter_mut().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    /// Look up a factor that must exist.
    pub fn require(&self, name: &str) -> DpResult<&Factor> {
        self.get(name)
            .ok_or_else(|| validation_error!("unknown factor: {}", name))
    }

    pub fn require_mut(&mut self, name: &str) -> DpResult<&mut Factor> {
        self.get_mut(name)
            .ok_or_else(|| validation_error!("unknown factor: {}", name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Factor names in lexicographic order (the screening column order).
    pub fn sorted_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names().map(str::to_string).collect();
        names.sort();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Factor)> {
        self.entries.iter().map(|(n, f)| (n.as_str(), f))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
