//! Designer configuration schema.
//!
//! [`DesignerConfig`] is the construction input of the experiment designer.
//! It deserializes from JSON and can be assembled with builder methods. Maps
//! keep document order because factor order is the column order of
//! optimization designs and the first response decides the criterion.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::io;
use std::marker::PhantomData;
use std::str::FromStr;

use crate::errors::{DpError, DpResult};
use crate::factor::{Factor, ScreeningSpacing, DEFAULT_SCREENING_LEVELS};
use crate::response::ResponseSpec;
use crate::{config_error, validation_error};

/// Default fraction of the span the design center may move per round.
pub const DEFAULT_RELATIVE_STEP: f64 = 0.25;

/// Map that keeps insertion (or document) order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(Vec<(String, V)>);

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Insert or replace, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn first(&self) -> Option<(&str, &V)> {
        self.0.first().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = OrderedMap::new();
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    map.insert(key, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

/// What to do with generated design points outside the global bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EdgePolicy {
    /// Clip values into `[min, max]`.
    #[default]
    Distort,
    /// Shrink the design to fit (declared, not implemented).
    Shrink,
}

impl FromStr for EdgePolicy {
    type Err = DpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "distort" => Ok(Self::Distort),
            "shrink" => Ok(Self::Shrink),
            _ => Err(validation_error!("unknown action at_edges: {}", s)),
        }
    }
}

impl TryFrom<String> for EdgePolicy {
    type Error = DpError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<EdgePolicy> for String {
    fn from(policy: EdgePolicy) -> Self {
        match policy {
            EdgePolicy::Distort => "distort".to_string(),
            EdgePolicy::Shrink => "shrink".to_string(),
        }
    }
}

/// Reduction of the generalized subset screening design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GsdReduction {
    /// One partition per factor.
    #[default]
    Auto,
    Fixed(usize),
}

impl Serialize for GsdReduction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Auto => serializer.serialize_str("auto"),
            Self::Fixed(n) => serializer.serialize_u64(*n as u64),
        }
    }
}

impl<'de> Deserialize<'de> for GsdReduction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Count(u64),
            Tag(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Count(0) => Err(serde::de::Error::custom(
                "gsd_reduction must be a positive integer or \"auto\"",
            )),
            Raw::Count(n) => Ok(Self::Fixed(n as usize)),
            Raw::Tag(tag) if tag.eq_ignore_ascii_case("auto") => Ok(Self::Auto),
            Raw::Tag(tag) => Err(serde::de::Error::custom(format!(
                "gsd_reduction must be a positive integer or \"auto\", not {tag:?}"
            ))),
        }
    }
}

/// A factor bound on the wire: a number or one of `"inf"`, `"+inf"`, `"-inf"`.
fn deserialize_bound<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(v)) => Ok(Some(v)),
        Some(Raw::Text(text)) => match text.to_lowercase().as_str() {
            "inf" | "+inf" | "infinity" => Ok(Some(f64::INFINITY)),
            "-inf" | "-infinity" => Ok(Some(f64::NEG_INFINITY)),
            _ => Err(serde::de::Error::custom(format!("invalid factor bound {text:?}"))),
        },
    }
}

fn default_factor_type() -> String {
    "quantitative".to_string()
}

fn default_screening_levels() -> usize {
    DEFAULT_SCREENING_LEVELS
}

/// Wire form of one factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorSpec {
    pub high_init: f64,
    pub low_init: f64,
    #[serde(rename = "type", default = "default_factor_type")]
    pub factor_type: String,
    #[serde(default, deserialize_with = "deserialize_bound")]
    pub min: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_bound")]
    pub max: Option<f64>,
    #[serde(default = "default_screening_levels")]
    pub screening_levels: usize,
    #[serde(default)]
    pub screening_spacing: ScreeningSpacing,
}

impl FactorSpec {
    pub fn new(low_init: f64, high_init: f64) -> Self {
        Self {
            high_init,
            low_init,
            factor_type: default_factor_type(),
            min: None,
            max: None,
            screening_levels: DEFAULT_SCREENING_LEVELS,
            screening_spacing: ScreeningSpacing::Linear,
        }
    }

    pub fn with_type(mut self, factor_type: &str) -> Self {
        self.factor_type = factor_type.to_string();
        self
    }

    pub fn with_bounds(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn with_screening(mut self, levels: usize, spacing: ScreeningSpacing) -> Self {
        self.screening_levels = levels;
        self.screening_spacing = spacing;
        self
    }

    /// Lower bound used when `min` is omitted: 0, or unbounded when either
    /// initial value is negative.
    pub fn effective_min(&self) -> f64 {
        self.min.unwrap_or(if self.high_init < 0.0 || self.low_init < 0.0 {
            f64::NEG_INFINITY
        } else {
            0.0
        })
    }

    pub fn effective_max(&self) -> f64 {
        self.max.unwrap_or(f64::INFINITY)
    }

    /// Build the validated factor this spec describes.
    pub fn build(&self) -> DpResult<Factor> {
        Factor::from_tag(
            &self.factor_type,
            self.effective_max(),
            self.effective_min(),
            Some(self.low_init),
            Some(self.high_init),
        )?
        .with_screening(self.screening_levels, self.screening_spacing)
    }
}

fn default_true() -> bool {
    true
}

fn default_relative_step() -> Option<f64> {
    Some(DEFAULT_RELATIVE_STEP)
}

/// Construction input of the experiment designer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignerConfig {
    pub factors: OrderedMap<FactorSpec>,
    /// Optimization design family name (case-insensitive).
    pub design_type: String,
    pub responses: OrderedMap<ResponseSpec>,
    #[serde(default = "default_true")]
    pub skip_screening: bool,
    #[serde(default)]
    pub at_edges: EdgePolicy,
    /// Fraction of the span the center may move per round; `None` jumps
    /// straight to the predicted optimum.
    #[serde(default = "default_relative_step")]
    pub relative_step: Option<f64>,
    #[serde(default)]
    pub gsd_reduction: GsdReduction,
}

impl DesignerConfig {
    pub fn new(design_type: &str) -> Self {
        Self {
            factors: OrderedMap::new(),
            design_type: design_type.to_string(),
            responses: OrderedMap::new(),
            skip_screening: true,
            at_edges: EdgePolicy::Distort,
            relative_step: default_relative_step(),
            gsd_reduction: GsdReduction::Auto,
        }
    }

    pub fn with_factor(mut self, name: &str, spec: FactorSpec) -> Self {
        self.factors.insert(name, spec);
        self
    }

    pub fn with_response(mut self, name: &str, spec: ResponseSpec) -> Self {
        self.responses.insert(name, spec);
        self
    }

    pub fn with_skip_screening(mut self, skip: bool) -> Self {
        self.skip_screening = skip;
        self
    }

    pub fn with_edge_policy(mut self, policy: EdgePolicy) -> Self {
        self.at_edges = policy;
        self
    }

    pub fn with_relative_step(mut self, step: Option<f64>) -> Self {
        self.relative_step = step;
        self
    }

    pub fn with_gsd_reduction(mut self, reduction: GsdReduction) -> Self {
        self.gsd_reduction = reduction;
        self
    }

    pub fn from_json_str(json: &str) -> DpResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_reader<R: io::Read>(reader: R) -> DpResult<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Check the settings that do not depend on other crates.
    pub fn validate(&self) -> DpResult<()> {
        if let Some(step) = self.relative_step {
            if !(step > 0.0 && step < 1.0) {
                return Err(validation_error!(
                    "relative_step must be float between 0 and 1 not {}",
                    step
                ));
            }
        }
        if let GsdReduction::Fixed(0) = self.gsd_reduction {
            return Err(validation_error!("gsd_reduction must be positive"));
        }
        if self.factors.is_empty() {
            return Err(config_error!("at least one factor is required"));
        }
        if self.responses.is_empty() {
            return Err(config_error!("at least one response is required"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factor::FactorType;
    use crate::response::Criterion;

    const SAMPLE: &str = r#"{
        "factors": {
            "temperature": {"high_init": 60, "low_init": 40, "max": 100},
            "cycles": {"high_init": 12, "low_init": 4, "type": "Ordinal"},
            "offset": {"high_init": 1, "low_init": -1, "max": "inf"}
        },
        "design_type": "CCF",
        "responses": {
            "yield": {"criterion": "maximize", "low_limit": 0, "target": 100}
        },
        "skip_screening": false
    }"#;

    #[test]
    fn parses_sample_with_defaults() {
        let config = DesignerConfig::from_json_str(SAMPLE).unwrap();
        config.validate().unwrap();

        let names: Vec<&str> = config.factors.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["temperature", "cycles", "offset"]);
        assert!(!config.skip_screening);
        assert_eq!(config.at_edges, EdgePolicy::Distort);
        assert_eq!(config.relative_step, Some(DEFAULT_RELATIVE_STEP));
        assert_eq!(config.gsd_reduction, GsdReduction::Auto);
        assert_eq!(config.responses.first().unwrap().1.criterion, Criterion::Maximize);
    }

    #[test]
    fn default_min_depends_on_sign_of_initial_values() {
        let config = DesignerConfig::from_json_str(SAMPLE).unwrap();
        let temperature = config.factors.get("temperature").unwrap();
        assert_eq!(temperature.effective_min(), 0.0);
        assert_eq!(temperature.effective_max(), 100.0);

        let offset = config.factors.get("offset").unwrap();
        assert_eq!(offset.effective_min(), f64::NEG_INFINITY);
        assert_eq!(offset.effective_max(), f64::INFINITY);
    }

    #[test]
    fn builds_typed_factors() {
        let config = DesignerConfig::from_json_str(SAMPLE).unwrap();
        let cycles = config.factors.get("cycles").unwrap().build().unwrap();
        assert_eq!(cycles.kind(), FactorType::Ordinal);
        assert_eq!(cycles.working_range().unwrap(), (4.0, 12.0));

        let bad = FactorSpec::new(0.5, 3.0).with_type("ordinal");
        assert!(matches!(bad.build(), Err(DpError::Validation(_))));

        let unknown = FactorSpec::new(0.0, 3.0).with_type("boolean");
        assert!(matches!(unknown.build(), Err(DpError::UnsupportedFactorType(_))));
    }

    #[test]
    fn rejects_invalid_edge_policy() {
        let json = SAMPLE.replace("\"skip_screening\": false", "\"at_edges\": \"wrap\"");
        assert!(DesignerConfig::from_json_str(&json).is_err());
        assert!("wrap".parse::<EdgePolicy>().is_err());
        assert_eq!("shrink".parse::<EdgePolicy>().unwrap(), EdgePolicy::Shrink);
    }

    #[test]
    fn rejects_invalid_relative_step() {
        for step in [0.0, 1.0, 1.5, -0.1] {
            let config = DesignerConfig::from_json_str(SAMPLE)
                .unwrap()
                .with_relative_step(Some(step));
            assert!(matches!(config.validate(), Err(DpError::Validation(_))));
        }

        let json = SAMPLE.replace("\"skip_screening\": false", "\"relative_step\": null");
        let config = DesignerConfig::from_json_str(&json).unwrap();
        assert_eq!(config.relative_step, None);
        config.validate().unwrap();
    }

    #[test]
    fn parses_gsd_reduction() {
        let json = SAMPLE.replace("\"skip_screening\": false", "\"gsd_reduction\": 3");
        let config = DesignerConfig::from_json_str(&json).unwrap();
        assert_eq!(config.gsd_reduction, GsdReduction::Fixed(3));

        let json = SAMPLE.replace("\"skip_screening\": false", "\"gsd_reduction\": 0");
        assert!(DesignerConfig::from_json_str(&json).is_err());

        let json = SAMPLE.replace("\"skip_screening\": false", "\"gsd_reduction\": \"most\"");
        assert!(DesignerConfig::from_json_str(&json).is_err());
    }

    #[test]
    fn empty_factors_or_responses_fail_validation() {
        let config = DesignerConfig::new("ccf").with_response("y", ResponseSpec::maximize());
        assert!(matches!(config.validate(), Err(DpError::Config(_))));

        let config = DesignerConfig::new("ccf").with_factor("x", FactorSpec::new(0.0, 1.0));
        assert!(matches!(config.validate(), Err(DpError::Config(_))));
    }

    #[test]
    fn serializes_back_in_order() {
        let config = DesignerConfig::new("boxbehnken")
            .with_factor("b", FactorSpec::new(0.0, 1.0))
            .with_factor("a", FactorSpec::new(0.0, 1.0))
            .with_response("y", ResponseSpec::minimize())
            .with_gsd_reduction(GsdReduction::Fixed(2));

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.find("\"b\"").unwrap() < json.find("\"a\"").unwrap());
        assert!(json.contains("\"gsd_reduction\":2"));
        assert!(json.contains("\"at_edges\":\"distort\""));
    }
}
