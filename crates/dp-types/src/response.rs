//! Response specifications.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Optimization goal for a measured response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    Maximize,
    Minimize,
    /// Hit a target value inside `[low_limit, high_limit]`.
    Target,
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::Maximize => "maximize",
            Self::Minimize => "minimize",
            Self::Target => "target",
        };
        f.write_str(tag)
    }
}

fn default_priority() -> f64 {
    1.0
}

/// How one measured response is judged.
///
/// Limits are optional on the wire because each criterion only needs some of
/// them; desirability construction checks the ones it uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSpec {
    pub criterion: Criterion,
    #[serde(default)]
    pub low_limit: Option<f64>,
    #[serde(default)]
    pub high_limit: Option<f64>,
    #[serde(default)]
    pub target: Option<f64>,
    /// Desirability exponent.
    #[serde(default = "default_priority")]
    pub priority: f64,
}

impl ResponseSpec {
    pub fn new(criterion: Criterion) -> Self {
        Self {
            criterion,
            low_limit: None,
            high_limit: None,
            target: None,
            priority: default_priority(),
        }
    }

    pub fn maximize() -> Self {
        Self::new(Criterion::Maximize)
    }

    pub fn minimize() -> Self {
        Self::new(Criterion::Minimize)
    }

    pub fn target(target: f64) -> Self {
        Self::new(Criterion::Target).with_target(target)
    }

    pub fn with_limits(mut self, low_limit: f64, high_limit: f64) -> Self {
        self.low_limit = Some(low_limit);
        self.high_limit = Some(high_limit);
        self
    }

    pub fn with_low_limit(mut self, low_limit: f64) -> Self {
        self.low_limit = Some(low_limit);
        self
    }

    pub fn with_high_limit(mut self, high_limit: f64) -> Self {
        self.high_limit = Some(high_limit);
        self
    }

    pub fn with_target(mut self, target: f64) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }
}
