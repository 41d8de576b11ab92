//! Round records of an experiment designer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use dp_types::{FactorSpace, OptimizationResult, Phase};

/// One evaluated round: the snapshot it started from, the snapshot it
/// produced and the result it reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundRecord {
    pub id: Uuid,
    /// 1-based round number.
    pub round: usize,
    /// Phase the round was evaluated in.
    pub phase: Phase,
    /// Phase after the round.
    pub next_phase: Phase,
    /// Number of runs in the evaluated design.
    pub runs: usize,
    pub factors_before: FactorSpace,
    pub factors_after: FactorSpace,
    pub result: OptimizationResult,
    pub recorded_at: DateTime<Utc>,
}

impl RoundRecord {
    pub fn new(
        round: usize,
        phase: Phase,
        next_phase: Phase,
        runs: usize,
        factors_before: FactorSpace,
        factors_after: FactorSpace,
        result: OptimizationResult,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            round,
            phase,
            next_phase,
            runs,
            factors_before,
            factors_after,
            result,
            recorded_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
