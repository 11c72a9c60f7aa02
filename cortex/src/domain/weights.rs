// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Scoring Weights
//!
//! How much the LLM signal and the rule/pattern heuristic signal are trusted
//! when blended. Every weight pair that leaves this module satisfies
//! `heuristic >= HEURISTIC_FLOOR` and `llm + heuristic == 1.0`.

use serde::{Deserialize, Serialize};

/// Minimum share of the deterministic heuristic signal. Business-mandated;
/// not configurable.
pub const HEURISTIC_FLOOR: f64 = 0.20;

/// Process-wide default when no adaptive weights are available.
pub const DEFAULT_LLM_WEIGHT: f64 = 0.6;
pub const DEFAULT_HEURISTIC_WEIGHT: f64 = 0.4;

const SUM_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub llm: f64,
    pub heuristic: f64,
}

impl ScoringWeights {
    /// Build a weight pair and run it through [`ScoringWeights::with_safety_floor`].
    pub fn new(llm: f64, heuristic: f64) -> Self {
        Self { llm, heuristic }.with_safety_floor()
    }

    pub fn balanced() -> Self {
        Self {
            llm: 0.55,
            heuristic: 0.45,
        }
    }

    /// Normalise to a sum of 1.0, then lift the heuristic weight to the
    /// floor, shrinking the LLM weight to compensate.
    ///
    /// Negative and non-finite inputs are treated as zero; a pair that sums
    /// to zero collapses to the process defaults.
    pub fn with_safety_floor(self) -> Self {
        let llm = sanitize(self.llm);
        let heuristic = sanitize(self.heuristic);
        let sum = llm + heuristic;

        let (mut llm, mut heuristic) = if sum <= f64::EPSILON {
            (DEFAULT_LLM_WEIGHT, DEFAULT_HEURISTIC_WEIGHT)
        } else {
            (llm / sum, heuristic / sum)
        };

        if heuristic < HEURISTIC_FLOOR {
            heuristic = HEURISTIC_FLOOR;
            llm = 1.0 - HEURISTIC_FLOOR;
        }

        Self { llm, heuristic }
    }

    pub fn satisfies_floor(&self) -> bool {
        self.heuristic + SUM_TOLERANCE >= HEURISTIC_FLOOR
            && (self.llm + self.heuristic - 1.0).abs() <= 1e-6
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            llm: DEFAULT_LLM_WEIGHT,
            heuristic: DEFAULT_HEURISTIC_WEIGHT,
        }
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Where the weights used for a score came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightSourceKind {
    Adaptive,
    Default,
}

impl WeightSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightSourceKind::Adaptive => "adaptive",
            WeightSourceKind::Default => "default",
        }
    }
}
