// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Trajectory
//!
//! One learning episode: the embedded context of a decision, the signals that
//! went into it, the weights it was scored with, and whether it turned out to
//! be right. Trajectories are immutable once recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::context::TenantId;
use super::embedding::ContextEmbedding;
use super::weights::ScoringWeights;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrajectoryId(pub Uuid);

impl TrajectoryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TrajectoryId {
    fn default() -> Self {
        Self::new()
    }
}

pub const REWARD_CORRECT: f64 = 1.0;
pub const REWARD_INCORRECT: f64 = 0.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub id: TrajectoryId,
    pub tenant_id: TenantId,
    pub context_embedding: ContextEmbedding,
    /// `[llm/100, heuristic/100, final/100]`
    pub activations: Vec<f32>,
    /// `[llm_weight, heuristic_weight]` actually used for the score.
    pub attention_weights: Vec<f32>,
    pub reward: f64,
    pub quality: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Signals observed for one decision, in 0-100 confidence units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionSignals {
    pub final_confidence: u8,
    pub llm_confidence: Option<u8>,
    pub heuristic_confidence: Option<u8>,
    pub weights: ScoringWeights,
}

impl Trajectory {
    pub fn record(
        tenant_id: TenantId,
        context_embedding: ContextEmbedding,
        signals: DecisionSignals,
        was_correct: bool,
    ) -> Self {
        let final_unit = unit(signals.final_confidence);
        Self {
            id: TrajectoryId::new(),
            tenant_id,
            context_embedding,
            activations: vec![
                signals.llm_confidence.map(unit).unwrap_or(final_unit),
                signals.heuristic_confidence.map(unit).unwrap_or(final_unit),
                final_unit,
            ],
            attention_weights: vec![signals.weights.llm as f32, signals.weights.heuristic as f32],
            reward: reward_for(was_correct),
            quality: quality_of(signals.final_confidence),
            recorded_at: Utc::now(),
        }
    }
}

pub fn reward_for(was_correct: bool) -> f64 {
    if was_correct {
        REWARD_CORRECT
    } else {
        REWARD_INCORRECT
    }
}

/// Decisiveness of a final score: 0.0 at 50, 1.0 at either 0 or 100.
pub fn quality_of(confidence: u8) -> f64 {
    let c = f64::from(confidence.min(100)) / 100.0;
    (c - 0.5).abs() * 2.0
}

fn unit(confidence: u8) -> f32 {
    f32::from(confidence.min(100)) / 100.0
}
