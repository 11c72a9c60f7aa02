// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Cortex Capability Interfaces
//!
//! Contracts for the stores the learning loop reads and writes. Each trait
//! has a no-op implementation in `crate::infrastructure` so callers can
//! always be constructed, with or without a backing store.
//!
//! | Trait | Stores | Implementations |
//! |-------|--------|----------------|
//! | `PatternIndex` | `Trajectory` | `InMemoryPatternIndex`, `NullPatternIndex` |
//! | `DecisionMemory` | `DecisionMemoryRecord` | `InMemoryDecisionMemory`, `NullDecisionMemory` |
//! | `TextEmbedder` | - | `HashingTextEmbedder` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::context::{AgentType, TenantId};
use super::embedding::ContextEmbedding;
use super::trajectory::Trajectory;

/// Neighbour returned by [`PatternIndex::find_similar`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarTrajectory {
    pub embedding: ContextEmbedding,
    pub quality: f64,
    pub reward: f64,
    pub similarity: f64,
}

/// Tenant-tagged trajectory store with approximate nearest-neighbour search.
#[async_trait]
pub trait PatternIndex: Send + Sync {
    /// Append a trajectory.
    async fn store(&self, trajectory: Trajectory) -> Result<(), CortexError>;

    /// Up to `k` trajectories of `tenant_id` nearest to `embedding`, most
    /// similar first. Empty when the index holds nothing for the tenant.
    async fn find_similar(
        &self,
        tenant_id: TenantId,
        embedding: &ContextEmbedding,
        k: usize,
    ) -> Result<Vec<SimilarTrajectory>, CortexError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryRecordId(pub Uuid);

impl MemoryRecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MemoryRecordId {
    fn default() -> Self {
        Self::new()
    }
}

/// A past decision remembered by the semantic embedding of its input excerpt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionMemoryRecord {
    pub id: MemoryRecordId,
    pub tenant_id: TenantId,
    pub agent_type: AgentType,
    pub decision: String,
    pub embedding: Vec<f32>,
    pub was_correct: bool,
    pub recorded_at: DateTime<Utc>,
}

impl DecisionMemoryRecord {
    pub fn new(
        tenant_id: TenantId,
        agent_type: AgentType,
        decision: impl Into<String>,
        embedding: Vec<f32>,
        was_correct: bool,
    ) -> Self {
        Self {
            id: MemoryRecordId::new(),
            tenant_id,
            agent_type,
            decision: decision.into(),
            embedding,
            was_correct,
            recorded_at: Utc::now(),
        }
    }
}

/// Which remembered outcomes a memory search considers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MemoryFilter {
    #[default]
    Any,
    /// Only decisions a human corrected.
    IncorrectOnly,
}

impl MemoryFilter {
    pub fn admits(&self, record: &DecisionMemoryRecord) -> bool {
        match self {
            MemoryFilter::Any => true,
            MemoryFilter::IncorrectOnly => !record.was_correct,
        }
    }
}

/// Tenant-scoped similarity index over past decisions.
#[async_trait]
pub trait DecisionMemory: Send + Sync {
    async fn remember(&self, record: DecisionMemoryRecord) -> Result<(), CortexError>;

    /// Records of `tenant_id` admitted by `filter`, with their cosine
    /// similarity to `embedding`, most similar first. The filter applies
    /// before `limit`.
    async fn search(
        &self,
        tenant_id: TenantId,
        embedding: &[f32],
        filter: MemoryFilter,
        limit: usize,
    ) -> Result<Vec<(DecisionMemoryRecord, f64)>, CortexError>;
}

/// Free-text to vector, distinct from the categorical context embedding.
/// Text with nothing to embed yields an empty vector.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, CortexError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CortexError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid embedding: {0}")]
    InvalidEmbedding(String),

    #[error("Retrieval timed out after {0} ms")]
    Timeout(u64),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CortexError {
    fn from(err: serde_json::Error) -> Self {
        CortexError::Serialization(err.to_string())
    }
}
