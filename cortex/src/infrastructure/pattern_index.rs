// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0
//! In-memory pattern index
//!
//! Flat, append-only trajectory set partitioned by tenant. Retrieval is an
//! exact cosine scan over the tenant's partition, which is fast enough for the
//! small `k` and per-tenant volumes the weight engine works with.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements `PatternIndex` for single-process deployments and tests

use async_trait::async_trait;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::domain::embedding::{ContextEmbedding, EMBEDDING_DIM};
use crate::domain::repository::{CortexError, PatternIndex, SimilarTrajectory};
use crate::domain::context::TenantId;
use crate::domain::trajectory::Trajectory;

#[derive(Clone, Default)]
pub struct InMemoryPatternIndex {
    partitions: Arc<RwLock<HashMap<TenantId, Vec<Trajectory>>>>,
}

impl InMemoryPatternIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of trajectories held for a tenant.
    pub fn len_for(&self, tenant_id: TenantId) -> usize {
        self.partitions
            .read()
            .get(&tenant_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.partitions.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every stored trajectory, for warm-start export.
    pub fn snapshot(&self) -> Vec<Trajectory> {
        self.partitions
            .read()
            .values()
            .flat_map(|v| v.iter().cloned())
            .collect()
    }

    /// Append a previously exported snapshot. Trajectories with a foreign
    /// dimension are skipped.
    pub fn restore(&self, trajectories: Vec<Trajectory>) -> usize {
        let mut partitions = self.partitions.write();
        let mut restored = 0;
        for trajectory in trajectories {
            if trajectory.context_embedding.dimension() != EMBEDDING_DIM {
                debug!(id = ?trajectory.id, "Skipping trajectory with foreign embedding dimension");
                continue;
            }
            partitions
                .entry(trajectory.tenant_id)
                .or_default()
                .push(trajectory);
            restored += 1;
        }
        restored
    }
}

#[async_trait]
impl PatternIndex for InMemoryPatternIndex {
    async fn store(&self, trajectory: Trajectory) -> Result<(), CortexError> {
        if trajectory.context_embedding.dimension() != EMBEDDING_DIM {
            return Err(CortexError::InvalidEmbedding(format!(
                "expected {} dimensions, got {}",
                EMBEDDING_DIM,
                trajectory.context_embedding.dimension()
            )));
        }

        self.partitions
            .write()
            .entry(trajectory.tenant_id)
            .or_default()
            .push(trajectory);
        Ok(())
    }

    async fn find_similar(
        &self,
        tenant_id: TenantId,
        embedding: &ContextEmbedding,
        k: usize,
    ) -> Result<Vec<SimilarTrajectory>, CortexError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let partitions = self.partitions.read();
        let Some(partition) = partitions.get(&tenant_id) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<(f64, &Trajectory)> = partition
            .iter()
            .filter_map(|t| {
                t.context_embedding
                    .cosine_similarity(embedding)
                    .map(|score| (score, t))
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(similarity, t)| SimilarTrajectory {
                embedding: t.context_embedding.clone(),
                quality: t.quality,
                reward: t.reward,
                similarity,
            })
            .collect())
    }
}

/// Index used when no trajectory store is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPatternIndex;

#[async_trait]
impl PatternIndex for NullPatternIndex {
    async fn store(&self, _trajectory: Trajectory) -> Result<(), CortexError> {
        Ok(())
    }

    async fn find_similar(
        &self,
        _tenant_id: TenantId,
        _embedding: &ContextEmbedding,
        _k: usize,
    ) -> Result<Vec<SimilarTrajectory>, CortexError> {
        Ok(Vec::new())
    }
}
