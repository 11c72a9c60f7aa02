// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0

//! In-memory decision memory
//!
//! Semantic similarity index over past decisions, keyed by the text embedding
//! of their input excerpt. Used by the pre-decision hook to spot inputs that
//! resemble decisions a human later corrected.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::context::TenantId;
use crate::domain::embedding::cosine_similarity;
use crate::domain::repository::{CortexError, DecisionMemory, DecisionMemoryRecord, MemoryFilter};

#[derive(Clone, Default)]
pub struct InMemoryDecisionMemory {
    records: Arc<RwLock<HashMap<TenantId, Vec<DecisionMemoryRecord>>>>,
}

impl InMemoryDecisionMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len_for(&self, tenant_id: TenantId) -> usize {
        self.records
            .read()
            .get(&tenant_id)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl DecisionMemory for InMemoryDecisionMemory {
    async fn remember(&self, record: DecisionMemoryRecord) -> Result<(), CortexError> {
        if record.embedding.is_empty() {
            return Err(CortexError::InvalidEmbedding("embedding is empty".to_string()));
        }
        self.records
            .write()
            .entry(record.tenant_id)
            .or_default()
            .push(record);
        Ok(())
    }

    async fn search(
        &self,
        tenant_id: TenantId,
        embedding: &[f32],
        filter: MemoryFilter,
        limit: usize,
    ) -> Result<Vec<(DecisionMemoryRecord, f64)>, CortexError> {
        let records = self.records.read();
        let Some(partition) = records.get(&tenant_id) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<(DecisionMemoryRecord, f64)> = partition
            .iter()
            .filter(|r| filter.admits(r))
            .filter_map(|r| cosine_similarity(&r.embedding, embedding).map(|s| (r.clone(), s)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }
}

/// Memory used when no similarity index is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDecisionMemory;

#[async_trait]
impl DecisionMemory for NullDecisionMemory {
    async fn remember(&self, _record: DecisionMemoryRecord) -> Result<(), CortexError> {
        Ok(())
    }

    async fn search(
        &self,
        _tenant_id: TenantId,
        _embedding: &[f32],
        _filter: MemoryFilter,
        _limit: usize,
    ) -> Result<Vec<(DecisionMemoryRecord, f64)>, CortexError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::AgentType;

    #[tokio::test]
    async fn test_search_is_tenant_scoped_and_ranked() {
        let memory = InMemoryDecisionMemory::new();
        let tenant = TenantId::new();
        let agent = AgentType::new("categorizer");

        memory
            .remember(DecisionMemoryRecord::new(tenant, agent.clone(), "fees", vec![1.0, 0.0], false))
            .await
            .unwrap();
        memory
            .remember(DecisionMemoryRecord::new(tenant, agent.clone(), "salary", vec![0.6, 0.8], true))
            .await
            .unwrap();
        memory
            .remember(DecisionMemoryRecord::new(TenantId::new(), agent, "other", vec![1.0, 0.0], false))
            .await
            .unwrap();

        let hits = memory.search(tenant, &[1.0, 0.0], MemoryFilter::Any, 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0.decision, "fees");
        assert!((hits[0].1 - 1.0).abs() < 1e-9);
        assert!((hits[1].1 - 0.6).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_incorrect_only_filter_applies_before_limit() {
        // Arrange
        let memory = InMemoryDecisionMemory::new();
        let tenant = TenantId::new();
        let agent = AgentType::new("categorizer");
        for _ in 0..8 {
            memory
                .remember(DecisionMemoryRecord::new(tenant, agent.clone(), "fees", vec![1.0, 0.0], true))
                .await
                .unwrap();
        }
        memory
            .remember(DecisionMemoryRecord::new(tenant, agent, "salary", vec![0.9, 0.1], false))
            .await
            .unwrap();

        // Act
        let any = memory.search(tenant, &[1.0, 0.0], MemoryFilter::Any, 5).await.unwrap();
        let corrected = memory
            .search(tenant, &[1.0, 0.0], MemoryFilter::IncorrectOnly, 5)
            .await
            .unwrap();

        // Assert
        assert_eq!(any.len(), 5);
        assert!(any.iter().all(|(r, _)| r.was_correct));
        assert_eq!(corrected.len(), 1);
        assert_eq!(corrected[0].0.decision, "salary");
    }

    #[tokio::test]
    async fn test_rejects_empty_embedding() {
        let memory = InMemoryDecisionMemory::new();
        let record = DecisionMemoryRecord::new(TenantId::new(), "categorizer".into(), "x", vec![], true);
        assert!(memory.remember(record).await.is_err());
    }
}
