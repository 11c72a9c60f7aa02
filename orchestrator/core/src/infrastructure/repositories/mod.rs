// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the repository contracts defined in
//! `crate::domain::repository` and `crate::domain::tenant`.
//!
//! ## PostgreSQL Repositories
//!
//! - **PostgresAuditTrailRepository** - `decision_audit_log` table, SQL-side aggregation
//! - **PostgresTenantDirectory** - `tenants` table
//!
//! ## In-Memory Repositories
//!
//! Lightweight implementations for testing and development:
//! - **InMemoryAuditTrailRepository** - tenant-partitioned `Vec` per tenant
//! - **InMemoryTenantDirectory** - `HashMap` of tenant status
//!
//! ## No-op Repositories
//!
//! - **NullAuditTrailRepository** - accepts writes, returns nothing

pub mod postgres_audit;
pub mod postgres_tenant;

pub use postgres_audit::PostgresAuditTrailRepository;
pub use postgres_tenant::PostgresTenantDirectory;

use async_trait::async_trait;
use ledgerline_cortex::{AgentType, TenantId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::audit::{AuditLogEntry, AuditQuery, AuditStats, StatsWindow};
use crate::domain::repository::{AuditTrailRepository, RepositoryError};
use crate::domain::tenant::{TenantDirectory, TenantStatus};

#[derive(Clone, Default)]
pub struct InMemoryAuditTrailRepository {
    entries: Arc<RwLock<HashMap<TenantId, Vec<AuditLogEntry>>>>,
}

impl InMemoryAuditTrailRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry of a tenant in insertion order.
    pub fn entries_for(&self, tenant_id: TenantId) -> Vec<AuditLogEntry> {
        self.entries.read().get(&tenant_id).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn matching(&self, tenant_id: TenantId, query: &AuditQuery) -> Vec<AuditLogEntry> {
        let entries = self.entries.read();
        let mut matched: Vec<AuditLogEntry> = entries
            .get(&tenant_id)
            .map(|list| list.iter().filter(|e| query.matches(e)).cloned().collect())
            .unwrap_or_default();
        // Newest first; the stable sort keeps later appends ahead on ties
        matched.reverse();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched
    }
}

#[async_trait]
impl AuditTrailRepository for InMemoryAuditTrailRepository {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), RepositoryError> {
        self.entries
            .write()
            .entry(entry.tenant_id)
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn query(&self, tenant_id: TenantId, query: &AuditQuery) -> Result<Vec<AuditLogEntry>, RepositoryError> {
        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(self
            .matching(tenant_id, query)
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    async fn count(&self, tenant_id: TenantId, query: &AuditQuery) -> Result<u64, RepositoryError> {
        let entries = self.entries.read();
        let count = entries
            .get(&tenant_id)
            .map(|list| list.iter().filter(|e| query.matches(e)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn aggregate_stats(
        &self,
        tenant_id: TenantId,
        agent_type: &AgentType,
        window: StatsWindow,
    ) -> Result<AuditStats, RepositoryError> {
        let entries = self.entries.read();
        let stats = match entries.get(&tenant_id) {
            Some(list) => AuditStats::from_entries(
                list.iter()
                    .filter(|e| &e.agent_type == agent_type && window.contains(e.created_at)),
            ),
            None => AuditStats::default(),
        };
        Ok(stats)
    }
}

/// Accepts every write and remembers nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditTrailRepository;

#[async_trait]
impl AuditTrailRepository for NullAuditTrailRepository {
    async fn append(&self, _entry: &AuditLogEntry) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn query(&self, _tenant_id: TenantId, _query: &AuditQuery) -> Result<Vec<AuditLogEntry>, RepositoryError> {
        Ok(Vec::new())
    }

    async fn count(&self, _tenant_id: TenantId, _query: &AuditQuery) -> Result<u64, RepositoryError> {
        Ok(0)
    }

    async fn aggregate_stats(
        &self,
        _tenant_id: TenantId,
        _agent_type: &AgentType,
        _window: StatsWindow,
    ) -> Result<AuditStats, RepositoryError> {
        Ok(AuditStats::default())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryTenantDirectory {
    tenants: Arc<RwLock<HashMap<TenantId, TenantStatus>>>,
}

impl InMemoryTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, tenant_id: TenantId, status: TenantStatus) {
        self.tenants.write().insert(tenant_id, status);
    }

    pub fn remove(&self, tenant_id: TenantId) {
        self.tenants.write().remove(&tenant_id);
    }
}

#[async_trait]
impl TenantDirectory for InMemoryTenantDirectory {
    async fn tenant_status(&self, tenant_id: TenantId) -> Result<Option<TenantStatus>, RepositoryError> {
        Ok(self.tenants.read().get(&tenant_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::AuditEventType;
    use chrono::{Duration, Utc};

    fn entry(tenant_id: TenantId, agent: &str, event_type: AuditEventType) -> AuditLogEntry {
        AuditLogEntry::new(tenant_id, AgentType::new(agent), event_type, "5200")
    }

    #[tokio::test]
    async fn test_query_is_tenant_scoped_and_newest_first() {
        // Arrange
        let repo = InMemoryAuditTrailRepository::new();
        let tenant = TenantId::new();
        let other = TenantId::new();
        let now = Utc::now();
        repo.append(&entry(tenant, "categorizer", AuditEventType::Decision).at(now - Duration::hours(2)))
            .await
            .unwrap();
        repo.append(&entry(tenant, "categorizer", AuditEventType::Decision).at(now))
            .await
            .unwrap();
        repo.append(&entry(other, "categorizer", AuditEventType::Decision).at(now))
            .await
            .unwrap();

        // Act
        let entries = repo.query(tenant, &AuditQuery::new()).await.unwrap();

        // Assert
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.tenant_id == tenant));
        assert!(entries[0].created_at >= entries[1].created_at);
    }

    #[tokio::test]
    async fn test_filters_and_pagination() {
        let repo = InMemoryAuditTrailRepository::new();
        let tenant = TenantId::new();
        for i in 0..4 {
            repo.append(
                &entry(tenant, "payment_matcher", AuditEventType::Decision)
                    .with_transaction_id(format!("tx-{i}")),
            )
            .await
            .unwrap();
        }
        repo.append(&entry(tenant, "categorizer", AuditEventType::Escalation))
            .await
            .unwrap();

        let matcher = AuditQuery::new().agent_type(AgentType::new("payment_matcher"));
        assert_eq!(repo.count(tenant, &matcher).await.unwrap(), 4);
        assert_eq!(repo.query(tenant, &matcher.clone().page(3, 0)).await.unwrap().len(), 3);
        assert_eq!(repo.query(tenant, &matcher.page(3, 3)).await.unwrap().len(), 1);

        let by_tx = repo
            .query(tenant, &AuditQuery::new().transaction_id("tx-2"))
            .await
            .unwrap();
        assert_eq!(by_tx.len(), 1);
        assert_eq!(by_tx[0].transaction_id.as_deref(), Some("tx-2"));

        let escalations = AuditQuery::new().event_type(AuditEventType::Escalation);
        assert_eq!(repo.count(tenant, &escalations).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stats_respect_agent_and_window() {
        let repo = InMemoryAuditTrailRepository::new();
        let tenant = TenantId::new();
        let now = Utc::now();
        repo.append(&entry(tenant, "categorizer", AuditEventType::Decision).with_confidence(90))
            .await
            .unwrap();
        repo.append(&entry(tenant, "categorizer", AuditEventType::Escalation))
            .await
            .unwrap();
        repo.append(
            &entry(tenant, "categorizer", AuditEventType::Decision)
                .with_confidence(10)
                .at(now - Duration::days(60)),
        )
        .await
        .unwrap();
        repo.append(&entry(tenant, "payment_matcher", AuditEventType::Decision).with_confidence(10))
            .await
            .unwrap();

        let stats = repo
            .aggregate_stats(tenant, &AgentType::new("categorizer"), StatsWindow::last(Duration::days(30)))
            .await
            .unwrap();

        assert_eq!(stats.total_decisions, 1);
        assert_eq!(stats.total_escalations, 1);
        assert!((stats.avg_confidence - 90.0).abs() < 1e-9);
        assert!((stats.escalation_rate - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_unknown_tenant_stats_are_zero() {
        let repo = InMemoryAuditTrailRepository::new();
        let stats = repo
            .aggregate_stats(TenantId::new(), &AgentType::new("categorizer"), StatsWindow::last(Duration::days(1)))
            .await
            .unwrap();
        assert_eq!(stats, AuditStats::default());
    }

    #[tokio::test]
    async fn test_tenant_directory() {
        let directory = InMemoryTenantDirectory::new();
        let tenant = TenantId::new();
        assert_eq!(directory.tenant_status(tenant).await.unwrap(), None);

        directory.set_status(tenant, TenantStatus::Cancelled);
        assert_eq!(directory.tenant_status(tenant).await.unwrap(), Some(TenantStatus::Cancelled));

        directory.remove(tenant);
        assert_eq!(directory.tenant_status(tenant).await.unwrap(), None);
    }
}
