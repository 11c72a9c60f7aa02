// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Decision Audit Trail
//!
//! Write side: `log_*` never fail and never wait for the store. Each spawns
//! the write and hands back its handle, which callers may drop. A write that
//! the repository rejects is logged, counted in
//! `ledgerline_audit_write_failures_total` and dropped; there is no retry
//! queue.
//!
//! Read side: queries go straight to the repository and return its errors,
//! so callers can tell an empty result from a store that is down. Page sizes
//! are clamped to the configured maximum.

use chrono::Utc;
use ledgerline_cortex::{AgentType, TenantId};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::domain::audit::{AuditEventType, AuditLogEntry, AuditQuery, AuditStats, StatsWindow};
use crate::domain::engine_config::AuditConfig;
use crate::domain::events::DecisionEvent;
use crate::domain::repository::{AuditTrailRepository, RepositoryError};
use crate::infrastructure::event_bus::EventBus;

#[derive(Clone)]
pub struct DecisionAuditTrail {
    repository: Arc<dyn AuditTrailRepository>,
    config: AuditConfig,
    event_bus: Option<EventBus>,
}

impl DecisionAuditTrail {
    pub fn new(repository: Arc<dyn AuditTrailRepository>) -> Self {
        Self {
            repository,
            config: AuditConfig::default(),
            event_bus: None,
        }
    }

    pub fn with_config(mut self, config: AuditConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn log_decision(&self, entry: AuditLogEntry) -> Option<JoinHandle<()>> {
        self.spawn_record(force(entry, AuditEventType::Decision))
    }

    pub fn log_escalation(&self, entry: AuditLogEntry) -> Option<JoinHandle<()>> {
        self.spawn_record(force(entry, AuditEventType::Escalation))
    }

    pub fn log_correction(&self, entry: AuditLogEntry) -> Option<JoinHandle<()>> {
        self.spawn_record(force(entry, AuditEventType::Correction))
    }

    /// Accepts WORKFLOW_START and WORKFLOW_END; anything else is recorded as
    /// WORKFLOW_START.
    pub fn log_workflow(&self, mut entry: AuditLogEntry) -> Option<JoinHandle<()>> {
        if !entry.event_type.is_workflow() {
            warn!(
                tenant_id = %entry.tenant_id,
                event_type = %entry.event_type,
                "Non-workflow event passed to log_workflow, recording as WORKFLOW_START"
            );
            entry.event_type = AuditEventType::WorkflowStart;
        }
        self.spawn_record(entry)
    }

    /// `None` outside a tokio runtime, in which case the entry is dropped.
    fn spawn_record(&self, entry: AuditLogEntry) -> Option<JoinHandle<()>> {
        let Ok(runtime) = Handle::try_current() else {
            warn!(
                tenant_id = %entry.tenant_id,
                event_type = %entry.event_type,
                "No async runtime available, audit entry dropped"
            );
            return None;
        };

        let trail = self.clone();
        Some(runtime.spawn(async move {
            let _ = trail.record(entry).await;
        }))
    }

    /// Append one entry as-is. Failures are logged and counted here; the
    /// error is returned only so that callers composing side effects can
    /// report which one failed.
    pub async fn record(&self, entry: AuditLogEntry) -> Result<(), RepositoryError> {
        match self.repository.append(&entry).await {
            Ok(()) => {
                debug!(
                    tenant_id = %entry.tenant_id,
                    agent_type = %entry.agent_type,
                    event_type = %entry.event_type,
                    "Audit entry written"
                );
                if let Some(bus) = &self.event_bus {
                    bus.publish(DecisionEvent::DecisionAudited {
                        entry_id: entry.id,
                        tenant_id: entry.tenant_id,
                        agent_type: entry.agent_type.clone(),
                        event_type: entry.event_type,
                        audited_at: Utc::now(),
                    });
                }
                Ok(())
            }
            Err(e) => {
                metrics::counter!("ledgerline_audit_write_failures_total").increment(1);
                error!(
                    tenant_id = %entry.tenant_id,
                    agent_type = %entry.agent_type,
                    event_type = %entry.event_type,
                    error = %e,
                    "Failed to write audit entry"
                );
                Err(e)
            }
        }
    }

    /// Entries of `tenant_id` matching `query`, newest first.
    pub async fn query(&self, tenant_id: TenantId, query: &AuditQuery) -> Result<Vec<AuditLogEntry>, RepositoryError> {
        let query = self.paginate(query);
        let mut entries = self.repository.query(tenant_id, &query).await?;

        let before = entries.len();
        entries.retain(|e| e.tenant_id == tenant_id);
        if entries.len() != before {
            error!(
                tenant_id = %tenant_id,
                dropped = before - entries.len(),
                "Audit repository returned entries of another tenant"
            );
        }
        Ok(entries)
    }

    pub async fn count(&self, tenant_id: TenantId, query: &AuditQuery) -> Result<u64, RepositoryError> {
        self.repository.count(tenant_id, query).await
    }

    pub async fn aggregate_stats(
        &self,
        tenant_id: TenantId,
        agent_type: &AgentType,
        window: StatsWindow,
    ) -> Result<AuditStats, RepositoryError> {
        self.repository.aggregate_stats(tenant_id, agent_type, window).await
    }

    fn paginate(&self, query: &AuditQuery) -> AuditQuery {
        let limit = match query.limit {
            Some(0) | None => self.config.default_page_size,
            Some(n) => n,
        }
        .min(self.config.max_page_size);

        AuditQuery {
            limit: Some(limit),
            offset: Some(query.offset.unwrap_or(0)),
            ..query.clone()
        }
    }
}

fn force(mut entry: AuditLogEntry, event_type: AuditEventType) -> AuditLogEntry {
    if entry.event_type != event_type {
        debug!(
            from = %entry.event_type,
            to = %event_type,
            "Overriding audit entry event type"
        );
        entry.event_type = event_type;
    }
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::{InMemoryAuditTrailRepository, NullAuditTrailRepository};
    use async_trait::async_trait;

    struct FailingRepository;

    #[async_trait]
    impl AuditTrailRepository for FailingRepository {
        async fn append(&self, _entry: &AuditLogEntry) -> Result<(), RepositoryError> {
            Err(RepositoryError::Unavailable("down".to_string()))
        }

        async fn query(&self, _t: TenantId, _q: &AuditQuery) -> Result<Vec<AuditLogEntry>, RepositoryError> {
            Err(RepositoryError::Unavailable("down".to_string()))
        }

        async fn count(&self, _t: TenantId, _q: &AuditQuery) -> Result<u64, RepositoryError> {
            Err(RepositoryError::Unavailable("down".to_string()))
        }

        async fn aggregate_stats(
            &self,
            _t: TenantId,
            _a: &AgentType,
            _w: StatsWindow,
        ) -> Result<AuditStats, RepositoryError> {
            Err(RepositoryError::Unavailable("down".to_string()))
        }
    }

    /// Ignores the tenant filter on reads.
    struct LeakyRepository(Vec<AuditLogEntry>);

    #[async_trait]
    impl AuditTrailRepository for LeakyRepository {
        async fn append(&self, _entry: &AuditLogEntry) -> Result<(), RepositoryError> {
            Ok(())
        }

        async fn query(&self, _t: TenantId, _q: &AuditQuery) -> Result<Vec<AuditLogEntry>, RepositoryError> {
            Ok(self.0.clone())
        }

        async fn count(&self, _t: TenantId, _q: &AuditQuery) -> Result<u64, RepositoryError> {
            Ok(self.0.len() as u64)
        }

        async fn aggregate_stats(
            &self,
            _t: TenantId,
            _a: &AgentType,
            _w: StatsWindow,
        ) -> Result<AuditStats, RepositoryError> {
            Ok(AuditStats::default())
        }
    }

    fn entry(tenant_id: TenantId, event_type: AuditEventType) -> AuditLogEntry {
        AuditLogEntry::new(tenant_id, AgentType::new("categorizer"), event_type, "5200")
    }

    async fn settle(handle: Option<JoinHandle<()>>) {
        handle.expect("runtime is available").await.unwrap();
    }

    /// Accepts writes only after the gate opens.
    struct GatedRepository {
        inner: InMemoryAuditTrailRepository,
        gate: tokio::sync::Notify,
    }

    #[async_trait]
    impl AuditTrailRepository for GatedRepository {
        async fn append(&self, entry: &AuditLogEntry) -> Result<(), RepositoryError> {
            self.gate.notified().await;
            self.inner.append(entry).await
        }

        async fn query(&self, t: TenantId, q: &AuditQuery) -> Result<Vec<AuditLogEntry>, RepositoryError> {
            self.inner.query(t, q).await
        }

        async fn count(&self, t: TenantId, q: &AuditQuery) -> Result<u64, RepositoryError> {
            self.inner.count(t, q).await
        }

        async fn aggregate_stats(
            &self,
            t: TenantId,
            a: &AgentType,
            w: StatsWindow,
        ) -> Result<AuditStats, RepositoryError> {
            self.inner.aggregate_stats(t, a, w).await
        }
    }

    #[tokio::test]
    async fn test_log_methods_force_event_type() {
        // Arrange
        let repo = Arc::new(InMemoryAuditTrailRepository::new());
        let trail = DecisionAuditTrail::new(repo.clone());
        let tenant = TenantId::new();

        // Act
        settle(trail.log_decision(entry(tenant, AuditEventType::Escalation))).await;
        settle(trail.log_escalation(entry(tenant, AuditEventType::Decision))).await;
        settle(trail.log_correction(entry(tenant, AuditEventType::Decision))).await;
        settle(trail.log_workflow(entry(tenant, AuditEventType::WorkflowEnd))).await;
        settle(trail.log_workflow(entry(tenant, AuditEventType::Decision))).await;

        // Assert
        let mut types: Vec<_> = repo.entries_for(tenant).into_iter().map(|e| e.event_type).collect();
        types.sort_by_key(|t| t.as_str());
        assert_eq!(
            types,
            vec![
                AuditEventType::Correction,
                AuditEventType::Decision,
                AuditEventType::Escalation,
                AuditEventType::WorkflowEnd,
                AuditEventType::WorkflowStart,
            ]
        );
    }

    #[tokio::test]
    async fn test_write_failures_are_swallowed() {
        let trail = DecisionAuditTrail::new(Arc::new(FailingRepository));
        let tenant = TenantId::new();

        settle(trail.log_decision(entry(tenant, AuditEventType::Decision))).await;
        assert!(trail.record(entry(tenant, AuditEventType::Decision)).await.is_err());
    }

    #[tokio::test]
    async fn test_log_returns_before_the_write_lands() {
        // Arrange
        let repo = Arc::new(GatedRepository {
            inner: InMemoryAuditTrailRepository::new(),
            gate: tokio::sync::Notify::new(),
        });
        let trail = DecisionAuditTrail::new(repo.clone());
        let tenant = TenantId::new();

        // Act
        let handle = trail.log_decision(entry(tenant, AuditEventType::Decision));

        // Assert
        assert!(repo.inner.entries_for(tenant).is_empty());
        repo.gate.notify_one();
        settle(handle).await;
        assert_eq!(repo.inner.entries_for(tenant).len(), 1);
    }

    #[test]
    fn test_log_outside_runtime_is_dropped() {
        let trail = DecisionAuditTrail::new(Arc::new(NullAuditTrailRepository));
        assert!(trail.log_decision(entry(TenantId::new(), AuditEventType::Decision)).is_none());
    }

    #[tokio::test]
    async fn test_read_failures_are_returned() {
        let trail = DecisionAuditTrail::new(Arc::new(FailingRepository));
        let result = trail.query(TenantId::new(), &AuditQuery::new()).await;
        assert!(matches!(result, Err(RepositoryError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_query_never_leaks_other_tenants() {
        let mine = TenantId::new();
        let theirs = TenantId::new();
        let trail = DecisionAuditTrail::new(Arc::new(LeakyRepository(vec![
            entry(mine, AuditEventType::Decision),
            entry(theirs, AuditEventType::Decision),
        ])));

        let entries = trail.query(mine, &AuditQuery::new()).await.unwrap();

        assert_eq!(entries.len(), 1);
        assert!(entries.iter().all(|e| e.tenant_id == mine));
    }

    #[tokio::test]
    async fn test_page_size_is_clamped() {
        let repo = Arc::new(InMemoryAuditTrailRepository::new());
        let trail = DecisionAuditTrail::new(repo.clone()).with_config(AuditConfig {
            default_page_size: 2,
            max_page_size: 3,
        });
        let tenant = TenantId::new();
        for _ in 0..5 {
            settle(trail.log_decision(entry(tenant, AuditEventType::Decision))).await;
        }

        assert_eq!(trail.query(tenant, &AuditQuery::new()).await.unwrap().len(), 2);
        assert_eq!(trail.query(tenant, &AuditQuery::new().page(100, 0)).await.unwrap().len(), 3);
        assert_eq!(trail.query(tenant, &AuditQuery::new().page(3, 4)).await.unwrap().len(), 1);
        assert_eq!(trail.count(tenant, &AuditQuery::new()).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_successful_write_is_published() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe();
        let trail = DecisionAuditTrail::new(Arc::new(NullAuditTrailRepository)).with_event_bus(bus);
        let tenant = TenantId::new();

        settle(trail.log_escalation(entry(tenant, AuditEventType::Escalation))).await;

        match receiver.recv().await.unwrap() {
            DecisionEvent::DecisionAudited { tenant_id, event_type, .. } => {
                assert_eq!(tenant_id, tenant);
                assert_eq!(event_type, AuditEventType::Escalation);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
