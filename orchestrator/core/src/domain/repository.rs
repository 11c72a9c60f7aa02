// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for the decision layer. Interfaces live in the
//! domain layer and are implemented in `crate::infrastructure::repositories`.
//!
//! | Trait | Stores | Implementations |
//! |-------|--------|----------------|
//! | `AuditTrailRepository` | `AuditLogEntry` | `InMemoryAuditTrailRepository`, `PostgresAuditTrailRepository`, `NullAuditTrailRepository` |
//! | `TenantDirectory` | tenant status | `InMemoryTenantDirectory`, `PostgresTenantDirectory`, `UnmanagedTenants` |
//!
//! ## Storage Backend Abstraction
//!
//! Concrete implementations are selected at startup from `EngineConfig`.
//! In-memory implementations are used for development and testing;
//! PostgreSQL implementations for production.

use async_trait::async_trait;
use ledgerline_cortex::{AgentType, TenantId};

use super::audit::{AuditLogEntry, AuditQuery, AuditStats, StatsWindow};

/// Storage backend enum for pluggable persistence
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
}

/// Append-only, tenant-partitioned decision audit log.
///
/// Every read takes the tenant explicitly; implementations must never return
/// an entry whose `tenant_id` differs from the one requested.
#[async_trait]
pub trait AuditTrailRepository: Send + Sync {
    /// Append one entry. Entries are never updated or deleted.
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), RepositoryError>;

    /// Entries for `tenant_id` matching `query`, newest first, paginated by
    /// `query.limit` / `query.offset`.
    async fn query(&self, tenant_id: TenantId, query: &AuditQuery) -> Result<Vec<AuditLogEntry>, RepositoryError>;

    /// Number of entries for `tenant_id` matching `query`, ignoring pagination.
    async fn count(&self, tenant_id: TenantId, query: &AuditQuery) -> Result<u64, RepositoryError>;

    /// Aggregate statistics computed at read time.
    async fn aggregate_stats(
        &self,
        tenant_id: TenantId,
        agent_type: &AgentType,
        window: StatsWindow,
    ) -> Result<AuditStats, RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                RepositoryError::Unavailable(err.to_string())
            }
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
