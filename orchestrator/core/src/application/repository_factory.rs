// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates concrete store implementations from the configured storage
//! backend, keeping the domain layer free of infrastructure types.

use ledgerline_cortex::{
    DecisionMemory, HashingTextEmbedder, InMemoryDecisionMemory, InMemoryPatternIndex, NullDecisionMemory,
    NullPatternIndex, PatternIndex, TextEmbedder,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::warn;

use crate::domain::engine_config::EngineConfig;
use crate::domain::repository::{AuditTrailRepository, PostgresConfig, StorageBackend};
use crate::domain::tenant::{TenantDirectory, UnmanagedTenants};
use crate::infrastructure::repositories::{
    InMemoryAuditTrailRepository, NullAuditTrailRepository, PostgresAuditTrailRepository, PostgresTenantDirectory,
};

/// Every store the engine talks to.
#[derive(Clone)]
pub struct EngineStores {
    pub audit: Arc<dyn AuditTrailRepository>,
    pub tenants: Arc<dyn TenantDirectory>,
    pub pattern_index: Arc<dyn PatternIndex>,
    pub memory: Arc<dyn DecisionMemory>,
    pub embedder: Arc<dyn TextEmbedder>,
}

impl EngineStores {
    /// Process-local stores; every tenant is treated as active.
    pub fn in_memory() -> Self {
        Self {
            audit: Arc::new(InMemoryAuditTrailRepository::new()),
            tenants: Arc::new(UnmanagedTenants),
            pattern_index: Arc::new(InMemoryPatternIndex::new()),
            memory: Arc::new(InMemoryDecisionMemory::new()),
            embedder: Arc::new(HashingTextEmbedder::new()),
        }
    }

    /// Stores that remember nothing. The engine still scores with defaults.
    pub fn null() -> Self {
        Self {
            audit: Arc::new(NullAuditTrailRepository),
            tenants: Arc::new(UnmanagedTenants),
            pattern_index: Arc::new(NullPatternIndex),
            memory: Arc::new(NullDecisionMemory),
            embedder: Arc::new(HashingTextEmbedder::new()),
        }
    }
}

pub fn storage_backend(config: &EngineConfig) -> StorageBackend {
    match &config.database.url {
        Some(url) => StorageBackend::PostgreSQL(PostgresConfig {
            connection_string: url.clone(),
        }),
        None => StorageBackend::InMemory,
    }
}

/// Creates an AuditTrailRepository implementation based on the configured backend
pub fn create_audit_repository(backend: &StorageBackend, pool: Option<PgPool>) -> Arc<dyn AuditTrailRepository> {
    match (backend, pool) {
        (StorageBackend::PostgreSQL(_), Some(pool)) => Arc::new(PostgresAuditTrailRepository::new(pool)),
        (StorageBackend::PostgreSQL(_), None) => {
            warn!("PostgreSQL backend configured without a connection pool, audit trail kept in memory");
            Arc::new(InMemoryAuditTrailRepository::new())
        }
        (StorageBackend::InMemory, _) => Arc::new(InMemoryAuditTrailRepository::new()),
    }
}

/// Creates a TenantDirectory implementation based on the configured backend
pub fn create_tenant_directory(backend: &StorageBackend, pool: Option<PgPool>) -> Arc<dyn TenantDirectory> {
    match (backend, pool) {
        (StorageBackend::PostgreSQL(_), Some(pool)) => Arc::new(PostgresTenantDirectory::new(pool)),
        _ => Arc::new(UnmanagedTenants),
    }
}

/// Stores for `backend`. The pattern index and decision memory are always
/// process-local.
pub fn create_stores(backend: &StorageBackend, pool: Option<PgPool>) -> EngineStores {
    EngineStores {
        audit: create_audit_repository(backend, pool.clone()),
        tenants: create_tenant_directory(backend, pool),
        ..EngineStores::in_memory()
    }
}
