// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Tenant Directory
//!
//! Reads tenant status from the `tenants` table owned by tenant management.
//! This engine never writes to it.

use async_trait::async_trait;
use ledgerline_cortex::TenantId;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::domain::repository::RepositoryError;
use crate::domain::tenant::{TenantDirectory, TenantStatus};

pub struct PostgresTenantDirectory {
    pool: PgPool,
}

impl PostgresTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantDirectory for PostgresTenantDirectory {
    async fn tenant_status(&self, tenant_id: TenantId) -> Result<Option<TenantStatus>, RepositoryError> {
        let row = sqlx::query("SELECT status FROM tenants WHERE id = $1")
            .bind(tenant_id.0)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status: String = row.try_get("status")?;
        status
            .parse()
            .map(Some)
            .map_err(RepositoryError::Serialization)
    }
}
