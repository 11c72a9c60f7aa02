// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Tenant status as reported by the tenant-management collaborator, and the
//! lookup contract the pre-decision gate uses.

use async_trait::async_trait;
use ledgerline_cortex::TenantId;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::repository::RepositoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenantStatus {
    Trial,
    Active,
    Suspended,
    Cancelled,
    Terminated,
}

impl TenantStatus {
    /// Cancelled and terminated tenants may not have decisions made for them.
    pub fn permits_decisions(&self) -> bool {
        !matches!(self, TenantStatus::Cancelled | TenantStatus::Terminated)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Trial => "TRIAL",
            TenantStatus::Active => "ACTIVE",
            TenantStatus::Suspended => "SUSPENDED",
            TenantStatus::Cancelled => "CANCELLED",
            TenantStatus::Terminated => "TERMINATED",
        }
    }
}

impl FromStr for TenantStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TRIAL" => Ok(TenantStatus::Trial),
            "ACTIVE" => Ok(TenantStatus::Active),
            "SUSPENDED" => Ok(TenantStatus::Suspended),
            "CANCELLED" | "CANCELED" => Ok(TenantStatus::Cancelled),
            "TERMINATED" => Ok(TenantStatus::Terminated),
            other => Err(format!("unknown tenant status: {other}")),
        }
    }
}

/// Tenant-management lookup.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// `Ok(None)` when the tenant does not exist.
    async fn tenant_status(&self, tenant_id: TenantId) -> Result<Option<TenantStatus>, RepositoryError>;
}

/// Directory for deployments without tenant management: every tenant is active.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnmanagedTenants;

#[async_trait]
impl TenantDirectory for UnmanagedTenants {
    async fn tenant_status(&self, _tenant_id: TenantId) -> Result<Option<TenantStatus>, RepositoryError> {
        Ok(Some(TenantStatus::Active))
    }
}
