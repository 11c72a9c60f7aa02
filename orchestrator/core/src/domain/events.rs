// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use ledgerline_cortex::{AgentType, TenantId, TrajectoryId};
use serde::{Deserialize, Serialize};

use crate::domain::audit::{AuditEntryId, AuditEventType};

/// Side effects fired by the decision hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffect {
    Trajectory,
    Audit,
    Memory,
}

impl SideEffect {
    pub fn as_str(&self) -> &'static str {
        match self {
            SideEffect::Trajectory => "trajectory",
            SideEffect::Audit => "audit",
            SideEffect::Memory => "memory",
        }
    }
}

/// Events observable by anyone subscribed to the decision event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DecisionEvent {
    TrajectoryRecorded {
        trajectory_id: TrajectoryId,
        tenant_id: TenantId,
        agent_type: AgentType,
        reward: f64,
        quality: f64,
        recorded_at: DateTime<Utc>,
    },
    DecisionAudited {
        entry_id: AuditEntryId,
        tenant_id: TenantId,
        agent_type: AgentType,
        event_type: AuditEventType,
        audited_at: DateTime<Utc>,
    },
    DecisionMemorised {
        tenant_id: TenantId,
        agent_type: AgentType,
        was_correct: bool,
        memorised_at: DateTime<Utc>,
    },
    DecisionDenied {
        tenant_id: TenantId,
        agent_type: AgentType,
        reason: String,
        denied_at: DateTime<Utc>,
    },
    CorrectionRecorded {
        tenant_id: TenantId,
        agent_type: AgentType,
        transaction_id: Option<String>,
        /// False when the correction arrived after the learning window.
        learned: bool,
        recorded_at: DateTime<Utc>,
    },
    SideEffectFailed {
        tenant_id: TenantId,
        effect: SideEffect,
        error: String,
        failed_at: DateTime<Utc>,
    },
}

impl DecisionEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            DecisionEvent::TrajectoryRecorded { tenant_id, .. }
            | DecisionEvent::DecisionAudited { tenant_id, .. }
            | DecisionEvent::DecisionMemorised { tenant_id, .. }
            | DecisionEvent::DecisionDenied { tenant_id, .. }
            | DecisionEvent::CorrectionRecorded { tenant_id, .. }
            | DecisionEvent::SideEffectFailed { tenant_id, .. } => *tenant_id,
        }
    }
}
