// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Decision Audit Log
//!
//! Append-only, tenant-partitioned record of what the agents decided, when
//! they escalated, when a human corrected them and when a workflow started or
//! ended. Entries are never updated or deleted.
//!
//! `details` is an opaque JSON object. Callers must not put personal data in
//! it; the log is retained for compliance and is readable by operators.

use chrono::{DateTime, Duration, Utc};
use ledgerline_cortex::{AgentType, TenantId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditEntryId(pub Uuid);

impl AuditEntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AuditEntryId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    Decision,
    Escalation,
    Correction,
    WorkflowStart,
    WorkflowEnd,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::Decision => "DECISION",
            AuditEventType::Escalation => "ESCALATION",
            AuditEventType::Correction => "CORRECTION",
            AuditEventType::WorkflowStart => "WORKFLOW_START",
            AuditEventType::WorkflowEnd => "WORKFLOW_END",
        }
    }

    pub fn is_workflow(&self) -> bool {
        matches!(self, AuditEventType::WorkflowStart | AuditEventType::WorkflowEnd)
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DECISION" => Ok(AuditEventType::Decision),
            "ESCALATION" => Ok(AuditEventType::Escalation),
            "CORRECTION" => Ok(AuditEventType::Correction),
            "WORKFLOW_START" => Ok(AuditEventType::WorkflowStart),
            "WORKFLOW_END" => Ok(AuditEventType::WorkflowEnd),
            other => Err(format!("unknown audit event type: {other}")),
        }
    }
}

/// Which upstream produced the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionSource {
    Llm,
    Pattern,
    Historical,
    Hybrid,
    Rule,
}

impl DecisionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionSource::Llm => "LLM",
            DecisionSource::Pattern => "PATTERN",
            DecisionSource::Historical => "HISTORICAL",
            DecisionSource::Hybrid => "HYBRID",
            DecisionSource::Rule => "RULE",
        }
    }
}

impl FromStr for DecisionSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LLM" => Ok(DecisionSource::Llm),
            "PATTERN" => Ok(DecisionSource::Pattern),
            "HISTORICAL" => Ok(DecisionSource::Historical),
            "HYBRID" => Ok(DecisionSource::Hybrid),
            "RULE" => Ok(DecisionSource::Rule),
            other => Err(format!("unknown decision source: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: AuditEntryId,
    pub tenant_id: TenantId,
    pub agent_type: AgentType,
    pub event_type: AuditEventType,
    pub decision: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<DecisionSource>,
    pub auto_applied: bool,
    #[serde(default)]
    pub details: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(
        tenant_id: TenantId,
        agent_type: AgentType,
        event_type: AuditEventType,
        decision: impl Into<String>,
    ) -> Self {
        Self {
            id: AuditEntryId::new(),
            tenant_id,
            agent_type,
            event_type,
            decision: decision.into(),
            confidence: None,
            source: None,
            auto_applied: false,
            details: serde_json::Value::Object(Default::default()),
            reasoning: None,
            duration_ms: None,
            transaction_id: None,
            workflow_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_confidence(mut self, confidence: u8) -> Self {
        self.confidence = Some(confidence.min(100));
        self
    }

    pub fn with_source(mut self, source: DecisionSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_auto_applied(mut self, auto_applied: bool) -> Self {
        self.auto_applied = auto_applied;
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// Filters for [`crate::domain::repository::AuditTrailRepository::query`].
/// All filters are conjunctive; `None` means "any".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditQuery {
    pub agent_type: Option<AgentType>,
    pub event_type: Option<AuditEventType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub transaction_id: Option<String>,
    pub workflow_id: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl AuditQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn agent_type(mut self, agent_type: AgentType) -> Self {
        self.agent_type = Some(agent_type);
        self
    }

    pub fn event_type(mut self, event_type: AuditEventType) -> Self {
        self.event_type = Some(event_type);
        self
    }

    pub fn since(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    pub fn until(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    pub fn transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    /// Whether an entry passes every filter. Pagination is not applied here.
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        self.agent_type.as_ref().is_none_or(|a| &entry.agent_type == a)
            && self.event_type.is_none_or(|t| entry.event_type == t)
            && self.from.is_none_or(|from| entry.created_at >= from)
            && self.to.is_none_or(|to| entry.created_at <= to)
            && self
                .transaction_id
                .as_ref()
                .is_none_or(|id| entry.transaction_id.as_ref() == Some(id))
            && self
                .workflow_id
                .as_ref()
                .is_none_or(|id| entry.workflow_id.as_ref() == Some(id))
    }
}

/// Closed time range for aggregate statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl StatsWindow {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// The window ending now and reaching back `span`, clamped to the
    /// Unix epoch.
    pub fn last(span: Duration) -> Self {
        let to = Utc::now();
        let from = to.checked_sub_signed(span).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        Self { from, to }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.from && at <= self.to
    }
}

/// Read-time aggregate over DECISION and ESCALATION entries in a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditStats {
    pub total_decisions: u64,
    pub total_escalations: u64,
    /// Mean confidence of DECISION entries that carry one.
    pub avg_confidence: f64,
    /// Mean duration of DECISION entries that carry one.
    pub avg_duration_ms: f64,
    /// Share of DECISION entries that were applied without review.
    pub auto_apply_rate: f64,
    /// ESCALATION entries as a share of DECISION + ESCALATION entries.
    pub escalation_rate: f64,
}

impl AuditStats {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a AuditLogEntry>) -> Self {
        let mut decisions = 0u64;
        let mut escalations = 0u64;
        let mut auto_applied = 0u64;
        let (mut confidence_sum, mut confidence_n) = (0.0f64, 0u64);
        let (mut duration_sum, mut duration_n) = (0.0f64, 0u64);

        for entry in entries {
            match entry.event_type {
                AuditEventType::Decision => {
                    decisions += 1;
                    if entry.auto_applied {
                        auto_applied += 1;
                    }
                    if let Some(c) = entry.confidence {
                        confidence_sum += f64::from(c);
                        confidence_n += 1;
                    }
                    if let Some(d) = entry.duration_ms {
                        duration_sum += d as f64;
                        duration_n += 1;
                    }
                }
                AuditEventType::Escalation => escalations += 1,
                _ => {}
            }
        }

        Self {
            total_decisions: decisions,
            total_escalations: escalations,
            avg_confidence: ratio(confidence_sum, confidence_n),
            avg_duration_ms: ratio(duration_sum, duration_n),
            auto_apply_rate: ratio(auto_applied as f64, decisions),
            escalation_rate: ratio(escalations as f64, decisions + escalations),
        }
    }
}

fn ratio(numerator: f64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator / denominator as f64
    }
}
