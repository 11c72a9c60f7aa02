// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Audit Trail Repository
//!
//! Production `AuditTrailRepository` backed by the append-only
//! `decision_audit_log` table (see `migrations/20260101000001_decision_audit_log.sql`).
//! Rows are only ever inserted. Statistics are aggregated by PostgreSQL at
//! read time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledgerline_cortex::{AgentType, TenantId};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::audit::{AuditEntryId, AuditLogEntry, AuditQuery, AuditStats, StatsWindow};
use crate::domain::repository::{AuditTrailRepository, RepositoryError};

pub struct PostgresAuditTrailRepository {
    pool: PgPool,
}

impl PostgresAuditTrailRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Optional filters are passed as NULL and short-circuit their predicate.
const FILTER_CLAUSE: &str = r#"
    WHERE tenant_id = $1
      AND ($2::text IS NULL OR agent_type = $2)
      AND ($3::text IS NULL OR event_type = $3)
      AND ($4::timestamptz IS NULL OR created_at >= $4)
      AND ($5::timestamptz IS NULL OR created_at <= $5)
      AND ($6::text IS NULL OR transaction_id = $6)
      AND ($7::text IS NULL OR workflow_id = $7)
"#;

#[async_trait]
impl AuditTrailRepository for PostgresAuditTrailRepository {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO decision_audit_log (
                id, tenant_id, agent_type, event_type, decision,
                confidence, source, auto_applied, details, reasoning,
                duration_ms, transaction_id, workflow_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(entry.id.0)
        .bind(entry.tenant_id.0)
        .bind(entry.agent_type.as_str())
        .bind(entry.event_type.as_str())
        .bind(&entry.decision)
        .bind(entry.confidence.map(i16::from))
        .bind(entry.source.map(|s| s.as_str()))
        .bind(entry.auto_applied)
        .bind(&entry.details)
        .bind(entry.reasoning.as_deref())
        .bind(entry.duration_ms.map(|d| i64::try_from(d).unwrap_or(i64::MAX)))
        .bind(entry.transaction_id.as_deref())
        .bind(entry.workflow_id.as_deref())
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to append audit entry: {}", e)))?;

        Ok(())
    }

    async fn query(&self, tenant_id: TenantId, query: &AuditQuery) -> Result<Vec<AuditLogEntry>, RepositoryError> {
        let sql = format!(
            r#"
            SELECT id, tenant_id, agent_type, event_type, decision,
                   confidence, source, auto_applied, details, reasoning,
                   duration_ms, transaction_id, workflow_id, created_at
            FROM decision_audit_log
            {FILTER_CLAUSE}
            ORDER BY created_at DESC, id
            LIMIT $8 OFFSET $9
            "#
        );

        let limit = query.limit.map(to_i64).unwrap_or(i64::MAX);
        let offset = query.offset.map(to_i64).unwrap_or(0);

        let rows = bind_filters(sqlx::query(&sql), tenant_id, query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn count(&self, tenant_id: TenantId, query: &AuditQuery) -> Result<u64, RepositoryError> {
        let sql = format!("SELECT COUNT(*) AS n FROM decision_audit_log {FILTER_CLAUSE}");

        let row = bind_filters(sqlx::query(&sql), tenant_id, query)
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n.max(0) as u64)
    }

    async fn aggregate_stats(
        &self,
        tenant_id: TenantId,
        agent_type: &AgentType,
        window: StatsWindow,
    ) -> Result<AuditStats, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE event_type = 'DECISION') AS total_decisions,
                COUNT(*) FILTER (WHERE event_type = 'ESCALATION') AS total_escalations,
                COUNT(*) FILTER (WHERE event_type = 'DECISION' AND auto_applied) AS auto_applied,
                (AVG(confidence) FILTER (WHERE event_type = 'DECISION'))::float8 AS avg_confidence,
                (AVG(duration_ms) FILTER (WHERE event_type = 'DECISION'))::float8 AS avg_duration_ms
            FROM decision_audit_log
            WHERE tenant_id = $1
              AND agent_type = $2
              AND created_at >= $3
              AND created_at <= $4
            "#,
        )
        .bind(tenant_id.0)
        .bind(agent_type.as_str())
        .bind(window.from)
        .bind(window.to)
        .fetch_one(&self.pool)
        .await?;

        let decisions: i64 = row.try_get("total_decisions")?;
        let escalations: i64 = row.try_get("total_escalations")?;
        let auto_applied: i64 = row.try_get("auto_applied")?;
        let avg_confidence: Option<f64> = row.try_get("avg_confidence")?;
        let avg_duration_ms: Option<f64> = row.try_get("avg_duration_ms")?;

        let decisions = decisions.max(0) as u64;
        let escalations = escalations.max(0) as u64;
        let rate = |n: u64, d: u64| if d == 0 { 0.0 } else { n as f64 / d as f64 };

        Ok(AuditStats {
            total_decisions: decisions,
            total_escalations: escalations,
            avg_confidence: avg_confidence.unwrap_or(0.0),
            avg_duration_ms: avg_duration_ms.unwrap_or(0.0),
            auto_apply_rate: rate(auto_applied.max(0) as u64, decisions),
            escalation_rate: rate(escalations, decisions + escalations),
        })
    }
}

fn bind_filters<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    tenant_id: TenantId,
    query: &'q AuditQuery,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    q.bind(tenant_id.0)
        .bind(query.agent_type.as_ref().map(|a| a.as_str()))
        .bind(query.event_type.map(|t| t.as_str()))
        .bind(query.from)
        .bind(query.to)
        .bind(query.transaction_id.as_deref())
        .bind(query.workflow_id.as_deref())
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn entry_from_row(row: &PgRow) -> Result<AuditLogEntry, RepositoryError> {
    let event_type: String = row.try_get("event_type")?;
    let source: Option<String> = row.try_get("source")?;
    let confidence: Option<i16> = row.try_get("confidence")?;
    let duration_ms: Option<i64> = row.try_get("duration_ms")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(AuditLogEntry {
        id: AuditEntryId(row.try_get("id")?),
        tenant_id: TenantId(row.try_get("tenant_id")?),
        agent_type: AgentType::new(row.try_get::<String, _>("agent_type")?),
        event_type: event_type.parse().map_err(RepositoryError::Serialization)?,
        decision: row.try_get("decision")?,
        confidence: confidence.map(|c| c.clamp(0, 100) as u8),
        source: source
            .map(|s| s.parse())
            .transpose()
            .map_err(RepositoryError::Serialization)?,
        auto_applied: row.try_get("auto_applied")?,
        details: row.try_get("details")?,
        reasoning: row.try_get("reasoning")?,
        duration_ms: duration_ms.map(|d| d.max(0) as u64),
        transaction_id: row.try_get("transaction_id")?,
        workflow_id: row.try_get("workflow_id")?,
        created_at,
    })
}
