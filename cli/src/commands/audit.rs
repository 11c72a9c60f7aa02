// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Audit trail commands
//!
//! Commands: query, stats. Both read the PostgreSQL audit table directly
//! through the same repository the engine writes with.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use ledgerline_core::application::DecisionAuditTrail;
use ledgerline_core::cortex::{AgentType, TenantId};
use ledgerline_core::domain::audit::{AuditEventType, AuditQuery, StatsWindow};
use ledgerline_core::domain::engine_config::EngineConfig;
use ledgerline_core::infrastructure::repositories::PostgresAuditTrailRepository;
use ledgerline_core::infrastructure::Database;

#[derive(Subcommand)]
pub enum AuditCommand {
    /// List audit entries for a tenant, newest first
    Query {
        #[arg(long)]
        tenant: String,

        #[arg(long)]
        agent_type: Option<String>,

        /// DECISION, ESCALATION, CORRECTION, WORKFLOW_START or WORKFLOW_END
        #[arg(long)]
        event_type: Option<String>,

        #[arg(long)]
        transaction_id: Option<String>,

        #[arg(long)]
        workflow_id: Option<String>,

        /// Only entries from the last N days
        #[arg(long)]
        days: Option<i64>,

        #[arg(long, default_value = "50")]
        limit: usize,

        #[arg(long, default_value = "0")]
        offset: usize,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,

        #[arg(long, env = "LEDGERLINE_DATABASE_URL", hide_env_values = true)]
        database_url: Option<String>,
    },

    /// Aggregate statistics for a tenant and agent type
    Stats {
        #[arg(long)]
        tenant: String,

        #[arg(long)]
        agent_type: String,

        #[arg(long, default_value = "30")]
        days: i64,

        #[arg(long, env = "LEDGERLINE_DATABASE_URL", hide_env_values = true)]
        database_url: Option<String>,
    },
}

pub async fn handle_command(command: AuditCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        AuditCommand::Query {
            tenant,
            agent_type,
            event_type,
            transaction_id,
            workflow_id,
            days,
            limit,
            offset,
            json,
            database_url,
        } => {
            let tenant_id = parse_tenant(&tenant)?;
            let query = build_query(agent_type, event_type, transaction_id, workflow_id, days, limit, offset)?;
            let trail = connect(config_override, database_url).await?;

            let entries = trail.query(tenant_id, &query).await.context("Audit query failed")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }
            if entries.is_empty() {
                println!("{}", "No audit entries found.".dimmed());
                return Ok(());
            }
            for entry in &entries {
                println!(
                    "{}  {:<14} {:<16} {:<12} conf={:<4} auto={}",
                    entry.created_at.format("%Y-%m-%d %H:%M:%S"),
                    entry.event_type.to_string().bold(),
                    entry.agent_type,
                    entry.decision,
                    entry.confidence.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
                    entry.auto_applied,
                );
            }
            Ok(())
        }
        AuditCommand::Stats {
            tenant,
            agent_type,
            days,
            database_url,
        } => {
            let tenant_id = parse_tenant(&tenant)?;
            if days <= 0 {
                anyhow::bail!("--days must be positive");
            }
            let trail = connect(config_override, database_url).await?;

            let span = Duration::try_days(days).unwrap_or(Duration::MAX);
            let stats = trail
                .aggregate_stats(tenant_id, &AgentType::new(agent_type), StatsWindow::last(span))
                .await
                .context("Failed to aggregate audit statistics")?;

            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
    }
}

fn parse_tenant(raw: &str) -> Result<TenantId> {
    TenantId::from_string(raw).with_context(|| format!("Invalid tenant id: {}", raw))
}

fn build_query(
    agent_type: Option<String>,
    event_type: Option<String>,
    transaction_id: Option<String>,
    workflow_id: Option<String>,
    days: Option<i64>,
    limit: usize,
    offset: usize,
) -> Result<AuditQuery> {
    let mut query = AuditQuery::new().page(limit, offset);
    if let Some(agent_type) = agent_type {
        query = query.agent_type(AgentType::new(agent_type));
    }
    if let Some(raw) = event_type {
        let event_type: AuditEventType = raw
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid event type: {}", e))?;
        query = query.event_type(event_type);
    }
    if let Some(id) = transaction_id {
        query = query.transaction_id(id);
    }
    if let Some(id) = workflow_id {
        query = query.workflow_id(id);
    }
    if let Some(days) = days {
        let span = Duration::try_days(days.max(0)).unwrap_or(Duration::MAX);
        query = query.since(Utc::now().checked_sub_signed(span).unwrap_or(DateTime::<Utc>::UNIX_EPOCH));
    }
    Ok(query)
}

async fn connect(config_override: Option<PathBuf>, database_url: Option<String>) -> Result<DecisionAuditTrail> {
    let config = EngineConfig::load_or_default(config_override.clone()).context("Failed to load configuration")?;
    let url = super::database_url(config_override, database_url)?;
    let db = Database::new(&url).await?;
    let repository = Arc::new(PostgresAuditTrailRepository::new(db.get_pool().clone()));
    Ok(DecisionAuditTrail::new(repository).with_config(config.audit))
}
