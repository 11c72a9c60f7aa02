// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Database schema commands
//!
//! `ledgerline db migrate` applies the migrations bundled with
//! `ledgerline-core` (audit log and tenant directory tables).
//!
//! ```bash
//! # Apply all pending migrations
//! ledgerline db migrate
//!
//! # Preview migrations without applying
//! ledgerline db migrate --dry-run
//! ```

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use ledgerline_core::infrastructure::Database;

#[derive(Subcommand)]
pub enum DbCommand {
    /// Apply pending schema migrations
    Migrate {
        /// List pending migrations without applying them
        #[arg(long)]
        dry_run: bool,

        #[arg(long, env = "LEDGERLINE_DATABASE_URL", hide_env_values = true)]
        database_url: Option<String>,
    },
}

pub async fn handle_command(command: DbCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        DbCommand::Migrate { dry_run, database_url } => migrate(config_override, database_url, dry_run).await,
    }
}

async fn migrate(config_override: Option<PathBuf>, database_url: Option<String>, dry_run: bool) -> Result<()> {
    let url = super::database_url(config_override, database_url)?;

    println!("Connecting to database...");
    let db = Database::new(&url).await?;

    // Missing bookkeeping table means nothing has been applied yet
    let applied: Vec<i64> = sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success")
        .fetch_all(db.get_pool())
        .await
        .unwrap_or_default();

    let pending: Vec<(i64, String)> = Database::migrations()
        .filter(|(version, _)| !applied.contains(version))
        .collect();

    println!(
        "Migration status: {} applied, {} pending.",
        applied.len(),
        pending.len()
    );

    if pending.is_empty() {
        println!("{}", "✓ Database is up to date.".green());
        return Ok(());
    }

    if dry_run {
        println!("Pending migrations (dry run):");
        for (version, description) in &pending {
            println!(" - {} {}", version, description);
        }
        return Ok(());
    }

    println!("Applying pending migrations...");
    db.migrate().await?;
    println!("{}", "✓ Database updated successfully.".green());

    Ok(())
}
