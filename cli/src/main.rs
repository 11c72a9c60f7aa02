// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Ledgerline Operator CLI
//!
//! The `ledgerline` binary is a thin operator surface over the decision
//! engine library.
//!
//! ## Commands
//!
//! - `ledgerline config show|validate` - Configuration management
//! - `ledgerline score` - Blend two confidences with an in-memory engine
//! - `ledgerline audit query|stats` - Read the audit trail from PostgreSQL
//! - `ledgerline db migrate` - Apply bundled schema migrations

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;

use commands::{AuditCommand, ConfigCommand, DbCommand, ScoreArgs};

/// Ledgerline decision engine operator tool
#[derive(Parser)]
#[command(name = "ledgerline")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "LEDGERLINE_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LEDGERLINE_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Score a decision with the hybrid scorer
    #[command(name = "score")]
    Score(ScoreArgs),

    /// Audit trail queries
    #[command(name = "audit")]
    Audit {
        #[command(subcommand)]
        command: AuditCommand,
    },

    /// Database schema management
    #[command(name = "db")]
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is normal
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        Some(Commands::Score(args)) => commands::score::execute(args, cli.config).await,
        Some(Commands::Audit { command }) => commands::audit::handle_command(command, cli.config).await,
        Some(Commands::Db { command }) => commands::db::handle_command(command, cli.config).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    Ok(())
}
