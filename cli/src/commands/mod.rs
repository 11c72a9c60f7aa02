// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Ledgerline CLI

pub mod audit;
pub mod config;
pub mod db;
pub mod score;

pub use self::audit::AuditCommand;
pub use self::config::ConfigCommand;
pub use self::db::DbCommand;
pub use self::score::ScoreArgs;

use anyhow::{Context, Result};
use ledgerline_core::domain::engine_config::EngineConfig;
use std::path::PathBuf;

/// Loads configuration and resolves the database URL, preferring an explicit flag.
pub(crate) fn database_url(config_override: Option<PathBuf>, explicit: Option<String>) -> Result<String> {
    if let Some(url) = explicit {
        return Ok(url);
    }
    let config = EngineConfig::load_or_default(config_override).context("Failed to load configuration")?;
    config
        .database
        .url
        .context("No database configured. Pass --database-url or set LEDGERLINE_DATABASE_URL.")
}
