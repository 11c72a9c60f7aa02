// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use ledgerline_core::domain::engine_config::{EngineConfig, CONFIG_PATH_ENV};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration as YAML
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. {}: {}",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./ledgerline.yaml");
        println!();
    }

    let mut config = EngineConfig::load_or_default(config_override).context("Failed to load configuration")?;
    // Never echo credentials
    if config.database.url.is_some() {
        config.database.url = Some("<redacted>".to_string());
    }

    print!("{}", config.to_yaml_string()?);
    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = EngineConfig::load_or_default(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}
