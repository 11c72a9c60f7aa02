// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0

//! `ledgerline score`
//!
//! Runs the pre-decision hook and the hybrid scorer against a process-local
//! engine and prints the result as JSON. Nothing is persisted, so adaptive
//! weights are always cold and the configured defaults apply.

use anyhow::{Context, Result};
use clap::Args;
use ledgerline_core::application::DecisionEngine;
use ledgerline_core::cortex::{AmountBucket, DecisionContext, TenantId};
use ledgerline_core::domain::engine_config::EngineConfig;
use ledgerline_core::domain::hooks::PreDecisionRequest;
use serde_json::json;
use std::path::PathBuf;

#[derive(Args)]
pub struct ScoreArgs {
    /// LLM confidence (0-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    llm: u8,

    /// Heuristic confidence (0-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    heuristic: u8,

    /// Tenant id (UUID). A random tenant is used when omitted.
    #[arg(long)]
    tenant: Option<String>,

    /// Agent type, e.g. categorizer or payment_matcher
    #[arg(long, default_value = "categorizer")]
    agent_type: String,

    #[arg(long)]
    transaction_class: Option<String>,

    /// Transaction amount in cents, bucketed before scoring
    #[arg(long, allow_negative_numbers = true)]
    amount_cents: Option<i64>,

    /// Input excerpt for the semantic advisory
    #[arg(long)]
    input: Option<String>,
}

pub async fn execute(args: ScoreArgs, config_override: Option<PathBuf>) -> Result<()> {
    let config = EngineConfig::load_or_default(config_override).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    let output = score(&config, args).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn score(config: &EngineConfig, args: ScoreArgs) -> Result<serde_json::Value> {
    let tenant_id = match args.tenant.as_deref() {
        Some(raw) => TenantId::from_string(raw).with_context(|| format!("Invalid tenant id: {}", raw))?,
        None => TenantId::new(),
    };

    let mut context = DecisionContext::new(tenant_id, args.agent_type);
    if let Some(class) = args.transaction_class {
        context = context.with_transaction_class(class);
    }
    if let Some(cents) = args.amount_cents {
        context = context.with_amount_bucket(AmountBucket::from_cents(cents));
    }

    let engine = DecisionEngine::in_memory(config);

    let mut request = PreDecisionRequest::new(context.clone());
    if let Some(input) = args.input {
        request = request.with_input_excerpt(input);
    }
    let advisory = engine.pre_decision(request).await;
    let hybrid = engine.combine(args.llm, args.heuristic, &context).await;

    Ok(json!({
        "tenant_id": tenant_id.to_string(),
        "agent_type": context.agent_type.as_str(),
        "score": hybrid.score,
        "weights_used": hybrid.weights_used,
        "weight_source": hybrid.source,
        "pre_decision": advisory,
    }))
}
