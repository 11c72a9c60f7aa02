// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # ledgerline-core
//!
//! Decision-quality engine. Blends an LLM confidence with a deterministic
//! heuristic confidence ([`application::HybridScorer`]), gates and advises
//! each decision before it is made and records it afterwards
//! ([`application::DecisionHooks`]), and keeps a tenant-partitioned
//! compliance log ([`application::DecisionAuditTrail`]).
//!
//! The learning side (embeddings, pattern index, adaptive weights) lives in
//! `ledgerline-cortex` and is re-exported here as [`cortex`].

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
pub use ledgerline_cortex as cortex;
