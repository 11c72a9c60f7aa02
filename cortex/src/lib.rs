// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Ledgerline Cortex
//!
//! Learning and memory for the decision engine: categorical context
//! embeddings, the trajectory pattern index, the semantic decision memory and
//! the adaptive weight engine that learns how far to trust each signal.
//!
//! # Architecture
//!
//! - **Layer:** Learning & Memory Layer
//! - **Depends on:** nothing inside the workspace

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
pub use application::*;
pub use infrastructure::*;
