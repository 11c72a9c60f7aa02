// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer of the decision engine: audit log model, hook protocol
//! types, tenant status, decision events, configuration and the repository
//! contracts implemented in `crate::infrastructure`.

pub mod audit;
pub mod engine_config;
pub mod events;
pub mod hooks;
pub mod repository;
pub mod tenant;
