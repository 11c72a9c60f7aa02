// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod audit_trail;
pub mod decision_hooks;
pub mod engine;
pub mod hybrid_scorer;
pub mod repository_factory;

pub use audit_trail::DecisionAuditTrail;
pub use decision_hooks::{DecisionHooks, SideEffectError};
pub use engine::DecisionEngine;
pub use hybrid_scorer::{HybridScore, HybridScorer};
pub use repository_factory::EngineStores;
