// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Decision engine facade.
//!
//! Wires the hybrid scorer, the adaptive weight engine, the decision hooks
//! and the audit trail over one set of stores and one event bus, using the
//! values from [`EngineConfig`].

use ledgerline_cortex::{AdaptiveWeightEngine, AgentType, DecisionContext, TenantId};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::application::audit_trail::DecisionAuditTrail;
use crate::application::decision_hooks::DecisionHooks;
use crate::application::hybrid_scorer::{HybridScore, HybridScorer};
use crate::application::repository_factory::EngineStores;
use crate::domain::audit::{AuditLogEntry, AuditQuery, AuditStats, StatsWindow};
use crate::domain::engine_config::EngineConfig;
use crate::domain::hooks::{CorrectionRequest, PostDecisionRequest, PreDecisionRequest, PreDecisionResult};
use crate::domain::repository::RepositoryError;
use crate::infrastructure::event_bus::{EventBus, EventReceiver};

pub struct DecisionEngine {
    scorer: HybridScorer,
    hooks: DecisionHooks,
    audit: Arc<DecisionAuditTrail>,
    event_bus: EventBus,
}

impl DecisionEngine {
    pub fn new(config: &EngineConfig, stores: EngineStores) -> Self {
        let event_bus = EventBus::with_default_capacity();

        let audit = Arc::new(
            DecisionAuditTrail::new(stores.audit)
                .with_config(config.audit.clone())
                .with_event_bus(event_bus.clone()),
        );

        let weights = AdaptiveWeightEngine::new(stores.pattern_index.clone()).with_config(config.adaptive.clone());
        let scorer = HybridScorer::new(Arc::new(weights)).with_defaults(config.scoring.default_weights());

        let hooks = DecisionHooks::new(audit.clone())
            .with_tenant_directory(stores.tenants)
            .with_pattern_index(stores.pattern_index)
            .with_decision_memory(stores.memory)
            .with_text_embedder(stores.embedder)
            .with_event_bus(event_bus.clone())
            .with_hooks_config(config.hooks.clone())
            .with_outcome_config(config.outcome.clone());

        Self {
            scorer,
            hooks,
            audit,
            event_bus,
        }
    }

    pub fn in_memory(config: &EngineConfig) -> Self {
        Self::new(config, EngineStores::in_memory())
    }

    pub async fn combine(&self, llm_confidence: u8, heuristic_confidence: u8, context: &DecisionContext) -> HybridScore {
        self.scorer.combine(llm_confidence, heuristic_confidence, context).await
    }

    pub async fn pre_decision(&self, request: PreDecisionRequest) -> PreDecisionResult {
        self.hooks.pre_decision(request).await
    }

    pub fn post_decision(&self, request: PostDecisionRequest) -> Option<JoinHandle<()>> {
        self.hooks.post_decision(request)
    }

    pub fn record_correction(&self, request: CorrectionRequest) -> Option<JoinHandle<()>> {
        self.hooks.record_correction(request)
    }

    pub async fn query_audit_trail(
        &self,
        tenant_id: TenantId,
        query: &AuditQuery,
    ) -> Result<Vec<AuditLogEntry>, RepositoryError> {
        self.audit.query(tenant_id, query).await
    }

    pub async fn aggregate_stats(
        &self,
        tenant_id: TenantId,
        agent_type: &AgentType,
        window: StatsWindow,
    ) -> Result<AuditStats, RepositoryError> {
        self.audit.aggregate_stats(tenant_id, agent_type, window).await
    }

    pub fn audit_trail(&self) -> &Arc<DecisionAuditTrail> {
        &self.audit
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.event_bus.subscribe()
    }
}
