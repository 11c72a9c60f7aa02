// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Decision Hooks
//!
//! Two calls bracket every decision:
//!
//! - [`DecisionHooks::pre_decision`] runs inline and returns an advisory.
//!   The tenant gate is the only check that can deny. The correction-history
//!   and semantic-similarity checks only add warnings and a negative
//!   confidence adjustment, and any failure or timeout in them is treated as
//!   "nothing to report".
//! - [`DecisionHooks::post_decision`] returns immediately. It spawns three
//!   independent side effects (trajectory, audit entry, decision memory) and
//!   a supervisor task that joins them and logs failures. Nothing is
//!   retried.
//!
//! [`DecisionHooks::record_correction`] feeds human corrections back into the
//! audit trail and the decision memory. The trajectory written by
//! `post_decision` stays the only one per decision.

use chrono::{DateTime, Utc};
use ledgerline_cortex::{
    embed, CortexError, DecisionContext, DecisionMemory, DecisionMemoryRecord, DecisionSignals, HashingTextEmbedder,
    MemoryFilter, NullDecisionMemory, NullPatternIndex, PatternIndex, TenantId, TextEmbedder, Trajectory,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::application::audit_trail::DecisionAuditTrail;
use crate::domain::audit::{AuditEventType, AuditLogEntry, AuditQuery};
use crate::domain::engine_config::{HooksConfig, OutcomeConfig};
use crate::domain::events::{DecisionEvent, SideEffect};
use crate::domain::hooks::{
    CorrectionRequest, DecisionWarning, PostDecisionRequest, PreDecisionRequest, PreDecisionResult, WarningCode,
};
use crate::domain::repository::RepositoryError;
use crate::domain::tenant::{TenantDirectory, UnmanagedTenants};
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, thiserror::Error)]
pub enum SideEffectError {
    #[error(transparent)]
    Cortex(#[from] CortexError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Side effect task did not complete: {0}")]
    Aborted(#[from] tokio::task::JoinError),
}

type SideEffectHandle = (SideEffect, JoinHandle<Result<(), SideEffectError>>);

/// Stand-in deadline for budgets too large to add to the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Clone)]
pub struct DecisionHooks {
    audit: Arc<DecisionAuditTrail>,
    tenants: Arc<dyn TenantDirectory>,
    pattern_index: Arc<dyn PatternIndex>,
    memory: Arc<dyn DecisionMemory>,
    embedder: Arc<dyn TextEmbedder>,
    event_bus: Option<EventBus>,
    hooks: HooksConfig,
    outcome: OutcomeConfig,
}

impl DecisionHooks {
    /// Hooks with every optional collaborator set to its no-op default.
    pub fn new(audit: Arc<DecisionAuditTrail>) -> Self {
        Self {
            audit,
            tenants: Arc::new(UnmanagedTenants),
            pattern_index: Arc::new(NullPatternIndex),
            memory: Arc::new(NullDecisionMemory),
            embedder: Arc::new(HashingTextEmbedder::new()),
            event_bus: None,
            hooks: HooksConfig::default(),
            outcome: OutcomeConfig::default(),
        }
    }

    pub fn with_tenant_directory(mut self, tenants: Arc<dyn TenantDirectory>) -> Self {
        self.tenants = tenants;
        self
    }

    pub fn with_pattern_index(mut self, pattern_index: Arc<dyn PatternIndex>) -> Self {
        self.pattern_index = pattern_index;
        self
    }

    pub fn with_decision_memory(mut self, memory: Arc<dyn DecisionMemory>) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_text_embedder(mut self, embedder: Arc<dyn TextEmbedder>) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn with_hooks_config(mut self, hooks: HooksConfig) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_outcome_config(mut self, outcome: OutcomeConfig) -> Self {
        self.outcome = outcome;
        self
    }

    pub async fn pre_decision(&self, request: PreDecisionRequest) -> PreDecisionResult {
        let context = &request.context;
        let deadline = deadline_after(request.timeout.unwrap_or(self.hooks.pre_decision_timeout));

        if let Some(reason) = self.tenant_gate(context, deadline).await {
            metrics::counter!("ledgerline_pre_decision_total", "outcome" => "denied").increment(1);
            warn!(
                tenant_id = %context.tenant_id,
                agent_type = %context.agent_type,
                reason = %reason,
                "Decision denied by tenant gate"
            );
            self.publish(DecisionEvent::DecisionDenied {
                tenant_id: context.tenant_id,
                agent_type: context.agent_type.clone(),
                reason: reason.clone(),
                denied_at: Utc::now(),
            });
            return PreDecisionResult::deny(reason);
        }

        let (corrections, semantic) = tokio::join!(
            self.correction_history(context, deadline),
            self.semantic_match(context, request.input_excerpt.as_deref(), deadline),
        );

        let mut result = PreDecisionResult::allow();

        if let Some(count) = corrections {
            result.warnings.push(DecisionWarning::new(
                WarningCode::PreviouslyCorrected,
                format!(
                    "{} corrections for {} in the last {} days",
                    count,
                    context.agent_type,
                    self.hooks.correction_lookback.as_secs() / 86_400
                ),
            ));
            result.confidence_adjustment = self.hooks.correction_penalty;
        }

        if let Some(similarity) = semantic {
            result.warnings.push(DecisionWarning::new(
                WarningCode::SemanticMatchCorrected,
                format!("Similar input was previously decided incorrectly (similarity {:.2})", similarity),
            ));
            if result.confidence_adjustment == 0 {
                result.confidence_adjustment = self.hooks.semantic_penalty;
            }
        }

        metrics::counter!("ledgerline_pre_decision_total", "outcome" => "allowed").increment(1);
        debug!(
            tenant_id = %context.tenant_id,
            agent_type = %context.agent_type,
            warnings = result.warnings.len(),
            confidence_adjustment = result.confidence_adjustment,
            "Pre-decision advisory"
        );
        result
    }

    /// Fire the post-decision side effects and return at once.
    ///
    /// The returned handle resolves when every side effect has finished and
    /// never carries an error; callers may drop it. `None` when called outside
    /// a tokio runtime, in which case nothing is recorded.
    pub fn post_decision(&self, request: PostDecisionRequest) -> Option<JoinHandle<()>> {
        let Ok(runtime) = Handle::try_current() else {
            warn!(
                tenant_id = %request.context.tenant_id,
                "No async runtime available, post-decision side effects skipped"
            );
            return None;
        };

        let tenant_id = request.context.tenant_id;
        let request = Arc::new(request);

        let trajectory = {
            let hooks = self.clone();
            let request = request.clone();
            runtime.spawn(async move {
                hooks
                    .store_trajectory(&request.context, request.signals(), request.assumed_correct())
                    .await
            })
        };

        let audit = {
            let hooks = self.clone();
            let request = request.clone();
            runtime.spawn(async move { hooks.audit.record(decision_entry(&request)).await.map_err(SideEffectError::from) })
        };

        let memory = {
            let hooks = self.clone();
            let request = request.clone();
            runtime.spawn(async move {
                hooks
                    .remember(
                        &request.context,
                        &request.decision,
                        request.input_excerpt.as_deref(),
                        request.assumed_correct(),
                    )
                    .await
            })
        };

        let effects = vec![
            (SideEffect::Trajectory, trajectory),
            (SideEffect::Audit, audit),
            (SideEffect::Memory, memory),
        ];
        Some(runtime.spawn(self.clone().supervise(tenant_id, effects)))
    }

    /// Record a human override of an earlier decision.
    ///
    /// Always writes a CORRECTION audit entry. Inside the configured
    /// correction window it also remembers the input as incorrectly decided,
    /// so later similar inputs are flagged. No trajectory is written here.
    pub fn record_correction(&self, request: CorrectionRequest) -> Option<JoinHandle<()>> {
        let Ok(runtime) = Handle::try_current() else {
            warn!(
                tenant_id = %request.context.tenant_id,
                "No async runtime available, correction not recorded"
            );
            return None;
        };

        let tenant_id = request.context.tenant_id;
        let learned = request.within(self.outcome.correction_window);
        if !learned {
            info!(
                tenant_id = %tenant_id,
                agent_type = %request.context.agent_type,
                "Correction arrived after the learning window, audit only"
            );
        }

        self.publish(DecisionEvent::CorrectionRecorded {
            tenant_id,
            agent_type: request.context.agent_type.clone(),
            transaction_id: request.transaction_id.clone(),
            learned,
            recorded_at: request.corrected_at,
        });

        let request = Arc::new(request);
        let mut effects: Vec<SideEffectHandle> = Vec::with_capacity(2);

        effects.push((SideEffect::Audit, {
            let hooks = self.clone();
            let request = request.clone();
            runtime.spawn(async move {
                hooks
                    .audit
                    .record(correction_entry(&request, learned))
                    .await
                    .map_err(SideEffectError::from)
            })
        }));

        if learned {
            effects.push((SideEffect::Memory, {
                let hooks = self.clone();
                let request = request.clone();
                runtime.spawn(async move {
                    hooks
                        .remember(
                            &request.context,
                            &request.original_decision,
                            request.input_excerpt.as_deref(),
                            false,
                        )
                        .await
                })
            }));
        }

        Some(runtime.spawn(self.clone().supervise(tenant_id, effects)))
    }

    async fn tenant_gate(&self, context: &DecisionContext, deadline: Instant) -> Option<String> {
        let tenant_id = context.tenant_id;
        match timeout_at(deadline, self.tenants.tenant_status(tenant_id)).await {
            Ok(Ok(None)) => Some(format!("Tenant {} not found", tenant_id)),
            Ok(Ok(Some(status))) if !status.permits_decisions() => {
                Some(format!("Tenant {} is {}", tenant_id, status.as_str()))
            }
            Ok(Ok(Some(_))) => None,
            Ok(Err(e)) => {
                warn!(tenant_id = %tenant_id, error = %e, "Tenant lookup failed, allowing decision");
                None
            }
            Err(_) => {
                warn!(tenant_id = %tenant_id, "Tenant lookup timed out, allowing decision");
                None
            }
        }
    }

    /// Number of recent corrections, when it reaches the configured threshold.
    async fn correction_history(&self, context: &DecisionContext, deadline: Instant) -> Option<u64> {
        let since = chrono::Duration::from_std(self.hooks.correction_lookback)
            .ok()
            .and_then(|lookback| Utc::now().checked_sub_signed(lookback))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let query = AuditQuery::new()
            .agent_type(context.agent_type.clone())
            .event_type(AuditEventType::Correction)
            .since(since);

        match timeout_at(deadline, self.audit.count(context.tenant_id, &query)).await {
            Ok(Ok(count)) if count >= self.hooks.correction_threshold => Some(count),
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                warn!(tenant_id = %context.tenant_id, error = %e, "Correction history unavailable");
                None
            }
            Err(_) => {
                warn!(tenant_id = %context.tenant_id, "Correction history lookup timed out");
                None
            }
        }
    }

    /// Highest similarity to any input of the tenant that was decided
    /// incorrectly, whatever agent decided it, when it clears the configured
    /// threshold.
    async fn semantic_match(&self, context: &DecisionContext, excerpt: Option<&str>, deadline: Instant) -> Option<f64> {
        let excerpt = excerpt.map(str::trim).filter(|e| !e.is_empty())?;

        let lookup = async {
            let embedding = self.embedder.embed_text(excerpt).await?;
            if embedding.is_empty() {
                return Ok(Vec::new());
            }
            self.memory
                .search(
                    context.tenant_id,
                    &embedding,
                    MemoryFilter::IncorrectOnly,
                    self.hooks.semantic_search_limit,
                )
                .await
        };

        let matches = match timeout_at(deadline, lookup).await {
            Ok(Ok(matches)) => matches,
            Ok(Err(e)) => {
                warn!(tenant_id = %context.tenant_id, error = %e, "Semantic lookup failed");
                return None;
            }
            Err(_) => {
                warn!(tenant_id = %context.tenant_id, "Semantic lookup timed out");
                return None;
            }
        };

        matches
            .into_iter()
            .filter(|(record, similarity)| {
                !record.was_correct && *similarity >= self.hooks.semantic_similarity_threshold
            })
            .map(|(_, similarity)| similarity)
            .reduce(f64::max)
    }

    async fn store_trajectory(
        &self,
        context: &DecisionContext,
        signals: DecisionSignals,
        was_correct: bool,
    ) -> Result<(), SideEffectError> {
        let trajectory = Trajectory::record(context.tenant_id, embed(context), signals, was_correct);
        let (trajectory_id, reward, quality) = (trajectory.id, trajectory.reward, trajectory.quality);

        self.pattern_index.store(trajectory).await?;

        self.publish(DecisionEvent::TrajectoryRecorded {
            trajectory_id,
            tenant_id: context.tenant_id,
            agent_type: context.agent_type.clone(),
            reward,
            quality,
            recorded_at: Utc::now(),
        });
        Ok(())
    }

    async fn remember(
        &self,
        context: &DecisionContext,
        decision: &str,
        excerpt: Option<&str>,
        was_correct: bool,
    ) -> Result<(), SideEffectError> {
        let Some(excerpt) = excerpt.map(str::trim).filter(|e| !e.is_empty()) else {
            debug!(tenant_id = %context.tenant_id, "No input excerpt, decision memory skipped");
            return Ok(());
        };

        let embedding = self.embedder.embed_text(excerpt).await?;
        if embedding.is_empty() {
            debug!(tenant_id = %context.tenant_id, "Input excerpt has nothing to embed, decision memory skipped");
            return Ok(());
        }
        let record = DecisionMemoryRecord::new(
            context.tenant_id,
            context.agent_type.clone(),
            decision,
            embedding,
            was_correct,
        );
        self.memory.remember(record).await?;

        self.publish(DecisionEvent::DecisionMemorised {
            tenant_id: context.tenant_id,
            agent_type: context.agent_type.clone(),
            was_correct,
            memorised_at: Utc::now(),
        });
        Ok(())
    }

    /// Join every side effect and log the ones that failed. Never fails.
    async fn supervise(self, tenant_id: TenantId, effects: Vec<SideEffectHandle>) {
        let (kinds, handles): (Vec<SideEffect>, Vec<_>) = effects.into_iter().unzip();
        let joined = futures::future::join_all(handles).await;

        for (effect, outcome) in kinds.into_iter().zip(joined) {
            let outcome = match outcome {
                Ok(result) => result,
                Err(join_error) => Err(SideEffectError::from(join_error)),
            };

            if let Err(e) = outcome {
                metrics::counter!("ledgerline_side_effect_failures_total", "effect" => effect.as_str()).increment(1);
                warn!(
                    tenant_id = %tenant_id,
                    effect = effect.as_str(),
                    error = %e,
                    "Decision side effect failed"
                );
                self.publish(DecisionEvent::SideEffectFailed {
                    tenant_id,
                    effect,
                    error: e.to_string(),
                    failed_at: Utc::now(),
                });
            }
        }
    }

    fn publish(&self, event: DecisionEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}

fn deadline_after(budget: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(budget).unwrap_or_else(|| now + FAR_FUTURE)
}

fn decision_entry(request: &PostDecisionRequest) -> AuditLogEntry {
    let context = &request.context;
    let mut entry = AuditLogEntry::new(
        context.tenant_id,
        context.agent_type.clone(),
        AuditEventType::Decision,
        request.decision.clone(),
    )
    .with_confidence(request.final_confidence)
    .with_auto_applied(request.auto_applied)
    .with_details(decision_details(request));

    if let Some(source) = request.source {
        entry = entry.with_source(source);
    }
    if let Some(reasoning) = &request.reasoning {
        entry = entry.with_reasoning(reasoning.clone());
    }
    if let Some(duration_ms) = request.duration_ms {
        entry = entry.with_duration_ms(duration_ms);
    }
    if let Some(transaction_id) = &request.transaction_id {
        entry = entry.with_transaction_id(transaction_id.clone());
    }
    entry
}

/// Caller details plus the scoring inputs. A non-object `details` value is
/// kept under `"caller"`.
fn decision_details(request: &PostDecisionRequest) -> Value {
    let mut details = match &request.details {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("caller".to_string(), other.clone());
            map
        }
    };

    details.insert(
        "weights_used".to_string(),
        json!({ "llm": request.weights_used.llm, "heuristic": request.weights_used.heuristic }),
    );
    if let Some(llm) = request.llm_confidence {
        details.insert("llm_confidence".to_string(), json!(llm));
    }
    if let Some(heuristic) = request.heuristic_confidence {
        details.insert("heuristic_confidence".to_string(), json!(heuristic));
    }
    if let Some(class) = &request.context.transaction_class {
        details.insert("transaction_class".to_string(), json!(class));
    }
    if let Some(bucket) = &request.context.amount_bucket {
        details.insert("amount_bucket".to_string(), json!(bucket.as_str()));
    }
    Value::Object(details)
}

fn correction_entry(request: &CorrectionRequest, learned: bool) -> AuditLogEntry {
    let context = &request.context;
    let mut entry = AuditLogEntry::new(
        context.tenant_id,
        context.agent_type.clone(),
        AuditEventType::Correction,
        request.corrected_decision.clone(),
    )
    .with_details(json!({
        "original_decision": request.original_decision,
        "original_confidence": request.original_confidence,
        "decided_at": request.decided_at,
        "learned": learned,
    }))
    .at(request.corrected_at);

    if let Some(reasoning) = &request.reasoning {
        entry = entry.with_reasoning(reasoning.clone());
    }
    if let Some(transaction_id) = &request.transaction_id {
        entry = entry.with_transaction_id(transaction_id.clone());
    }
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tenant::TenantStatus;
    use crate::infrastructure::repositories::{InMemoryAuditTrailRepository, InMemoryTenantDirectory};
    use ledgerline_cortex::{InMemoryDecisionMemory, InMemoryPatternIndex, ScoringWeights};

    fn context(tenant_id: TenantId) -> DecisionContext {
        DecisionContext::new(tenant_id, "categorizer").with_transaction_class("card_purchase")
    }

    #[test]
    fn test_decision_details_merge_scoring_inputs() {
        let request = PostDecisionRequest::new(context(TenantId::new()), "5200", 80)
            .with_signals(90, 60, ScoringWeights::default())
            .with_details(json!({ "rule_id": "r-17" }));

        let details = decision_details(&request);

        assert_eq!(details["rule_id"], "r-17");
        assert_eq!(details["llm_confidence"], 90);
        assert_eq!(details["heuristic_confidence"], 60);
        assert_eq!(details["transaction_class"], "card_purchase");
        assert!(details["weights_used"]["llm"].is_number());
    }

    #[test]
    fn test_non_object_details_are_preserved() {
        let request = PostDecisionRequest::new(context(TenantId::new()), "5200", 80).with_details(json!("free text"));
        let details = decision_details(&request);
        assert_eq!(details["caller"], "free text");
    }

    #[test]
    fn test_post_decision_outside_runtime_is_a_no_op() {
        let hooks = DecisionHooks::new(Arc::new(DecisionAuditTrail::new(Arc::new(
            InMemoryAuditTrailRepository::new(),
        ))));
        let request = PostDecisionRequest::new(context(TenantId::new()), "5200", 80);
        assert!(hooks.post_decision(request).is_none());
    }

    #[tokio::test]
    async fn test_post_decision_writes_all_three_stores() {
        // Arrange
        let audit_repo = Arc::new(InMemoryAuditTrailRepository::new());
        let index = Arc::new(InMemoryPatternIndex::new());
        let memory = Arc::new(InMemoryDecisionMemory::new());
        let hooks = DecisionHooks::new(Arc::new(DecisionAuditTrail::new(audit_repo.clone())))
            .with_pattern_index(index.clone())
            .with_decision_memory(memory.clone());
        let tenant = TenantId::new();

        // Act
        let handle = hooks
            .post_decision(
                PostDecisionRequest::new(context(tenant), "5200", 95)
                    .with_input_excerpt("WOOLWORTHS SANDTON 1234"),
            )
            .unwrap();
        handle.await.unwrap();

        // Assert
        assert_eq!(index.len_for(tenant), 1);
        assert_eq!(memory.len_for(tenant), 1);
        let entries = audit_repo.entries_for(tenant);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type, AuditEventType::Decision);
        assert_eq!(entries[0].confidence, Some(95));
    }

    #[tokio::test]
    async fn test_semantic_match_spans_agent_types() {
        // Arrange
        let memory = Arc::new(InMemoryDecisionMemory::new());
        let embedder = HashingTextEmbedder::new();
        let tenant = TenantId::new();
        let excerpt = "EFT PAYMENT LITTLE STARS FEES";
        let embedding = embedder.embed_text(excerpt).await.unwrap();

        memory
            .remember(DecisionMemoryRecord::new(tenant, "categorizer".into(), "5200", embedding.clone(), true))
            .await
            .unwrap();
        memory
            .remember(DecisionMemoryRecord::new(tenant, "payment_matcher".into(), "inv-9", embedding, false))
            .await
            .unwrap();

        let hooks = DecisionHooks::new(Arc::new(DecisionAuditTrail::new(Arc::new(
            InMemoryAuditTrailRepository::new(),
        ))))
        .with_decision_memory(memory);

        // Act
        let result = hooks
            .pre_decision(PreDecisionRequest::new(context(tenant)).with_input_excerpt(excerpt))
            .await;

        // Assert
        assert!(result.allowed);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].code, WarningCode::SemanticMatchCorrected);
        assert_eq!(result.confidence_adjustment, -5);
    }

    #[tokio::test]
    async fn test_unbounded_timeout_does_not_overflow_deadline() {
        let hooks = DecisionHooks::new(Arc::new(DecisionAuditTrail::new(Arc::new(
            InMemoryAuditTrailRepository::new(),
        ))));

        let result = hooks
            .pre_decision(
                PreDecisionRequest::new(context(TenantId::new()))
                    .with_input_excerpt("SALARY ACME")
                    .with_timeout(Duration::MAX),
            )
            .await;

        assert!(result.allowed);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_deadline_after_saturates() {
        let before = Instant::now();
        assert!(deadline_after(Duration::MAX) > before + Duration::from_secs(86_400));
        assert!(deadline_after(Duration::from_millis(10)) <= Instant::now() + Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_huge_correction_lookback_is_clamped() {
        let audit_repo = Arc::new(InMemoryAuditTrailRepository::new());
        let hooks = DecisionHooks::new(Arc::new(DecisionAuditTrail::new(audit_repo))).with_hooks_config(HooksConfig {
            correction_lookback: Duration::MAX,
            ..HooksConfig::default()
        });

        let result = hooks.pre_decision(PreDecisionRequest::new(context(TenantId::new()))).await;

        assert!(result.allowed);
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_suspended_tenant_is_allowed() {
        let directory = Arc::new(InMemoryTenantDirectory::new());
        let tenant = TenantId::new();
        directory.set_status(tenant, TenantStatus::Suspended);
        let hooks = DecisionHooks::new(Arc::new(DecisionAuditTrail::new(Arc::new(
            InMemoryAuditTrailRepository::new(),
        ))))
        .with_tenant_directory(directory);

        let result = hooks.pre_decision(PreDecisionRequest::new(context(tenant))).await;

        assert!(result.allowed);
    }
}
