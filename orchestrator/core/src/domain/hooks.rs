// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Request and result types for the pre/post decision protocol.
//!
//! Every decision goes through exactly one `pre_decision` followed by one
//! `post_decision`. A human correction arriving later goes through
//! `record_correction`.

use chrono::{DateTime, Utc};
use ledgerline_cortex::{DecisionContext, DecisionSignals, ScoringWeights};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::audit::DecisionSource;

#[derive(Debug, Clone)]
pub struct PreDecisionRequest {
    pub context: DecisionContext,
    /// Raw input text used for the semantic-similarity check. Never stored.
    pub input_excerpt: Option<String>,
    /// Caller deadline for the whole advisory; the configured
    /// `hooks.pre_decision_timeout` applies when `None`.
    pub timeout: Option<Duration>,
}

impl PreDecisionRequest {
    pub fn new(context: DecisionContext) -> Self {
        Self {
            context,
            input_excerpt: None,
            timeout: None,
        }
    }

    pub fn with_input_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.input_excerpt = Some(excerpt.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningCode {
    #[serde(rename = "WARNING_PREVIOUSLY_CORRECTED")]
    PreviouslyCorrected,
    #[serde(rename = "WARNING_SEMANTIC_MATCH_CORRECTED")]
    SemanticMatchCorrected,
}

impl WarningCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningCode::PreviouslyCorrected => "WARNING_PREVIOUSLY_CORRECTED",
            WarningCode::SemanticMatchCorrected => "WARNING_SEMANTIC_MATCH_CORRECTED",
        }
    }
}

impl fmt::Display for WarningCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionWarning {
    pub code: WarningCode,
    pub message: String,
}

impl DecisionWarning {
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Advisory produced before a decision.
///
/// `allowed` is only ever false for the tenant gate. `confidence_adjustment`
/// is zero or negative and is applied by the caller to its final score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreDecisionResult {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub warnings: Vec<DecisionWarning>,
    pub confidence_adjustment: i32,
}

impl PreDecisionResult {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            warnings: Vec::new(),
            confidence_adjustment: 0,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            warnings: Vec::new(),
            confidence_adjustment: 0,
        }
    }

    pub fn has_warning(&self, code: WarningCode) -> bool {
        self.warnings.iter().any(|w| w.code == code)
    }
}

impl Default for PreDecisionResult {
    fn default() -> Self {
        Self::allow()
    }
}

/// Everything known about a decision once it has been made.
#[derive(Debug, Clone)]
pub struct PostDecisionRequest {
    pub context: DecisionContext,
    /// The chosen outcome, e.g. an account code or a matched invoice id.
    pub decision: String,
    pub final_confidence: u8,
    pub llm_confidence: Option<u8>,
    pub heuristic_confidence: Option<u8>,
    pub weights_used: ScoringWeights,
    /// `None` means no correction has been seen; the decision is assumed
    /// correct until `record_correction` says otherwise.
    pub was_correct: Option<bool>,
    pub auto_applied: bool,
    pub source: Option<DecisionSource>,
    pub reasoning: Option<String>,
    pub duration_ms: Option<u64>,
    pub input_excerpt: Option<String>,
    pub transaction_id: Option<String>,
    pub details: serde_json::Value,
}

impl PostDecisionRequest {
    pub fn new(context: DecisionContext, decision: impl Into<String>, final_confidence: u8) -> Self {
        Self {
            context,
            decision: decision.into(),
            final_confidence: final_confidence.min(100),
            llm_confidence: None,
            heuristic_confidence: None,
            weights_used: ScoringWeights::default(),
            was_correct: None,
            auto_applied: false,
            source: None,
            reasoning: None,
            duration_ms: None,
            input_excerpt: None,
            transaction_id: None,
            details: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn with_signals(mut self, llm: u8, heuristic: u8, weights: ScoringWeights) -> Self {
        self.llm_confidence = Some(llm.min(100));
        self.heuristic_confidence = Some(heuristic.min(100));
        self.weights_used = weights;
        self
    }

    pub fn with_outcome(mut self, was_correct: bool) -> Self {
        self.was_correct = Some(was_correct);
        self
    }

    pub fn with_auto_applied(mut self, auto_applied: bool) -> Self {
        self.auto_applied = auto_applied;
        self
    }

    pub fn with_source(mut self, source: DecisionSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_input_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.input_excerpt = Some(excerpt.into());
        self
    }

    pub fn with_transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn assumed_correct(&self) -> bool {
        self.was_correct.unwrap_or(true)
    }

    pub fn signals(&self) -> DecisionSignals {
        DecisionSignals {
            final_confidence: self.final_confidence,
            llm_confidence: self.llm_confidence,
            heuristic_confidence: self.heuristic_confidence,
            weights: self.weights_used,
        }
    }
}

/// A human override of an earlier decision.
#[derive(Debug, Clone)]
pub struct CorrectionRequest {
    pub context: DecisionContext,
    pub original_decision: String,
    pub corrected_decision: String,
    /// Final confidence the original decision was made with.
    pub original_confidence: u8,
    pub decided_at: DateTime<Utc>,
    pub corrected_at: DateTime<Utc>,
    pub input_excerpt: Option<String>,
    pub transaction_id: Option<String>,
    pub reasoning: Option<String>,
}

impl CorrectionRequest {
    pub fn new(
        context: DecisionContext,
        original_decision: impl Into<String>,
        corrected_decision: impl Into<String>,
        original_confidence: u8,
        decided_at: DateTime<Utc>,
    ) -> Self {
        Self {
            context,
            original_decision: original_decision.into(),
            corrected_decision: corrected_decision.into(),
            original_confidence: original_confidence.min(100),
            decided_at,
            corrected_at: Utc::now(),
            input_excerpt: None,
            transaction_id: None,
            reasoning: None,
        }
    }

    pub fn with_input_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.input_excerpt = Some(excerpt.into());
        self
    }

    pub fn with_transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn corrected_at(mut self, corrected_at: DateTime<Utc>) -> Self {
        self.corrected_at = corrected_at;
        self
    }

    /// Whether the correction arrived soon enough to feed the learning loop.
    pub fn within(&self, window: Duration) -> bool {
        let Ok(window) = chrono::Duration::from_std(window) else {
            return true;
        };
        let elapsed = self.corrected_at - self.decided_at;
        elapsed >= chrono::Duration::zero() && elapsed <= window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerline_cortex::TenantId;

    fn context() -> DecisionContext {
        DecisionContext::new(TenantId::new(), "categorizer")
    }

    #[test]
    fn test_warning_codes_serialize_to_wire_names() {
        assert_eq!(
            serde_json::to_string(&WarningCode::PreviouslyCorrected).unwrap(),
            "\"WARNING_PREVIOUSLY_CORRECTED\""
        );
        assert_eq!(
            WarningCode::SemanticMatchCorrected.to_string(),
            "WARNING_SEMANTIC_MATCH_CORRECTED"
        );
    }

    #[test]
    fn test_missing_outcome_is_assumed_correct() {
        let req = PostDecisionRequest::new(context(), "5200", 88);
        assert!(req.assumed_correct());
        assert!(!req.with_outcome(false).assumed_correct());
    }

    #[test]
    fn test_signals_fall_back_to_defaults() {
        let req = PostDecisionRequest::new(context(), "5200", 140);
        let signals = req.signals();
        assert_eq!(signals.final_confidence, 100);
        assert_eq!(signals.llm_confidence, None);
        assert_eq!(signals.weights, ScoringWeights::default());
    }

    #[test]
    fn test_correction_window() {
        let decided = Utc::now() - chrono::Duration::days(10);
        let window = Duration::from_secs(30 * 24 * 3600);

        let recent = CorrectionRequest::new(context(), "5200", "5300", 80, decided);
        assert!(recent.within(window));

        let late = CorrectionRequest::new(context(), "5200", "5300", 80, decided - chrono::Duration::days(40));
        assert!(!late.within(window));

        let backdated = CorrectionRequest::new(context(), "5200", "5300", 80, Utc::now() + chrono::Duration::days(1));
        assert!(!backdated.within(window));
    }
}
