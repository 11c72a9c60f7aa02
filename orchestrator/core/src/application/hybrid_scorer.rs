// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Hybrid Scorer
//!
//! Blends the LLM confidence and the heuristic confidence into one 0-100
//! score. Weights come from the configured [`WeightSource`] when it has an
//! opinion and from the process defaults otherwise. Whatever their origin,
//! the pair is passed through [`ScoringWeights::with_safety_floor`] before
//! use, so the heuristic never carries less than 20% of the score.

use ledgerline_cortex::{DecisionContext, NoAdaptiveWeights, ScoringWeights, WeightSource, WeightSourceKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridScore {
    pub score: u8,
    pub weights_used: ScoringWeights,
    pub source: WeightSourceKind,
}

pub struct HybridScorer {
    weights: Arc<dyn WeightSource>,
    defaults: ScoringWeights,
}

impl HybridScorer {
    pub fn new(weights: Arc<dyn WeightSource>) -> Self {
        Self {
            weights,
            defaults: ScoringWeights::default(),
        }
    }

    /// Scorer that always uses the default weights.
    pub fn without_adaptation() -> Self {
        Self::new(Arc::new(NoAdaptiveWeights))
    }

    pub fn with_defaults(mut self, defaults: ScoringWeights) -> Self {
        self.defaults = defaults;
        self
    }

    pub async fn combine(&self, llm_confidence: u8, heuristic_confidence: u8, context: &DecisionContext) -> HybridScore {
        let (weights, source) = match self.weights.resolve_weights(context).await {
            Some(w) => (w, WeightSourceKind::Adaptive),
            None => (self.defaults, WeightSourceKind::Default),
        };
        let weights = weights.with_safety_floor();

        metrics::counter!("ledgerline_weights_resolved_total", "source" => source.as_str()).increment(1);

        let score = blend(llm_confidence, heuristic_confidence, weights);
        debug!(
            tenant_id = %context.tenant_id,
            agent_type = %context.agent_type,
            llm_confidence,
            heuristic_confidence,
            llm_weight = weights.llm,
            heuristic_weight = weights.heuristic,
            source = source.as_str(),
            score,
            "Combined confidence"
        );

        HybridScore {
            score,
            weights_used: weights,
            source,
        }
    }
}

fn blend(llm: u8, heuristic: u8, weights: ScoringWeights) -> u8 {
    let llm = f64::from(llm.min(100));
    let heuristic = f64::from(heuristic.min(100));
    let raw = llm * weights.llm + heuristic * weights.heuristic;
    raw.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ledgerline_cortex::{TenantId, HEURISTIC_FLOOR};

    struct FixedWeights(ScoringWeights);

    #[async_trait]
    impl WeightSource for FixedWeights {
        async fn resolve_weights(&self, _context: &DecisionContext) -> Option<ScoringWeights> {
            Some(self.0)
        }
    }

    fn context() -> DecisionContext {
        DecisionContext::new(TenantId::new(), "categorizer")
    }

    #[tokio::test]
    async fn test_default_weights_without_adaptation() {
        let scorer = HybridScorer::without_adaptation();

        let result = scorer.combine(90, 60, &context()).await;

        assert_eq!(result.score, 78);
        assert_eq!(result.weights_used, ScoringWeights::default());
        assert_eq!(result.source, WeightSourceKind::Default);
    }

    #[tokio::test]
    async fn test_adaptive_weights_are_used() {
        let scorer = HybridScorer::new(Arc::new(FixedWeights(ScoringWeights {
            llm: 0.7,
            heuristic: 0.3,
        })));

        let result = scorer.combine(90, 60, &context()).await;

        assert_eq!(result.score, 81);
        assert_eq!(result.source, WeightSourceKind::Adaptive);
        assert!((result.weights_used.llm - 0.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_floor_applies_to_adaptive_weights() {
        let scorer = HybridScorer::new(Arc::new(FixedWeights(ScoringWeights {
            llm: 0.95,
            heuristic: 0.05,
        })));

        let result = scorer.combine(90, 60, &context()).await;

        assert!((result.weights_used.heuristic - HEURISTIC_FLOOR).abs() < 1e-9);
        assert!((result.weights_used.llm - 0.8).abs() < 1e-9);
        assert_eq!(result.score, 84);
    }

    #[tokio::test]
    async fn test_floor_applies_to_configured_defaults() {
        let scorer = HybridScorer::without_adaptation().with_defaults(ScoringWeights {
            llm: 1.0,
            heuristic: 0.0,
        });

        let result = scorer.combine(100, 0, &context()).await;

        assert!(result.weights_used.satisfies_floor());
        assert_eq!(result.score, 80);
    }

    #[tokio::test]
    async fn test_unnormalised_weights_are_rescaled() {
        let scorer = HybridScorer::new(Arc::new(FixedWeights(ScoringWeights { llm: 3.0, heuristic: 1.0 })));

        let result = scorer.combine(100, 0, &context()).await;

        assert!((result.weights_used.llm + result.weights_used.heuristic - 1.0).abs() < 1e-9);
        assert_eq!(result.score, 75);
    }

    #[test]
    fn test_blend_bounds() {
        assert_eq!(blend(0, 0, ScoringWeights::default()), 0);
        assert_eq!(blend(100, 100, ScoringWeights::default()), 100);
        assert_eq!(blend(200, 255, ScoringWeights::default()), 100);
    }
}
