// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Adaptive Weight Engine
//!
//! Learns, per tenant and context, how much to trust the LLM signal versus
//! the rule/pattern heuristic.
//!
//! Given a [`DecisionContext`], the engine embeds it, pulls the `k` nearest
//! trajectories from the [`PatternIndex`] and looks at how decisive past
//! final scores were in that neighbourhood:
//!
//! | mean quality | regime | weights |
//! |--------------|--------|---------|
//! | `> 0.6` | LLM decisive | `llm = min(0.8, 0.5 + (q - 0.5) * 0.4)` |
//! | `< 0.4` | heuristic decisive | `heuristic = min(0.8, 0.5 + (0.5 - q) * 0.4)` |
//! | otherwise | balanced | `{llm: 0.55, heuristic: 0.45}` |
//!
//! Fewer than `min_trajectories` neighbours is a cold start and yields
//! `None`; the caller falls back to its defaults. Retrieval failures and
//! timeouts also yield `None`. The engine never returns an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::context::DecisionContext;
use crate::domain::embedding::embed;
use crate::domain::repository::PatternIndex;
use crate::domain::weights::{ScoringWeights, HEURISTIC_FLOOR};

const HIGH_QUALITY_THRESHOLD: f64 = 0.6;
const LOW_QUALITY_THRESHOLD: f64 = 0.4;
const MAX_DOMINANT_WEIGHT: f64 = 0.8;
const QUALITY_GAIN: f64 = 0.4;

/// Anything that can recommend weights for a context.
#[async_trait]
pub trait WeightSource: Send + Sync {
    /// Recommended weights, or `None` to use the caller's defaults.
    async fn resolve_weights(&self, context: &DecisionContext) -> Option<ScoringWeights>;
}

/// Weight source for deployments without a pattern index.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAdaptiveWeights;

#[async_trait]
impl WeightSource for NoAdaptiveWeights {
    async fn resolve_weights(&self, _context: &DecisionContext) -> Option<ScoringWeights> {
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveWeightConfig {
    /// Neighbours retrieved per lookup.
    pub neighbours: usize,

    /// Minimum neighbours before adaptive weights are trusted.
    pub min_trajectories: usize,

    /// Opt-in cutoff: when above zero, neighbours below this cosine
    /// similarity are ignored. Contexts sharing three of four fields sit
    /// around 0.75, two of four around 0.5. Zero keeps every neighbour.
    pub min_similarity: f64,

    #[serde(with = "humantime_serde")]
    pub retrieval_timeout: Duration,
}

impl Default for AdaptiveWeightConfig {
    fn default() -> Self {
        Self {
            neighbours: 5,
            min_trajectories: 3,
            min_similarity: 0.0,
            retrieval_timeout: Duration::from_millis(250),
        }
    }
}

pub struct AdaptiveWeightEngine {
    index: Arc<dyn PatternIndex>,
    config: AdaptiveWeightConfig,
}

impl AdaptiveWeightEngine {
    pub fn new(index: Arc<dyn PatternIndex>) -> Self {
        Self {
            index,
            config: AdaptiveWeightConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AdaptiveWeightConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &AdaptiveWeightConfig {
        &self.config
    }
}

#[async_trait]
impl WeightSource for AdaptiveWeightEngine {
    async fn resolve_weights(&self, context: &DecisionContext) -> Option<ScoringWeights> {
        let embedding = embed(context);
        let lookup = self
            .index
            .find_similar(context.tenant_id, &embedding, self.config.neighbours);

        let neighbours = match tokio::time::timeout(self.config.retrieval_timeout, lookup).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                warn!(tenant_id = %context.tenant_id, error = %e, "Pattern retrieval failed, using default weights");
                return None;
            }
            Err(_) => {
                warn!(
                    tenant_id = %context.tenant_id,
                    timeout_ms = self.config.retrieval_timeout.as_millis() as u64,
                    "Pattern retrieval timed out, using default weights"
                );
                return None;
            }
        };

        let qualities: Vec<f64> = neighbours
            .iter()
            .filter(|n| self.config.min_similarity <= 0.0 || n.similarity >= self.config.min_similarity)
            .map(|n| n.quality)
            .collect();

        if qualities.len() < self.config.min_trajectories {
            debug!(
                tenant_id = %context.tenant_id,
                agent_type = %context.agent_type,
                found = qualities.len(),
                "Cold start, not enough trajectories for adaptive weights"
            );
            return None;
        }

        let avg_quality = qualities.iter().sum::<f64>() / qualities.len() as f64;
        let weights = weights_for_quality(avg_quality);
        debug!(
            tenant_id = %context.tenant_id,
            agent_type = %context.agent_type,
            avg_quality,
            llm = weights.llm,
            heuristic = weights.heuristic,
            "Resolved adaptive weights"
        );
        Some(weights)
    }
}

/// Map the mean decisiveness of a neighbourhood to a weight pair.
pub fn weights_for_quality(avg_quality: f64) -> ScoringWeights {
    let weights = if avg_quality > HIGH_QUALITY_THRESHOLD {
        let llm = MAX_DOMINANT_WEIGHT.min(0.5 + (avg_quality - 0.5) * QUALITY_GAIN);
        ScoringWeights {
            llm,
            heuristic: (1.0 - llm).max(HEURISTIC_FLOOR),
        }
    } else if avg_quality < LOW_QUALITY_THRESHOLD {
        let heuristic = MAX_DOMINANT_WEIGHT.min(0.5 + (0.5 - avg_quality) * QUALITY_GAIN);
        ScoringWeights {
            llm: 1.0 - heuristic,
            heuristic: heuristic.max(HEURISTIC_FLOOR),
        }
    } else {
        ScoringWeights::balanced()
    };

    weights.with_safety_floor()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::{AmountBucket, TenantId};
    use crate::domain::embedding::ContextEmbedding;
    use crate::domain::repository::{CortexError, SimilarTrajectory};
    use crate::domain::trajectory::{DecisionSignals, Trajectory};
    use crate::infrastructure::{InMemoryPatternIndex, NullPatternIndex};

    async fn seed(index: &InMemoryPatternIndex, ctx: &DecisionContext, qualities: &[f64]) {
        for &quality in qualities {
            let mut t = Trajectory::record(
                ctx.tenant_id,
                embed(ctx),
                DecisionSignals {
                    final_confidence: 50,
                    llm_confidence: None,
                    heuristic_confidence: None,
                    weights: ScoringWeights::default(),
                },
                true,
            );
            t.quality = quality;
            index.store(t).await.unwrap();
        }
    }

    fn context() -> DecisionContext {
        DecisionContext::new(TenantId::new(), "categorizer").with_transaction_class("bank_fee")
    }

    #[tokio::test]
    async fn test_cold_start_returns_none() {
        let index = Arc::new(InMemoryPatternIndex::new());
        let ctx = context();
        seed(&index, &ctx, &[0.9, 0.9]).await;

        let engine = AdaptiveWeightEngine::new(index);
        assert!(engine.resolve_weights(&ctx).await.is_none());
    }

    #[tokio::test]
    async fn test_decisive_history_favours_llm() {
        let index = Arc::new(InMemoryPatternIndex::new());
        let ctx = context();
        seed(&index, &ctx, &[0.8, 0.75, 0.7]).await;

        let engine = AdaptiveWeightEngine::new(index);
        let weights = engine.resolve_weights(&ctx).await.unwrap();
        assert!(weights.llm > 0.5);
        assert!((weights.llm - 0.6).abs() < 1e-9);
        assert!(weights.satisfies_floor());
    }

    #[tokio::test]
    async fn test_indecisive_history_favours_heuristic() {
        let index = Arc::new(InMemoryPatternIndex::new());
        let ctx = context();
        seed(&index, &ctx, &[0.2, 0.25, 0.3]).await;

        let engine = AdaptiveWeightEngine::new(index);
        let weights = engine.resolve_weights(&ctx).await.unwrap();
        assert!(weights.heuristic > 0.5);
        assert!((weights.heuristic - 0.6).abs() < 1e-9);
        assert!(weights.satisfies_floor());
    }

    #[tokio::test]
    async fn test_middle_quality_is_balanced() {
        let index = Arc::new(InMemoryPatternIndex::new());
        let ctx = context();
        seed(&index, &ctx, &[0.5, 0.45, 0.55]).await;

        let engine = AdaptiveWeightEngine::new(index);
        let weights = engine.resolve_weights(&ctx).await.unwrap();
        assert!((weights.llm - 0.55).abs() < 1e-9);
        assert!((weights.heuristic - 0.45).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_dissimilar_neighbours_still_count() {
        // Arrange
        let index = Arc::new(InMemoryPatternIndex::new());
        let tenant = TenantId::new();
        let history = DecisionContext::new(tenant, "categorizer")
            .with_transaction_class("salary")
            .with_amount_bucket(AmountBucket::new("large"));
        seed(&index, &history, &[0.8, 0.8, 0.8, 0.8, 0.8]).await;
        let query = DecisionContext::new(tenant, "categorizer")
            .with_transaction_class("debit_order")
            .with_amount_bucket(AmountBucket::new("small"));

        // Act
        let weights = AdaptiveWeightEngine::new(index).resolve_weights(&query).await;

        // Assert
        let weights = weights.expect("five neighbours are not a cold start");
        assert!(weights.llm > 0.5);
    }

    #[tokio::test]
    async fn test_similarity_cutoff_is_opt_in() {
        let index = Arc::new(InMemoryPatternIndex::new());
        let tenant = TenantId::new();
        let history = DecisionContext::new(tenant, "categorizer").with_transaction_class("salary");
        seed(&index, &history, &[0.8, 0.8, 0.8]).await;
        let query = DecisionContext::new(tenant, "payment_matcher").with_transaction_class("debit_order");

        let engine = AdaptiveWeightEngine::new(index).with_config(AdaptiveWeightConfig {
            min_similarity: 0.99,
            ..AdaptiveWeightConfig::default()
        });
        assert!(engine.resolve_weights(&query).await.is_none());
    }

    #[tokio::test]
    async fn test_other_tenants_do_not_count() {
        let index = Arc::new(InMemoryPatternIndex::new());
        let ctx = context();
        let foreign = DecisionContext {
            tenant_id: TenantId::new(),
            ..ctx.clone()
        };
        seed(&index, &foreign, &[0.9, 0.9, 0.9, 0.9]).await;

        let engine = AdaptiveWeightEngine::new(index);
        assert!(engine.resolve_weights(&ctx).await.is_none());
    }

    #[tokio::test]
    async fn test_unavailable_index_returns_none() {
        let engine = AdaptiveWeightEngine::new(Arc::new(NullPatternIndex));
        assert!(engine.resolve_weights(&context()).await.is_none());
    }

    struct FailingIndex;

    #[async_trait]
    impl PatternIndex for FailingIndex {
        async fn store(&self, _trajectory: Trajectory) -> Result<(), CortexError> {
            Err(CortexError::Unavailable("down".to_string()))
        }

        async fn find_similar(
            &self,
            _tenant_id: TenantId,
            _embedding: &ContextEmbedding,
            _k: usize,
        ) -> Result<Vec<SimilarTrajectory>, CortexError> {
            Err(CortexError::Unavailable("down".to_string()))
        }
    }

    struct SlowIndex;

    #[async_trait]
    impl PatternIndex for SlowIndex {
        async fn store(&self, _trajectory: Trajectory) -> Result<(), CortexError> {
            Ok(())
        }

        async fn find_similar(
            &self,
            _tenant_id: TenantId,
            _embedding: &ContextEmbedding,
            _k: usize,
        ) -> Result<Vec<SimilarTrajectory>, CortexError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_retrieval_errors_and_timeouts_return_none() {
        let failing = AdaptiveWeightEngine::new(Arc::new(FailingIndex));
        assert!(failing.resolve_weights(&context()).await.is_none());

        let slow = AdaptiveWeightEngine::new(Arc::new(SlowIndex)).with_config(AdaptiveWeightConfig {
            retrieval_timeout: Duration::from_millis(20),
            ..AdaptiveWeightConfig::default()
        });
        assert!(slow.resolve_weights(&context()).await.is_none());
    }

    #[test]
    fn test_weights_for_quality_respect_floor_everywhere() {
        for step in 0..=100 {
            let q = f64::from(step) / 100.0;
            let w = weights_for_quality(q);
            assert!(w.heuristic >= HEURISTIC_FLOOR - 1e-12, "q={q} w={w:?}");
            assert!((w.llm + w.heuristic - 1.0).abs() < 1e-9, "q={q} w={w:?}");
        }
    }

    #[test]
    fn test_weights_for_quality_caps_dominant_signal() {
        let w = weights_for_quality(1.0);
        assert!((w.llm - 0.7).abs() < 1e-9);

        let w = weights_for_quality(0.0);
        assert!((w.heuristic - 0.7).abs() < 1e-9);
    }
}
