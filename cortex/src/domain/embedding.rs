// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Context Embedding Builder
//!
//! Deterministic, parameter-free mapping from a [`DecisionContext`] to a
//! 256-dimensional unit vector.
//!
//! The vector is split into four equal chunks, one per context field
//! (tenant, agent type, transaction class, amount bucket). Each field is
//! hashed independently with SHA-256; digest byte pairs become floats in
//! `[-1, 1]`. The concatenation is L2-normalised.
//!
//! Two contexts that share three of four fields therefore land at a cosine
//! similarity of roughly 0.75, two shared fields at roughly 0.5. The pattern
//! index relies on that spread for its similarity floor.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::context::DecisionContext;

pub const EMBEDDING_DIM: usize = 256;
const FIELD_COUNT: usize = 4;
const CHUNK_DIM: usize = EMBEDDING_DIM / FIELD_COUNT;
const UNKNOWN_FIELD: &str = "unknown";

/// Fixed-length, unit-norm context vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextEmbedding(pub Vec<f32>);

impl ContextEmbedding {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn cosine_similarity(&self, other: &ContextEmbedding) -> Option<f64> {
        cosine_similarity(&self.0, &other.0)
    }
}

/// Embed a decision context. Pure, no I/O, cannot fail.
pub fn embed(context: &DecisionContext) -> ContextEmbedding {
    let tenant = context.tenant_id.to_string();
    let fields: [(&str, &str); FIELD_COUNT] = [
        ("tenant", tenant.as_str()),
        ("agent", context.agent_type.as_str()),
        (
            "class",
            context.transaction_class.as_deref().unwrap_or(UNKNOWN_FIELD),
        ),
        (
            "amount",
            context
                .amount_bucket
                .as_ref()
                .map(|b| b.as_str())
                .unwrap_or(UNKNOWN_FIELD),
        ),
    ];

    let mut vector = Vec::with_capacity(EMBEDDING_DIM);
    for (name, value) in fields {
        vector.extend(hash_field(name, value));
    }

    l2_normalize(&mut vector);
    ContextEmbedding(vector)
}

/// Expand one field into `CHUNK_DIM` floats.
///
/// A single SHA-256 digest yields 16 byte pairs; the chunk needs 64, so the
/// digest is re-derived with a block counter until the chunk is full.
fn hash_field(name: &str, value: &str) -> Vec<f32> {
    let mut out = Vec::with_capacity(CHUNK_DIM);
    let mut block: u32 = 0;

    while out.len() < CHUNK_DIM {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(value.as_bytes());
        hasher.update(block.to_le_bytes());
        let digest = hasher.finalize();

        for pair in digest.chunks_exact(2) {
            if out.len() == CHUNK_DIM {
                break;
            }
            let raw = u16::from_be_bytes([pair[0], pair[1]]);
            out.push((raw as f32 / u16::MAX as f32) * 2.0 - 1.0);
        }
        block += 1;
    }

    out
}

pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector
        .iter()
        .map(|v| f64::from(*v) * f64::from(*v))
        .sum::<f64>()
        .sqrt();
    if norm <= f64::EPSILON {
        return;
    }
    for v in vector.iter_mut() {
        *v = (f64::from(*v) / norm) as f32;
    }
}

/// Cosine similarity; `None` for mismatched or degenerate vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x64 = f64::from(x);
        let y64 = f64::from(y);
        dot += x64 * y64;
        norm_a += x64 * x64;
        norm_b += y64 * y64;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return None;
    }
    Some(dot / denom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::{AmountBucket, TenantId};

    fn context(tenant: TenantId) -> DecisionContext {
        DecisionContext::new(tenant, "categorizer")
            .with_transaction_class("bank_fee")
            .with_amount_bucket(AmountBucket::from_cents(45_000))
    }

    #[test]
    fn test_embedding_is_unit_length() {
        let emb = embed(&context(TenantId::new()));
        assert_eq!(emb.dimension(), EMBEDDING_DIM);

        let norm: f64 = emb.0.iter().map(|v| f64::from(*v).powi(2)).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm was {norm}");
    }

    #[test]
    fn test_embedding_is_deterministic() {
        let tenant = TenantId::new();
        let a = embed(&context(tenant));
        let b = embed(&context(tenant));

        let bits_a: Vec<u32> = a.0.iter().map(|v| v.to_bits()).collect();
        let bits_b: Vec<u32> = b.0.iter().map(|v| v.to_bits()).collect();
        assert_eq!(bits_a, bits_b);
    }

    #[test]
    fn test_embedding_differs_by_tenant() {
        let a = embed(&context(TenantId::new()));
        let b = embed(&context(TenantId::new()));

        assert_ne!(a, b);
        let similarity = a.cosine_similarity(&b).unwrap();
        assert!(similarity < 0.95, "similarity was {similarity}");
    }

    #[test]
    fn test_missing_fields_hash_as_unknown() {
        let tenant = TenantId::new();
        let bare = DecisionContext::new(tenant, "categorizer");
        let explicit = DecisionContext::new(tenant, "categorizer")
            .with_transaction_class("unknown")
            .with_amount_bucket(AmountBucket::new("unknown"));

        assert_eq!(embed(&bare), embed(&explicit));
    }

    #[test]
    fn test_shared_fields_raise_similarity() {
        let tenant = TenantId::new();
        let base = context(tenant);
        let other_agent = DecisionContext {
            agent_type: "payment_matcher".into(),
            ..base.clone()
        };
        let other_agent_and_class = DecisionContext {
            transaction_class: Some("salary".to_string()),
            ..other_agent.clone()
        };

        let base_emb = embed(&base);
        let one_diff = base_emb.cosine_similarity(&embed(&other_agent)).unwrap();
        let two_diff = base_emb
            .cosine_similarity(&embed(&other_agent_and_class))
            .unwrap();

        assert!(one_diff > two_diff);
        assert!(one_diff < 0.95);
    }

    #[test]
    fn test_cosine_similarity_rejects_mismatched_lengths() {
        assert!(cosine_similarity(&[1.0, 0.0], &[1.0]).is_none());
        assert!(cosine_similarity(&[], &[]).is_none());
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).is_none());
    }
}
