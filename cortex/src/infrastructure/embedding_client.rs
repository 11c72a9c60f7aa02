// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Text Embedding Client
//!
//! Turns a raw input excerpt (bank narration, invoice line, payer reference)
//! into a vector for the decision memory.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements `TextEmbedder`

//! The default embedder is a signed feature-hashing bag of words and
//! character trigrams over 384 dimensions (the width of all-MiniLM-L6-v2, so
//! a model-backed embedder can be swapped in without resizing stored
//! vectors). Narrations that differ only in a reference number or date still
//! score well above the 0.85 match threshold; unrelated narrations do not.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::domain::embedding::l2_normalize;
use crate::domain::repository::{CortexError, TextEmbedder};

pub const TEXT_EMBEDDING_DIM: usize = 384;

#[derive(Debug, Clone)]
pub struct HashingTextEmbedder {
    dimension: usize,
}

impl HashingTextEmbedder {
    pub fn new() -> Self {
        Self {
            dimension: TEXT_EMBEDDING_DIM,
        }
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let bucket = u64::from_be_bytes([
            digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
        ]) as usize
            % self.dimension;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for HashingTextEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextEmbedder for HashingTextEmbedder {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, CortexError> {
        let normalized = text.to_lowercase();
        let tokens: Vec<&str> = normalized
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty() && !t.chars().all(|c| c.is_ascii_digit()))
            .collect();

        // Pure reference numbers carry no meaning to match on
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut vector = vec![0.0f32; self.dimension];
        for token in &tokens {
            self.add_feature(&mut vector, &format!("w:{token}"), 1.0);

            let chars: Vec<char> = token.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                self.add_feature(&mut vector, &format!("c:{trigram}"), 0.5);
            }
        }

        l2_normalize(&mut vector);
        Ok(vector)
    }
}
