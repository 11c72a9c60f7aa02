// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer for the cortex: in-process stores and the text embedder.

pub mod pattern_index;
pub mod decision_memory;
pub mod embedding_client;

pub use pattern_index::{InMemoryPatternIndex, NullPatternIndex};
pub use decision_memory::{InMemoryDecisionMemory, NullDecisionMemory};
pub use embedding_client::{HashingTextEmbedder, TEXT_EMBEDDING_DIM};
