// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain model for the learning and memory layer.

pub mod context;
pub mod embedding;
pub mod weights;
pub mod trajectory;
pub mod repository;

pub use context::*;
pub use embedding::{embed, ContextEmbedding, EMBEDDING_DIM};
pub use weights::*;
pub use trajectory::*;
pub use repository::*;
