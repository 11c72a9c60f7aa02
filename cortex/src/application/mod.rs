// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod weight_engine;

pub use weight_engine::{
    weights_for_quality, AdaptiveWeightConfig, AdaptiveWeightEngine, NoAdaptiveWeights, WeightSource,
};
