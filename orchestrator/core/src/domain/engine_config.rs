// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0

// Engine Configuration
//
// YAML document tuning the decision engine:
// - default signal weights for cold starts
// - adaptive weight retrieval (k, similarity cut-off, timeout)
// - pre-decision advisory thresholds and penalties
// - the correction window that closes the learning loop
// - audit pagination and the optional PostgreSQL connection

use ledgerline_cortex::{AdaptiveWeightConfig, ScoringWeights, HEURISTIC_FLOOR};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "LEDGERLINE_CONFIG_PATH";
pub const DATABASE_URL_ENV: &str = "LEDGERLINE_DATABASE_URL";
const DEFAULT_CONFIG_FILE: &str = "./ledgerline.yaml";

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scoring: ScoringConfig,
    pub adaptive: AdaptiveWeightConfig,
    pub hooks: HooksConfig,
    pub outcome: OutcomeConfig,
    pub audit: AuditConfig,
    pub database: DatabaseConfig,
}

/// Weights used when the adaptive engine has nothing to say.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub default_llm_weight: f64,
    pub default_heuristic_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let weights = ScoringWeights::default();
        Self {
            default_llm_weight: weights.llm,
            default_heuristic_weight: weights.heuristic,
        }
    }
}

impl ScoringConfig {
    pub fn default_weights(&self) -> ScoringWeights {
        ScoringWeights::new(self.default_llm_weight, self.default_heuristic_weight)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    /// How far back CORRECTION entries count towards the history warning.
    #[serde(with = "humantime_serde")]
    pub correction_lookback: Duration,
    pub correction_threshold: u64,
    pub correction_penalty: i32,
    pub semantic_penalty: i32,
    pub semantic_similarity_threshold: f64,
    pub semantic_search_limit: usize,
    /// Used when the caller does not pass its own deadline.
    #[serde(with = "humantime_serde")]
    pub pre_decision_timeout: Duration,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            correction_lookback: 30 * DAY,
            correction_threshold: 3,
            correction_penalty: -10,
            semantic_penalty: -5,
            semantic_similarity_threshold: 0.85,
            semantic_search_limit: 5,
            pre_decision_timeout: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutcomeConfig {
    /// A decision not corrected within this window is treated as correct.
    /// Later corrections are audited but not learned from.
    #[serde(with = "humantime_serde")]
    pub correction_window: Duration,
}

impl Default for OutcomeConfig {
    fn default() -> Self {
        Self {
            correction_window: 30 * DAY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            default_page_size: 50,
            max_page_size: 500,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl EngineConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. LEDGERLINE_CONFIG_PATH environment variable
    /// 2. ./ledgerline.yaml (working directory)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            tracing::warn!("{} points at a missing file: {:?}", CONFIG_PATH_ENV, path);
        }

        let cwd = PathBuf::from(DEFAULT_CONFIG_FILE);
        if cwd.exists() {
            return Some(cwd);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // An explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = match Self::discover_config() {
            Some(config_path) => {
                tracing::info!("Loading configuration from discovered path: {:?}", config_path);
                Self::from_yaml_file(config_path)?
            }
            None => {
                tracing::debug!("No configuration file found, using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            if url.trim().is_empty() {
                tracing::warn!("{} is set but empty. Ignoring.", DATABASE_URL_ENV);
            } else {
                tracing::info!("Environment override: {} set", DATABASE_URL_ENV);
                self.database.url = Some(url);
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let scoring = &self.scoring;
        for (name, w) in [
            ("scoring.default_llm_weight", scoring.default_llm_weight),
            ("scoring.default_heuristic_weight", scoring.default_heuristic_weight),
        ] {
            if !(0.0..=1.0).contains(&w) {
                anyhow::bail!("{} must be within [0, 1], got {}", name, w);
            }
        }
        let sum = scoring.default_llm_weight + scoring.default_heuristic_weight;
        if (sum - 1.0).abs() > 1e-6 {
            anyhow::bail!("Default weights must sum to 1.0, got {}", sum);
        }
        if scoring.default_heuristic_weight < HEURISTIC_FLOOR {
            anyhow::bail!(
                "scoring.default_heuristic_weight {} is below the {} floor",
                scoring.default_heuristic_weight,
                HEURISTIC_FLOOR
            );
        }

        let adaptive = &self.adaptive;
        if adaptive.neighbours == 0 {
            anyhow::bail!("adaptive.neighbours must be positive");
        }
        if adaptive.min_trajectories == 0 {
            anyhow::bail!("adaptive.min_trajectories must be positive");
        }
        if adaptive.min_trajectories > adaptive.neighbours {
            anyhow::bail!(
                "adaptive.min_trajectories ({}) cannot exceed adaptive.neighbours ({})",
                adaptive.min_trajectories,
                adaptive.neighbours
            );
        }
        if !(0.0..=1.0).contains(&adaptive.min_similarity) {
            anyhow::bail!("adaptive.min_similarity must be within [0, 1]");
        }

        let hooks = &self.hooks;
        if hooks.correction_threshold == 0 {
            anyhow::bail!("hooks.correction_threshold must be positive");
        }
        if hooks.correction_penalty > 0 || hooks.semantic_penalty > 0 {
            anyhow::bail!("Confidence penalties must be zero or negative");
        }
        if !(0.0..=1.0).contains(&hooks.semantic_similarity_threshold) {
            anyhow::bail!("hooks.semantic_similarity_threshold must be within [0, 1]");
        }
        if hooks.semantic_search_limit == 0 {
            anyhow::bail!("hooks.semantic_search_limit must be positive");
        }

        let audit = &self.audit;
        if audit.default_page_size == 0 || audit.max_page_size == 0 {
            anyhow::bail!("Audit page sizes must be positive");
        }
        if audit.default_page_size > audit.max_page_size {
            anyhow::bail!(
                "audit.default_page_size ({}) exceeds audit.max_page_size ({})",
                audit.default_page_size,
                audit.max_page_size
            );
        }

        if let Some(url) = &self.database.url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                anyhow::bail!("database.url must be a postgres:// URL");
            }
        }

        Ok(())
    }
}
