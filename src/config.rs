//! Search configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::budget::Budget;
use crate::clustering::ClusteringAlgorithm;
use crate::distance::DistanceMetric;

/// Errors found while validating or loading a [`SearchConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Anneal horizon must be positive")]
    ZeroAnnealHorizon,

    #[error("Cluster ratio must be a positive finite number, got {0}")]
    InvalidClusterRatio(f64),

    #[error("Rollout depth must be positive")]
    ZeroRolloutDepth,

    #[error("Clusterer needs at least one refinement cycle")]
    ZeroClustererCycles,

    #[error("Epsilon must be a positive finite number, got {0}")]
    InvalidEpsilon(f64),

    #[error("Exploration constant must be finite and non-negative, got {0}")]
    InvalidExploration(f64),

    #[error("Budget limit must be positive: {0:?}")]
    EmptyBudget(Budget),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Configuration for collapsing Monte Carlo tree search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// When to stop searching.
    pub budget: Budget,

    /// Exploration constant K of the UCT formula.
    pub exploration: f64,

    /// Depth, counted from the root, at which tree descent and rollouts stop.
    pub rollout_depth: usize,

    /// Guards divisions by zero visits and bounds the tie-breaking noise.
    pub epsilon: f64,

    /// Cluster similar children and share statistics among them.
    /// When false the search is plain UCT.
    pub collapsing: bool,

    /// Expected clusters per node as a fraction of its legal actions.
    pub cluster_ratio: f64,

    /// Refinement rounds of the centroid clusterer.
    pub clusterer_cycles: usize,

    /// Action-sampler updates after which a reweighted distribution is uniform again.
    pub anneal_horizon: usize,

    pub distance: DistanceMetric,

    pub algorithm: ClusteringAlgorithm,

    /// Draw rollout actions from the action sampler instead of uniformly.
    /// Only used when collapsing.
    pub sampled_rollouts: bool,

    /// Keep the most visited subtree as the root of the next decision.
    pub reuse_tree: bool,

    /// A time budget stops once fewer than this many milliseconds remain.
    pub time_margin_millis: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            budget: Budget::default(),
            exploration: std::f64::consts::SQRT_2,
            rollout_depth: 8,
            epsilon: 1e-6,
            collapsing: true,
            cluster_ratio: 0.25,
            clusterer_cycles: 4,
            anneal_horizon: 100,
            distance: DistanceMetric::Euclidean,
            algorithm: ClusteringAlgorithm::KMeans,
            sampled_rollouts: true,
            reuse_tree: false,
            time_margin_millis: 2,
        }
    }
}

impl SearchConfig {
    /// Plain UCT with otherwise default settings.
    pub fn vanilla() -> Self {
        Self {
            collapsing: false,
            ..Self::default()
        }
    }

    /// A small iteration budget for tests.
    pub fn for_testing() -> Self {
        Self {
            budget: Budget::Iterations { count: 50 },
            rollout_depth: 4,
            ..Self::default()
        }
    }

    /// Parses a TOML document. Missing fields take their default values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SearchConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the search cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.anneal_horizon == 0 {
            return Err(ConfigError::ZeroAnnealHorizon);
        }
        if !(self.cluster_ratio.is_finite() && self.cluster_ratio > 0.0) {
            return Err(ConfigError::InvalidClusterRatio(self.cluster_ratio));
        }
        if self.rollout_depth == 0 {
            return Err(ConfigError::ZeroRolloutDepth);
        }
        if self.clusterer_cycles == 0 {
            return Err(ConfigError::ZeroClustererCycles);
        }
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(ConfigError::InvalidEpsilon(self.epsilon));
        }
        if !(self.exploration.is_finite() && self.exploration >= 0.0) {
            return Err(ConfigError::InvalidExploration(self.exploration));
        }
        if self.budget.limit() == 0 {
            return Err(ConfigError::EmptyBudget(self.budget));
        }
        Ok(())
    }

    pub fn with_budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_iterations(self, count: u32) -> Self {
        self.with_budget(Budget::Iterations { count })
    }

    pub fn with_exploration(mut self, k: f64) -> Self {
        self.exploration = k;
        self
    }

    pub fn with_rollout_depth(mut self, depth: usize) -> Self {
        self.rollout_depth = depth;
        self
    }

    pub fn with_collapsing(mut self, collapsing: bool) -> Self {
        self.collapsing = collapsing;
        self
    }

    pub fn with_cluster_ratio(mut self, ratio: f64) -> Self {
        self.cluster_ratio = ratio;
        self
    }

    pub fn with_clusterer_cycles(mut self, cycles: usize) -> Self {
        self.clusterer_cycles = cycles;
        self
    }

    pub fn with_anneal_horizon(mut self, horizon: usize) -> Self {
        self.anneal_horizon = horizon;
        self
    }

    pub fn with_distance(mut self, distance: DistanceMetric) -> Self {
        self.distance = distance;
        self
    }

    pub fn with_algorithm(mut self, algorithm: ClusteringAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_sampled_rollouts(mut self, sampled: bool) -> Self {
        self.sampled_rollouts = sampled;
        self
    }

    pub fn with_tree_reuse(mut self, reuse: bool) -> Self {
        self.reuse_tree = reuse;
        self
    }
}
