//! Grouping of sibling states by the similarity of their signature vectors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SearchConfig;
use crate::distance::DistanceMetric;
use crate::heuristic::euclidean_norm;
use crate::random::RandomGenerator;

/// Density-based clusterer with a centroid fallback.
pub mod dbscan;
/// Iterative centroid clusterer.
pub mod kmeans;

pub use dbscan::DbscanClusterer;
pub use kmeans::KMeansClusterer;

/// Errors raised while partitioning signature vectors.
#[derive(Debug, Error, PartialEq)]
pub enum ClusteringError {
    #[error("No vectors to cluster")]
    EmptyInput,

    #[error("Vector {index} has length {found}, expected {expected}")]
    MismatchedLength {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("Density clustering needs at least two points, got {0}")]
    TooFewPoints(usize),

    #[error("Density clustering needs a finite non-negative radius, got {0}")]
    InvalidRadius(f64),

    #[error("Density clustering needs a neighbourhood of at least two points, got {0}")]
    InvalidMinPoints(usize),
}

/// One clustered vector: which input it came from, and its original (unnormalised) scores.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterMember {
    pub child: usize,
    pub signature: Vec<f64>,
}

/// A group of mutually similar vectors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cluster {
    pub members: Vec<ClusterMember>,
}

impl Cluster {
    /// The member with the largest signature norm. The first one wins ties.
    pub fn representative(&self) -> Option<&ClusterMember> {
        let mut best: Option<(&ClusterMember, f64)> = None;
        for member in &self.members {
            let norm = euclidean_norm(&member.signature);
            match best {
                Some((_, best_norm)) if norm <= best_norm => {}
                _ => best = Some((member, norm)),
            }
        }
        best.map(|(member, _)| member)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, child: usize) -> bool {
        self.members.iter().any(|m| m.child == child)
    }
}

/// Partitions signature vectors into clusters.
///
/// `child` in each returned member is the position of the vector in the input slice.
/// Implementations may return empty clusters; callers skip them.
pub trait Clusterer {
    fn generate_clusters<R: RandomGenerator>(
        &self,
        vectors: &[Vec<f64>],
        random: &mut R,
    ) -> Result<Vec<Cluster>, ClusteringError>;
}

/// Which clustering algorithm a node uses for its children.
#[derive(Debug, Default, PartialEq, Copy, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClusteringAlgorithm {
    #[default]
    #[serde(rename = "kmeans")]
    KMeans,
    Dbscan {
        min_points: usize,
        radius: f64,
    },
}

/// The clusterer a node owns, chosen from the search configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum StateClusterer {
    KMeans(KMeansClusterer),
    Dbscan(DbscanClusterer<KMeansClusterer>),
}

impl StateClusterer {
    /// Builds the clusterer for a node with `legal_actions` children.
    ///
    /// The expected cluster count is `round(cluster_ratio × legal_actions)`, at least one.
    /// The density variant falls back to the centroid variant with the same settings.
    pub fn for_node(config: &SearchConfig, legal_actions: usize) -> Self {
        let means_expected = ((config.cluster_ratio * legal_actions as f64).round() as usize).max(1);
        let kmeans = KMeansClusterer::new(means_expected, config.clusterer_cycles, config.distance);
        match config.algorithm {
            ClusteringAlgorithm::KMeans => StateClusterer::KMeans(kmeans),
            ClusteringAlgorithm::Dbscan { min_points, radius } => StateClusterer::Dbscan(
                DbscanClusterer::new(min_points, radius, config.distance).with_fallback(kmeans),
            ),
        }
    }
}

impl Clusterer for StateClusterer {
    fn generate_clusters<R: RandomGenerator>(
        &self,
        vectors: &[Vec<f64>],
        random: &mut R,
    ) -> Result<Vec<Cluster>, ClusteringError> {
        match self {
            StateClusterer::KMeans(c) => c.generate_clusters(vectors, random),
            StateClusterer::Dbscan(c) => c.generate_clusters(vectors, random),
        }
    }
}

/// Checks the input and returns the common vector length.
pub(crate) fn vector_length(vectors: &[Vec<f64>]) -> Result<usize, ClusteringError> {
    let expected = vectors.first().ok_or(ClusteringError::EmptyInput)?.len();
    for (index, vector) in vectors.iter().enumerate() {
        if vector.len() != expected {
            return Err(ClusteringError::MismatchedLength {
                index,
                expected,
                found: vector.len(),
            });
        }
    }
    Ok(expected)
}

/// Min-max normalises every dimension into `[0, 1]`. A dimension with zero range maps to 0.
pub fn normalise_vectors(vectors: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let mut normalised = vectors.to_vec();
    let length = vectors.first().map_or(0, Vec::len);
    for dim in 0..length {
        let (min, max) = vectors
            .iter()
            .map(|v| v[dim])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| (lo.min(x), hi.max(x)));
        let range = max - min;
        for vector in &mut normalised {
            vector[dim] = if range == 0.0 {
                0.0
            } else {
                (vector[dim] - min) / range
            };
        }
    }
    normalised
}

/// Turns groups of input indices into clusters carrying the original vectors.
pub fn regroup(vectors: &[Vec<f64>], groups: Vec<Vec<usize>>) -> Vec<Cluster> {
    groups
        .into_iter()
        .map(|indices| Cluster {
            members: indices
                .into_iter()
                .map(|child| ClusterMember {
                    child,
                    signature: vectors[child].clone(),
                })
                .collect(),
        })
        .collect()
}
