use tracing::warn;

use crate::clustering::{Cluster, ClusteringError, Clusterer, normalise_vectors, regroup, vector_length};
use crate::distance::DistanceMetric;
use crate::random::RandomGenerator;

/// Density-based clusterer over min-max normalised vectors.
///
/// A point is a core point when at least `min_points` points (itself included) lie within
/// `radius` of it. Clusters grow by chaining core points; a point no core point reaches
/// becomes a singleton cluster, so every input ends up in exactly one cluster.
///
/// When the input cannot be clustered (fewer than two points, bad radius or neighbourhood
/// size) the work is handed to `fallback`. Without a fallback the error is returned.
#[derive(Debug, Clone, PartialEq)]
pub struct DbscanClusterer<F> {
    min_points: usize,
    radius: f64,
    metric: DistanceMetric,
    fallback: Option<F>,
}

impl<F: Clusterer> DbscanClusterer<F> {
    pub fn new(min_points: usize, radius: f64, metric: DistanceMetric) -> Self {
        Self {
            min_points,
            radius,
            metric,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: F) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn fallback(&self) -> Option<&F> {
        self.fallback.as_ref()
    }

    fn check(&self, points: usize) -> Result<(), ClusteringError> {
        if points < 2 {
            return Err(ClusteringError::TooFewPoints(points));
        }
        if !self.radius.is_finite() || self.radius < 0.0 {
            return Err(ClusteringError::InvalidRadius(self.radius));
        }
        if self.min_points < 2 {
            return Err(ClusteringError::InvalidMinPoints(self.min_points));
        }
        Ok(())
    }

    fn neighbours(&self, vectors: &[Vec<f64>], index: usize) -> Vec<usize> {
        (0..vectors.len())
            .filter(|&other| self.metric.distance(&vectors[index], &vectors[other]) <= self.radius)
            .collect()
    }

    fn cluster_indices(&self, vectors: &[Vec<f64>]) -> Vec<Vec<usize>> {
        let mut visited = vec![false; vectors.len()];
        let mut assigned = vec![false; vectors.len()];
        let mut groups = Vec::new();

        for start in 0..vectors.len() {
            if visited[start] {
                continue;
            }
            visited[start] = true;

            let mut frontier = self.neighbours(vectors, start);
            if frontier.len() < self.min_points {
                continue;
            }

            let mut group = Vec::new();
            let mut cursor = 0;
            while cursor < frontier.len() {
                let point = frontier[cursor];
                if !visited[point] {
                    visited[point] = true;
                    let reach = self.neighbours(vectors, point);
                    if reach.len() >= self.min_points {
                        for other in reach {
                            if !frontier.contains(&other) {
                                frontier.push(other);
                            }
                        }
                    }
                }
                if !assigned[point] {
                    assigned[point] = true;
                    group.push(point);
                }
                cursor += 1;
            }
            groups.push(group);
        }

        // Noise points each form their own cluster.
        for (index, _) in assigned.iter().enumerate().filter(|(_, a)| !**a) {
            groups.push(vec![index]);
        }
        groups
    }
}

impl<F: Clusterer> Clusterer for DbscanClusterer<F> {
    fn generate_clusters<R: RandomGenerator>(
        &self,
        vectors: &[Vec<f64>],
        random: &mut R,
    ) -> Result<Vec<Cluster>, ClusteringError> {
        let checked = vector_length(vectors).and_then(|_| self.check(vectors.len()));
        if let Err(error) = checked {
            return match &self.fallback {
                Some(fallback) => {
                    warn!(%error, points = vectors.len(), "density clustering failed, using fallback");
                    fallback.generate_clusters(vectors, random)
                }
                None => Err(error),
            };
        }

        let normalised = normalise_vectors(vectors);
        Ok(regroup(vectors, self.cluster_indices(&normalised)))
    }
}
