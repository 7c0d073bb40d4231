use crate::clustering::{Cluster, ClusteringError, Clusterer, normalise_vectors, regroup, vector_length};
use crate::distance::DistanceMetric;
use crate::random::RandomGenerator;

/// K-means style clusterer over min-max normalised vectors.
///
/// Centroids start at uniform random points of the unit cube and are refined for exactly
/// `cycles` assign/update rounds. A centroid that attracts no vector keeps its position.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansClusterer {
    means_expected: usize,
    cycles: usize,
    metric: DistanceMetric,
}

impl KMeansClusterer {
    pub fn new(means_expected: usize, cycles: usize, metric: DistanceMetric) -> Self {
        Self {
            means_expected: means_expected.max(1),
            cycles: cycles.max(1),
            metric,
        }
    }

    pub fn means_expected(&self) -> usize {
        self.means_expected
    }

    pub fn cycles(&self) -> usize {
        self.cycles
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Assigns every vector to its nearest centroid; the first centroid wins ties.
    fn assign(&self, means: &[Vec<f64>], vectors: &[Vec<f64>]) -> Vec<Vec<usize>> {
        let mut groups = vec![Vec::new(); means.len()];
        for (index, vector) in vectors.iter().enumerate() {
            let mut closest = f64::INFINITY;
            let mut closest_mean = 0;
            for (mean_index, mean) in means.iter().enumerate() {
                let distance = self.metric.distance(mean, vector);
                if distance < closest {
                    closest = distance;
                    closest_mean = mean_index;
                }
            }
            groups[closest_mean].push(index);
        }
        groups
    }

    fn update_means(means: &mut [Vec<f64>], groups: &[Vec<usize>], vectors: &[Vec<f64>]) {
        for (mean, group) in means.iter_mut().zip(groups) {
            if group.is_empty() {
                continue;
            }
            mean.iter_mut().for_each(|m| *m = 0.0);
            for &index in group {
                for (m, v) in mean.iter_mut().zip(&vectors[index]) {
                    *m += v;
                }
            }
            let count = group.len() as f64;
            mean.iter_mut().for_each(|m| *m /= count);
        }
    }
}

impl Clusterer for KMeansClusterer {
    fn generate_clusters<R: RandomGenerator>(
        &self,
        vectors: &[Vec<f64>],
        random: &mut R,
    ) -> Result<Vec<Cluster>, ClusteringError> {
        let length = vector_length(vectors)?;
        let normalised = normalise_vectors(vectors);

        let mut means: Vec<Vec<f64>> = (0..self.means_expected)
            .map(|_| (0..length).map(|_| random.next_f64()).collect())
            .collect();

        let mut groups = Vec::new();
        for _ in 0..self.cycles {
            groups = self.assign(&means, &normalised);
            Self::update_means(&mut means, &groups, &normalised);
        }

        Ok(regroup(vectors, groups))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{CustomNumberGenerator, StandardRandomGenerator};

    fn assert_partition(clusters: &[Cluster], count: usize) {
        let mut seen = vec![0; count];
        for cluster in clusters {
            for member in &cluster.members {
                seen[member.child] += 1;
            }
        }
        assert!(seen.iter().all(|&n| n == 1), "not a partition: {seen:?}");
    }

    #[test]
    fn every_vector_lands_in_exactly_one_cluster() {
        // arrange
        let vectors: Vec<Vec<f64>> = (0..9).map(|i| vec![i as f64, (i * i) as f64 % 7.0]).collect();
        let clusterer = KMeansClusterer::new(3, 4, DistanceMetric::Manhattan);
        let mut random = CustomNumberGenerator::new(11);

        // act
        let clusters = clusterer.generate_clusters(&vectors, &mut random).unwrap();

        // assert
        assert_eq!(clusters.len(), 3);
        assert_partition(&clusters, vectors.len());
    }

    #[test]
    fn identical_vectors_share_a_cluster_for_any_seed() {
        let vectors = vec![
            vec![1.0, 8.0, 0.5],
            vec![4.0, 2.0, 0.1],
            vec![1.0, 8.0, 0.5],
            vec![9.0, 0.0, 0.9],
            vec![5.0, 5.0, 0.3],
        ];
        let clusterer = KMeansClusterer::new(3, 10, DistanceMetric::Euclidean);

        for seed in 0..50 {
            let mut random = StandardRandomGenerator::seeded(seed);
            let clusters = clusterer.generate_clusters(&vectors, &mut random).unwrap();
            let holder = clusters.iter().find(|c| c.contains(0)).unwrap();
            assert!(holder.contains(2), "seed {seed} split identical vectors");
        }
    }

    #[test]
    fn members_carry_unnormalised_signatures() {
        let vectors = vec![vec![100.0, -3.0], vec![50.0, 7.0]];
        let clusterer = KMeansClusterer::new(1, 1, DistanceMetric::Euclidean);

        let clusters = clusterer
            .generate_clusters(&vectors, &mut CustomNumberGenerator::default())
            .unwrap();

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members[0].signature, vec![100.0, -3.0]);
        assert_eq!(clusters[0].members[1].signature, vec![50.0, 7.0]);
    }

    #[test]
    fn empty_centroids_keep_their_position() {
        let mut means = vec![vec![0.2, 0.2], vec![0.9, 0.9]];
        let vectors = vec![vec![0.0, 0.0], vec![0.4, 0.2]];

        KMeansClusterer::update_means(&mut means, &[vec![0, 1], vec![]], &vectors);

        assert_eq!(means, vec![vec![0.2, 0.1], vec![0.9, 0.9]]);
    }

    #[test]
    fn ties_go_to_the_first_centroid() {
        let clusterer = KMeansClusterer::new(2, 1, DistanceMetric::Euclidean);
        let means = vec![vec![0.0], vec![1.0]];

        let groups = clusterer.assign(&means, &[vec![0.5]]);

        assert_eq!(groups, vec![vec![0], vec![]]);
    }

    #[test]
    fn empty_input_is_an_error() {
        let clusterer = KMeansClusterer::new(2, 1, DistanceMetric::Euclidean);

        let result = clusterer.generate_clusters(&[], &mut CustomNumberGenerator::default());

        assert_eq!(result, Err(ClusteringError::EmptyInput));
    }
}
