//! K-Means clustering model implementation

use linfa::traits::Fit;
use linfa::DatasetBase;
use linfa_clustering::{KMeans, KMeansInit};
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SegmentError;
use crate::features::FEATURE_COUNT;
use crate::profiles::SEGMENT_COUNT;

/// Label alignment searches every permutation, so k stays small.
pub const MAX_CLUSTERS: usize = 8;

/// K-Means fitting parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansSettings {
    pub n_clusters: usize,
    /// Independent k-means++ initializations; the lowest-inertia run wins
    pub n_runs: usize,
    pub max_iters: u64,
    pub tolerance: f64,
}

impl Default for KMeansSettings {
    fn default() -> Self {
        Self {
            n_clusters: SEGMENT_COUNT,
            n_runs: 20,
            max_iters: 300,
            tolerance: 1e-4,
        }
    }
}

/// Fitted centroids in normalized feature space.
///
/// Row `i` is the centroid of cluster `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterModel {
    centroids: Array2<f64>,
}

impl ClusterModel {
    pub fn from_centroids(centroids: Array2<f64>) -> crate::Result<Self> {
        if centroids.ncols() != FEATURE_COUNT {
            return Err(SegmentError::DimensionMismatch {
                expected: FEATURE_COUNT,
                found: centroids.ncols(),
            });
        }
        if centroids.nrows() == 0 {
            return Err(SegmentError::InvalidClusters("model has no centroids".to_string()));
        }
        if centroids.iter().any(|v| !v.is_finite()) {
            return Err(SegmentError::NonFinite("centroids"));
        }
        Ok(Self { centroids })
    }

    pub fn centroids(&self) -> &Array2<f64> {
        &self.centroids
    }

    pub fn n_clusters(&self) -> usize {
        self.centroids.nrows()
    }

    /// Euclidean distance from a normalized point to every centroid.
    pub fn distances(&self, point: ArrayView1<f64>) -> crate::Result<Vec<f64>> {
        if point.len() != self.centroids.ncols() {
            return Err(SegmentError::DimensionMismatch {
                expected: self.centroids.ncols(),
                found: point.len(),
            });
        }
        Ok(self
            .centroids
            .outer_iter()
            .map(|centroid| euclidean_distance(&point, &centroid))
            .collect())
    }

    /// Nearest centroid; ties go to the lowest cluster index.
    pub fn predict(&self, point: ArrayView1<f64>) -> crate::Result<usize> {
        let distances = self.distances(point)?;
        Ok(nearest(&distances))
    }

    /// Cluster assignment for every row.
    pub fn predict_batch(&self, data: &Array2<f64>) -> crate::Result<Array1<usize>> {
        data.outer_iter().map(|row| self.predict(row)).collect()
    }

    /// Within-cluster sum of squares.
    pub fn inertia(&self, data: &Array2<f64>, labels: &Array1<usize>) -> f64 {
        let mut inertia = 0.0;
        for (&cluster, point) in labels.iter().zip(data.outer_iter()) {
            if cluster < self.n_clusters() {
                inertia += euclidean_distance(&point, &self.centroids.row(cluster)).powi(2);
            }
        }
        inertia
    }

    /// Number of points assigned to each cluster.
    pub fn cluster_sizes(&self, labels: &Array1<usize>) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters()];
        for &label in labels.iter() {
            if label < self.n_clusters() {
                sizes[label] += 1;
            }
        }
        sizes
    }

    /// Reorder centroids so that cluster `i` is the one closest to generation
    /// block `i`.
    ///
    /// K-Means numbers its clusters arbitrarily. Matching the fitted centroids
    /// against the per-block means of the (normalized) training corpus keeps
    /// cluster index == segment profile index across retrains. The assignment
    /// minimizing the total squared distance is found by exhaustive search.
    pub fn align_to_blocks(
        self,
        data: &Array2<f64>,
        block_labels: &Array1<usize>,
    ) -> crate::Result<Self> {
        let k = self.n_clusters();
        let block_means = block_means(data, block_labels, k)?;

        let mut cost = Array2::<f64>::zeros((k, k));
        for (block, mean) in block_means.outer_iter().enumerate() {
            for (cluster, centroid) in self.centroids.outer_iter().enumerate() {
                cost[[block, cluster]] = euclidean_distance(&mean, &centroid).powi(2);
            }
        }

        let mut best: Option<(f64, Vec<usize>)> = None;
        for_each_permutation(k, &mut |perm| {
            let total: f64 = perm.iter().enumerate().map(|(block, &c)| cost[[block, c]]).sum();
            if best.as_ref().map_or(true, |(best_total, _)| total < *best_total) {
                best = Some((total, perm.to_vec()));
            }
        });
        let (total, perm) =
            best.ok_or_else(|| SegmentError::InvalidClusters("no cluster assignment found".to_string()))?;
        debug!(?perm, total, "aligned clusters to generation blocks");

        Ok(Self {
            centroids: self.centroids.select(Axis(0), &perm),
        })
    }
}

/// Fit K-Means on normalized features with a seeded RNG
///
/// # Arguments
/// * `data` - Normalized feature matrix, one row per sample
/// * `settings` - Cluster count, number of k-means++ runs, iteration cap and tolerance
/// * `seed` - Seed for the initialization RNG
///
/// # Returns
/// * `ClusterModel` from the lowest-inertia run, in k-means order (not yet aligned)
pub fn fit_kmeans(
    data: &Array2<f64>,
    settings: &KMeansSettings,
    seed: u64,
) -> crate::Result<ClusterModel> {
    let k = settings.n_clusters;
    if !(2..=MAX_CLUSTERS).contains(&k) {
        return Err(SegmentError::InvalidClusters(format!(
            "number of clusters must be between 2 and {MAX_CLUSTERS}, got {k}"
        )));
    }
    if data.nrows() < k {
        return Err(SegmentError::InvalidClusters(format!(
            "number of data points ({}) must be at least equal to number of clusters ({k})",
            data.nrows()
        )));
    }
    if settings.n_runs == 0 {
        return Err(SegmentError::InvalidClusters("at least one k-means run is required".to_string()));
    }

    let dataset = DatasetBase::from(data.clone());
    let rng = StdRng::seed_from_u64(seed);
    let model = KMeans::params_with(k, rng, L2Dist)
        .init_method(KMeansInit::KMeansPlusPlus)
        .n_runs(settings.n_runs)
        .max_n_iterations(settings.max_iters)
        .tolerance(settings.tolerance)
        .fit(&dataset)?;

    ClusterModel::from_centroids(model.centroids().to_owned())
}

/// Mean silhouette coefficient over an evenly strided sample of points.
///
/// The corpus is ordered by generation block, so the sample strides across
/// the whole matrix rather than taking a prefix.
pub fn silhouette_sample(data: &Array2<f64>, labels: &Array1<usize>, k: usize, sample_size: usize) -> f64 {
    let n = data.nrows().min(labels.len());
    let n_samples = n.min(sample_size);
    if n_samples < 2 {
        return 0.0;
    }
    let indices: Vec<usize> = (0..n_samples).map(|i| i * n / n_samples).collect();

    let mut silhouette_sum = 0.0;
    for &i in &indices {
        let point = data.row(i);
        let cluster_label = labels[i];

        let mut sums = vec![0.0; k];
        let mut counts = vec![0usize; k];
        for &j in &indices {
            if i == j || labels[j] >= k {
                continue;
            }
            sums[labels[j]] += euclidean_distance(&point, &data.row(j));
            counts[labels[j]] += 1;
        }

        let mean_to = |cluster: usize| (counts[cluster] > 0).then(|| sums[cluster] / counts[cluster] as f64);

        let a_i = if cluster_label < k { mean_to(cluster_label).unwrap_or(0.0) } else { 0.0 };
        let b_i = (0..k)
            .filter(|&c| c != cluster_label)
            .filter_map(mean_to)
            .fold(f64::INFINITY, f64::min);

        let silhouette_i = if b_i.is_infinite() || (a_i == 0.0 && b_i == 0.0) {
            0.0
        } else {
            (b_i - a_i) / a_i.max(b_i)
        };
        silhouette_sum += silhouette_i;
    }

    silhouette_sum / n_samples as f64
}

/// Index of the smallest distance, first one on ties.
fn nearest(distances: &[f64]) -> usize {
    let mut min_distance = f64::INFINITY;
    let mut closest_cluster = 0;
    for (cluster_idx, &distance) in distances.iter().enumerate() {
        if distance < min_distance {
            min_distance = distance;
            closest_cluster = cluster_idx;
        }
    }
    closest_cluster
}

fn block_means(data: &Array2<f64>, block_labels: &Array1<usize>, k: usize) -> crate::Result<Array2<f64>> {
    if block_labels.len() != data.nrows() {
        return Err(SegmentError::InvalidCorpus(format!(
            "{} block labels for {} rows",
            block_labels.len(),
            data.nrows()
        )));
    }
    let mut sums = Array2::<f64>::zeros((k, data.ncols()));
    let mut counts = vec![0usize; k];
    for (&block, row) in block_labels.iter().zip(data.outer_iter()) {
        if block >= k {
            return Err(SegmentError::InvalidCorpus(format!("block label {block} exceeds {k} clusters")));
        }
        let mut sum = sums.row_mut(block);
        sum += &row;
        counts[block] += 1;
    }
    for (block, &count) in counts.iter().enumerate() {
        if count == 0 {
            return Err(SegmentError::InvalidCorpus(format!("generation block {block} is empty")));
        }
        sums.row_mut(block).mapv_inplace(|s| s / count as f64);
    }
    Ok(sums)
}

/// Visit every permutation of `0..n` (Heap's algorithm).
fn for_each_permutation(n: usize, visit: &mut dyn FnMut(&[usize])) {
    fn heap(len: usize, items: &mut Vec<usize>, visit: &mut dyn FnMut(&[usize])) {
        if len <= 1 {
            visit(items.as_slice());
            return;
        }
        for i in 0..len - 1 {
            heap(len - 1, items, visit);
            if len % 2 == 0 {
                items.swap(i, len - 1);
            } else {
                items.swap(0, len - 1);
            }
        }
        heap(len - 1, items, visit);
    }
    let mut items: Vec<usize> = (0..n).collect();
    heap(n, &mut items, visit);
}

/// Calculate Euclidean distance between two points
fn euclidean_distance(point1: &ArrayView1<f64>, point2: &ArrayView1<f64>) -> f64 {
    point1
        .iter()
        .zip(point2.iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Five tight, well separated groups of points, 4 per group.
    fn separated_data() -> (Array2<f64>, Array1<usize>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for group in 0..5 {
            for j in 0..4 {
                let mut row = [0.0; FEATURE_COUNT];
                row[group % FEATURE_COUNT] = 10.0 * (group as f64 + 1.0);
                row[6] = 0.01 * j as f64;
                rows.extend_from_slice(&row);
                labels.push(group);
            }
        }
        (
            Array2::from_shape_vec((20, FEATURE_COUNT), rows).unwrap(),
            Array1::from(labels),
        )
    }

    #[test]
    fn test_fit_kmeans() {
        let (data, _) = separated_data();
        let model = fit_kmeans(&data, &KMeansSettings::default(), 42).unwrap();
        assert_eq!(model.n_clusters(), 5);
        assert_eq!(model.centroids().shape(), &[5, FEATURE_COUNT]);

        let labels = model.predict_batch(&data).unwrap();
        let sizes = model.cluster_sizes(&labels);
        assert_eq!(sizes.iter().sum::<usize>(), 20);
        assert!(sizes.iter().all(|&s| s == 4));
        assert!(model.inertia(&data, &labels) < 1.0);
    }

    #[test]
    fn test_fit_is_reproducible_with_seed() {
        let (data, _) = separated_data();
        let a = fit_kmeans(&data, &KMeansSettings::default(), 7).unwrap();
        let b = fit_kmeans(&data, &KMeansSettings::default(), 7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_alignment_follows_blocks() {
        let (data, blocks) = separated_data();
        let model = fit_kmeans(&data, &KMeansSettings::default(), 3)
            .unwrap()
            .align_to_blocks(&data, &blocks)
            .unwrap();
        let labels = model.predict_batch(&data).unwrap();
        assert_eq!(labels, blocks);
    }

    #[test]
    fn test_alignment_undoes_a_shuffle() {
        let centroids = array![
            [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            [5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            [0.0, 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        ];
        let data = centroids.clone();
        let shuffled = ClusterModel::from_centroids(centroids.select(Axis(0), &[2, 0, 1])).unwrap();
        let aligned = shuffled.align_to_blocks(&data, &array![0, 1, 2]).unwrap();
        assert_eq!(aligned.centroids(), &centroids);
    }

    #[test]
    fn test_predict_ties_go_to_lowest_index() {
        let model = ClusterModel::from_centroids(array![
            [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            [-1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        ])
        .unwrap();
        let origin = Array1::<f64>::zeros(FEATURE_COUNT);
        assert_eq!(model.predict(origin.view()).unwrap(), 0);
        let near_second = array![-0.9, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        assert_eq!(model.predict(near_second.view()).unwrap(), 1);
    }

    #[test]
    fn test_predict_rejects_wrong_dimension() {
        let (data, _) = separated_data();
        let model = fit_kmeans(&data, &KMeansSettings::default(), 1).unwrap();
        let short = array![1.0, 2.0, 3.0];
        assert!(model.predict(short.view()).is_err());
    }

    #[test]
    fn test_invalid_cluster_count() {
        let (data, _) = separated_data();
        let one = KMeansSettings { n_clusters: 1, ..Default::default() };
        assert!(fit_kmeans(&data, &one, 42).is_err());

        let too_many = KMeansSettings { n_clusters: MAX_CLUSTERS + 1, ..Default::default() };
        assert!(fit_kmeans(&data, &too_many, 42).is_err());

        let tiny = data.slice(ndarray::s![0..3, ..]).to_owned();
        assert!(fit_kmeans(&tiny, &KMeansSettings::default(), 42).is_err());
    }

    #[test]
    fn test_silhouette_of_separated_groups_is_high() {
        let (data, labels) = separated_data();
        let score = silhouette_sample(&data, &labels, 5, 100);
        assert!(score > 0.9, "silhouette {score}");
    }

    #[test]
    fn test_permutations_are_complete() {
        let mut seen = Vec::new();
        for_each_permutation(4, &mut |p| seen.push(p.to_vec()));
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 24);
    }
}
