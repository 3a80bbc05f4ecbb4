use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::EngineError;

const MAX_ITER: usize = 300;

/// Partition clustering with k-means++ seeding and Lloyd iteration. The
/// generator is reseeded per fit, so the same seed and input always produce
/// the same partition.
#[derive(Debug, Clone)]
pub struct KMeans {
    pub n_clusters: usize,
    pub max_iter: usize,
    pub seed: u64,
}

/// A fitted partition: one cluster id per input row.
#[derive(Debug, Clone)]
pub struct KMeansFit {
    pub labels: Vec<usize>,
    pub centroids: Array2<f64>,
    pub inertia: f64,
}

impl KMeans {
    pub fn new(n_clusters: usize, seed: u64) -> Self {
        Self {
            n_clusters,
            max_iter: MAX_ITER,
            seed,
        }
    }

    pub fn fit(&self, data: &Array2<f64>) -> Result<KMeansFit, EngineError> {
        let n = data.nrows();
        if self.n_clusters == 0 || n < self.n_clusters {
            return Err(EngineError::TooFewSamples {
                samples: n,
                clusters: self.n_clusters,
            });
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centroids = plus_plus_init(data, self.n_clusters, &mut rng);
        let mut labels = assign(data, &centroids);

        for _ in 0..self.max_iter {
            update_centroids(data, &labels, &mut centroids);
            let new_labels = assign(data, &centroids);
            if new_labels == labels {
                break;
            }
            labels = new_labels;
        }

        let inertia = (0..n)
            .map(|i| squared_distance(data.row(i), centroids.row(labels[i])))
            .sum();

        Ok(KMeansFit {
            labels,
            centroids,
            inertia,
        })
    }
}

/// k-means++ seeding: the first centroid is drawn uniformly, each later one
/// with probability proportional to the squared distance from the nearest
/// centroid chosen so far.
fn plus_plus_init(data: &Array2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let n = data.nrows();
    let mut centroids = Array2::zeros((k, data.ncols()));
    let first = rng.gen_range(0..n);
    centroids.row_mut(0).assign(&data.row(first));

    let mut nearest_sq = vec![f64::INFINITY; n];
    for c in 1..k {
        for (i, entry) in nearest_sq.iter_mut().enumerate() {
            let d = squared_distance(data.row(i), centroids.row(c - 1));
            if d < *entry {
                *entry = d;
            }
        }
        let total: f64 = nearest_sq.iter().sum();
        let chosen = if total.is_finite() && total > 0.0 {
            let mut target = rng.gen_range(0.0..1.0) * total;
            let mut chosen = n - 1;
            for (i, d) in nearest_sq.iter().enumerate() {
                target -= d;
                if target <= 0.0 {
                    chosen = i;
                    break;
                }
            }
            chosen
        } else {
            rng.gen_range(0..n)
        };
        centroids.row_mut(c).assign(&data.row(chosen));
    }
    centroids
}

fn assign(data: &Array2<f64>, centroids: &Array2<f64>) -> Vec<usize> {
    (0..data.nrows())
        .map(|i| nearest_centroid(data.row(i), centroids))
        .collect()
}

fn nearest_centroid(point: ArrayView1<f64>, centroids: &Array2<f64>) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for c in 0..centroids.nrows() {
        let d = squared_distance(point, centroids.row(c));
        if d < best_distance {
            best_distance = d;
            best = c;
        }
    }
    best
}

fn update_centroids(data: &Array2<f64>, labels: &[usize], centroids: &mut Array2<f64>) {
    let k = centroids.nrows();
    let cols = data.ncols();
    let mut sums = Array2::<f64>::zeros((k, cols));
    let mut counts = vec![0usize; k];
    for (i, &label) in labels.iter().enumerate() {
        counts[label] += 1;
        let row = data.row(i);
        for j in 0..cols {
            sums[[label, j]] += row[j];
        }
    }
    for c in 0..k {
        if counts[c] == 0 {
            // An emptied cluster takes the point farthest from its centroid.
            let far = farthest_point(data, labels, centroids);
            for j in 0..cols {
                centroids[[c, j]] = data[[far, j]];
            }
        } else {
            for j in 0..cols {
                centroids[[c, j]] = sums[[c, j]] / counts[c] as f64;
            }
        }
    }
}

fn farthest_point(data: &Array2<f64>, labels: &[usize], centroids: &Array2<f64>) -> usize {
    let mut far = 0;
    let mut far_distance = -1.0;
    for i in 0..data.nrows() {
        let d = squared_distance(data.row(i), centroids.row(labels[i]));
        if d > far_distance {
            far_distance = d;
            far = i;
        }
    }
    far
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

/// Mean silhouette coefficient of a partition. Samples in singleton clusters
/// score 0, matching the usual convention.
pub fn silhouette_score(data: &Array2<f64>, labels: &[usize]) -> f64 {
    let n = data.nrows();
    if n == 0 {
        return 0.0;
    }
    let k = labels.iter().copied().max().map_or(0, |m| m + 1);
    let mut sizes = vec![0usize; k];
    for &label in labels {
        sizes[label] += 1;
    }

    let mut total = 0.0;
    for i in 0..n {
        let own = labels[i];
        if sizes[own] <= 1 {
            continue;
        }
        let mut sums = vec![0.0; k];
        for j in 0..n {
            if i == j {
                continue;
            }
            sums[labels[j]] += squared_distance(data.row(i), data.row(j)).sqrt();
        }
        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = (0..k)
            .filter(|&c| c != own && sizes[c] > 0)
            .map(|c| sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);
        if b.is_finite() {
            let denom = a.max(b);
            if denom > 0.0 {
                total += (b - a) / denom;
            }
        }
    }
    total / n as f64
}

/// Column-wise z-score normalization with sample standard deviation
/// (ddof = 1). A zero-variance column divides by zero and comes out as NaN;
/// the undefined result is passed through rather than patched.
pub fn zscore_normalize(data: &Array2<f64>) -> Array2<f64> {
    let n = data.nrows();
    let mut out = data.clone();
    for j in 0..data.ncols() {
        let col = data.column(j);
        let mean = col.sum() / n as f64;
        let variance =
            col.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n as f64 - 1.0);
        let std = variance.sqrt();
        for i in 0..n {
            out[[i, j]] = (data[[i, j]] - mean) / std;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_blobs() -> Array2<f64> {
        array![
            [0.0, 0.0],
            [0.1, 0.2],
            [0.2, 0.1],
            [10.0, 10.0],
            [10.1, 10.2],
            [10.2, 9.9],
        ]
    }

    #[test]
    fn separable_blobs_are_split_cleanly() {
        let fit = KMeans::new(2, 42).fit(&two_blobs()).unwrap();
        let first = fit.labels[0];
        let second = fit.labels[3];
        assert_ne!(first, second);
        assert_eq!(&fit.labels[0..3], &[first, first, first]);
        assert_eq!(&fit.labels[3..6], &[second, second, second]);
    }

    #[test]
    fn same_seed_is_deterministic() {
        let data = two_blobs();
        let a = KMeans::new(3, 42).fit(&data).unwrap();
        let b = KMeans::new(3, 42).fit(&data).unwrap();
        assert_eq!(a.labels, b.labels);
    }

    #[test]
    fn more_clusters_than_samples_is_an_error() {
        let data = array![[1.0, 2.0], [3.0, 4.0]];
        assert!(KMeans::new(3, 42).fit(&data).is_err());
    }

    #[test]
    fn silhouette_rewards_clean_separation() {
        let data = two_blobs();
        let fit = KMeans::new(2, 42).fit(&data).unwrap();
        let score = silhouette_score(&data, &fit.labels);
        assert!(score > 0.8, "expected a high score, got {score}");
        assert!(score <= 1.0);
    }

    #[test]
    fn silhouette_of_singletons_is_zero() {
        let data = array![[0.0, 0.0], [5.0, 5.0]];
        assert_eq!(silhouette_score(&data, &[0, 1]), 0.0);
    }

    #[test]
    fn zscore_centers_and_scales_columns() {
        let data = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]];
        let normalized = zscore_normalize(&data);
        for j in 0..2 {
            let col: Vec<f64> = normalized.column(j).iter().copied().collect();
            let mean = col.iter().sum::<f64>() / col.len() as f64;
            assert!(mean.abs() < 1e-9);
            assert!((col[2] - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn zscore_zero_variance_column_is_nan() {
        let data = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0]];
        let normalized = zscore_normalize(&data);
        assert!(normalized[[0, 1]].is_nan());
        assert!(!normalized[[0, 0]].is_nan());
    }
}
