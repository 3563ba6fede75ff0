use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::core::centroids::distinct_labels;
use crate::core::error::{RegimeError, RegimeResult};
use crate::core::segment::Label;
use crate::metrics::euclidean::{euclidean, squared_euclidean};

#[cfg(feature = "parallel")]
const MIN_PARALLEL_SAMPLES: usize = 1024;

/// Internal cluster-validity scores of a labelling.
///
/// Every label value, including noise, counts as a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterValidity {
    /// Mean silhouette coefficient in `[-1, 1]`; higher is better.
    pub silhouette: f64,
    /// Between/within dispersion ratio; higher is better.
    pub calinski_harabasz: f64,
    /// Mean worst-case cluster similarity; lower is better.
    pub davies_bouldin: f64,
}

impl ClusterValidity {
    /// Score `labels` against `vectors`.
    ///
    /// Returns `None` when the scores are undefined: fewer than two distinct
    /// labels, or every sample in its own cluster.
    pub fn compute(vectors: ArrayView2<f64>, labels: &[Label]) -> RegimeResult<Option<Self>> {
        if labels.len() != vectors.nrows() {
            return Err(RegimeError::DimensionMismatch {
                expected: vectors.nrows(),
                actual: labels.len(),
            });
        }
        let clusters = Clusters::new(vectors, labels);
        let k = clusters.count();
        if k < 2 || k >= labels.len() {
            return Ok(None);
        }

        Ok(Some(Self {
            silhouette: silhouette(vectors, &clusters),
            calinski_harabasz: calinski_harabasz(vectors, &clusters),
            davies_bouldin: davies_bouldin(vectors, &clusters),
        }))
    }
}

/// Labels remapped to dense indices, with per-cluster sizes and centroids.
struct Clusters {
    index: Vec<usize>,
    sizes: Vec<usize>,
    centroids: Array2<f64>,
}

impl Clusters {
    fn new(vectors: ArrayView2<f64>, labels: &[Label]) -> Self {
        let distinct = distinct_labels(labels);
        let index: Vec<usize> = labels
            .iter()
            .map(|l| distinct.binary_search(l).unwrap_or_default())
            .collect();

        let mut sizes = vec![0usize; distinct.len()];
        let mut centroids = Array2::zeros((distinct.len(), vectors.ncols()));
        for (row, &c) in vectors.rows().into_iter().zip(&index) {
            sizes[c] += 1;
            let mut target = centroids.row_mut(c);
            target += &row;
        }
        for (mut row, &size) in centroids.rows_mut().into_iter().zip(&sizes) {
            if size > 0 {
                row /= size as f64;
            }
        }

        Self {
            index,
            sizes,
            centroids,
        }
    }

    fn count(&self) -> usize {
        self.sizes.len()
    }
}

fn silhouette(vectors: ArrayView2<f64>, clusters: &Clusters) -> f64 {
    let n = vectors.nrows();

    #[cfg(feature = "parallel")]
    if n >= MIN_PARALLEL_SAMPLES {
        let total: f64 = (0..n)
            .into_par_iter()
            .map(|i| sample_silhouette(vectors, clusters, i))
            .sum();
        return total / n as f64;
    }

    let total: f64 = (0..n)
        .map(|i| sample_silhouette(vectors, clusters, i))
        .sum();
    total / n as f64
}

/// `(b - a) / max(a, b)` for one sample; 0 for members of singleton clusters.
fn sample_silhouette(vectors: ArrayView2<f64>, clusters: &Clusters, i: usize) -> f64 {
    let own = clusters.index[i];
    if clusters.sizes[own] <= 1 {
        return 0.0;
    }

    let mut sums = vec![0.0; clusters.count()];
    let row = vectors.row(i);
    for (j, other) in vectors.rows().into_iter().enumerate() {
        if j != i {
            sums[clusters.index[j]] += euclidean(row, other);
        }
    }

    let a = sums[own] / (clusters.sizes[own] - 1) as f64;
    let b = sums
        .iter()
        .zip(&clusters.sizes)
        .enumerate()
        .filter(|&(c, (_, &size))| c != own && size > 0)
        .map(|(_, (&sum, &size))| sum / size as f64)
        .fold(f64::INFINITY, f64::min);

    let denom = a.max(b);
    if denom > 0.0 {
        (b - a) / denom
    } else {
        0.0
    }
}

fn calinski_harabasz(vectors: ArrayView2<f64>, clusters: &Clusters) -> f64 {
    let n = vectors.nrows() as f64;
    let k = clusters.count() as f64;
    let overall: Array1<f64> = vectors.sum_axis(ndarray::Axis(0)) / n;

    let between: f64 = clusters
        .centroids
        .rows()
        .into_iter()
        .zip(&clusters.sizes)
        .map(|(c, &size)| size as f64 * squared_euclidean(c, overall.view()))
        .sum();
    let within: f64 = vectors
        .rows()
        .into_iter()
        .zip(&clusters.index)
        .map(|(row, &c)| squared_euclidean(row, clusters.centroids.row(c)))
        .sum();

    if within == 0.0 {
        1.0
    } else {
        between * (n - k) / (within * (k - 1.0))
    }
}

fn davies_bouldin(vectors: ArrayView2<f64>, clusters: &Clusters) -> f64 {
    let k = clusters.count();
    let mut scatter = vec![0.0; k];
    for (row, &c) in vectors.rows().into_iter().zip(&clusters.index) {
        scatter[c] += euclidean(row, clusters.centroids.row(c));
    }
    for (s, &size) in scatter.iter_mut().zip(&clusters.sizes) {
        *s /= size as f64;
    }

    let mut total = 0.0;
    for i in 0..k {
        let mut worst: f64 = 0.0;
        for j in 0..k {
            if i == j {
                continue;
            }
            let separation = euclidean(clusters.centroids.row(i), clusters.centroids.row(j));
            if separation > 0.0 {
                worst = worst.max((scatter[i] + scatter[j]) / separation);
            }
        }
        total += worst;
    }
    total / k as f64
}
