use std::collections::BTreeSet;

use ndarray::{Array1, Array2, ArrayView2};

use crate::core::error::{RegimeError, RegimeResult};
use crate::core::segment::Label;
use crate::metrics::euclidean::{nearest_centers, pairwise_distances};

/// One centroid row per label, rows ordered by ascending label value.
#[derive(Debug, Clone, PartialEq)]
pub struct CentroidSet {
    labels: Vec<Label>,
    centers: Array2<f64>,
}

impl CentroidSet {
    /// Pair `centers` rows with `labels`.
    ///
    /// Fails with `InvariantViolation` when the row count differs from the
    /// label count or the labels are not strictly ascending.
    pub fn new(labels: Vec<Label>, centers: Array2<f64>) -> RegimeResult<Self> {
        if labels.len() != centers.nrows() {
            return Err(RegimeError::InvariantViolation(format!(
                "{} centroids for {} distinct labels",
                centers.nrows(),
                labels.len()
            )));
        }
        if labels.windows(2).any(|w| w[0] >= w[1]) {
            return Err(RegimeError::InvariantViolation(
                "centroid labels must be strictly ascending".into(),
            ));
        }
        Ok(Self { labels, centers })
    }

    /// Wrap centers produced by a model that labels its clusters `0..K`.
    pub fn from_indexed(centers: Array2<f64>) -> Self {
        let labels = (0..centers.nrows() as Label).collect();
        Self { labels, centers }
    }

    /// Adopt a model's native centers, checking them against the labels
    /// actually in use.
    pub fn from_native(centers: Array2<f64>, distinct: &[Label]) -> RegimeResult<Self> {
        if centers.nrows() != distinct.len() {
            return Err(RegimeError::InvariantViolation(format!(
                "model exposes {} cluster centers but {} distinct labels are in use",
                centers.nrows(),
                distinct.len()
            )));
        }
        Ok(Self::from_indexed(centers))
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn centers(&self) -> &Array2<f64> {
        &self.centers
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Feature dimension `D`.
    pub fn dim(&self) -> usize {
        self.centers.ncols()
    }

    /// Row index holding the centroid for `label`.
    pub fn row_of(&self, label: Label) -> Option<usize> {
        self.labels.binary_search(&label).ok()
    }

    /// Euclidean distance from every sample to every centroid.
    pub fn distance_table(&self, vectors: ArrayView2<f64>) -> RegimeResult<DistanceTable> {
        self.check_dim(vectors)?;
        Ok(DistanceTable {
            columns: self.labels.clone(),
            distances: pairwise_distances(vectors, self.centers.view()),
        })
    }

    /// Label of the nearest centroid for every sample.
    pub fn assign(&self, vectors: ArrayView2<f64>) -> RegimeResult<Vec<Label>> {
        self.check_dim(vectors)?;
        if self.is_empty() {
            return Err(RegimeError::InvalidInput(
                "cannot assign samples to an empty centroid set".into(),
            ));
        }
        Ok(nearest_centers(vectors, self.centers.view())
            .into_iter()
            .map(|row| self.labels[row])
            .collect())
    }

    /// Centroid rows as plain vectors, for serialization.
    pub fn rows(&self) -> Vec<Vec<f64>> {
        self.centers.rows().into_iter().map(|r| r.to_vec()).collect()
    }

    fn check_dim(&self, vectors: ArrayView2<f64>) -> RegimeResult<()> {
        if vectors.ncols() != self.dim() {
            return Err(RegimeError::DimensionMismatch {
                expected: self.dim(),
                actual: vectors.ncols(),
            });
        }
        Ok(())
    }
}

/// `N x K` distances from samples to centroids, with the label each column
/// belongs to.
#[derive(Debug, Clone)]
pub struct DistanceTable {
    pub columns: Vec<Label>,
    pub distances: Array2<f64>,
}

impl DistanceTable {
    /// Column holding distances to the centroid of `label`.
    pub fn column_of(&self, label: Label) -> Option<usize> {
        self.columns.iter().position(|&c| c == label)
    }
}

/// Distinct labels in ascending order.
pub fn distinct_labels(labels: &[Label]) -> Vec<Label> {
    labels
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Compute one centroid per label for models that do not expose their own.
///
/// For each label in `distinct`, the centroid is the coordinate-wise mean of
/// the samples carrying that label, restricted to `core_indices` when the
/// model supplies representative samples. A label with no candidate samples
/// gets the all-zero vector, so downstream distances stay finite.
pub fn estimate_centers(
    vectors: ArrayView2<f64>,
    labels: &[Label],
    distinct: &[Label],
    core_indices: Option<&[usize]>,
) -> RegimeResult<CentroidSet> {
    let n = vectors.nrows();
    if labels.len() != n {
        return Err(RegimeError::DimensionMismatch {
            expected: n,
            actual: labels.len(),
        });
    }

    let all: Vec<usize>;
    let candidates = match core_indices {
        Some(core) => {
            if let Some(&bad) = core.iter().find(|&&i| i >= n) {
                return Err(RegimeError::InvalidInput(format!(
                    "core sample index {bad} out of range for {n} samples"
                )));
            }
            core
        }
        None => {
            all = (0..n).collect();
            &all
        }
    };

    let dim = vectors.ncols();
    let mut centers = Array2::zeros((distinct.len(), dim));

    for (row, &label) in distinct.iter().enumerate() {
        let mut sum = Array1::<f64>::zeros(dim);
        let mut count = 0usize;
        for &i in candidates {
            if labels[i] == label {
                sum += &vectors.row(i);
                count += 1;
            }
        }
        if count > 0 {
            centers.row_mut(row).assign(&(sum / count as f64));
        }
    }

    CentroidSet::new(distinct.to_vec(), centers)
}
