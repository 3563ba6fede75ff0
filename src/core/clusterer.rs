use ndarray::{Array2, ArrayView2};

use crate::core::error::RegimeResult;
use crate::core::segment::Label;

/// A clustering estimator, seen only through the capabilities the labelling
/// pipeline needs.
///
/// `fit_predict` is the one required capability. The rest default to "not
/// supported" so that callers branch on `Option` rather than probing for
/// failure: a model without `cluster_centers` has its centroids estimated
/// from the data, optionally restricted to `core_sample_indices`.
pub trait Clusterer {
    /// Short method name for logs.
    fn name(&self) -> &'static str;

    /// Fit to `vectors` (one row per time step) and label every row.
    fn fit_predict(&mut self, vectors: ArrayView2<f64>) -> RegimeResult<Vec<Label>>;

    /// Label new rows with the fitted model, if the method can.
    fn predict(&self, _vectors: ArrayView2<f64>) -> Option<RegimeResult<Vec<Label>>> {
        None
    }

    /// Centers of the fitted clusters, row `k` belonging to label `k`.
    fn cluster_centers(&self) -> Option<&Array2<f64>> {
        None
    }

    /// Indices of the representative samples of a density/affinity model.
    fn core_sample_indices(&self) -> Option<&[usize]> {
        None
    }
}

/// Result of one centroid-refinement run.
#[derive(Debug, Clone)]
pub struct Refinement {
    pub labels: Vec<Label>,
    pub centroids: Array2<f64>,
}

/// A method that can move an initial set of centroids towards the data.
///
/// Implemented by the centroid-based methods (k-means, mean shift). The
/// seeding logic drives it with explicit initial centroids and iteration
/// budgets.
pub trait CentroidRefiner {
    fn name(&self) -> &'static str;

    /// Run up to `max_iter` refinement iterations towards `k` centroids.
    ///
    /// With `init == None` the refiner picks its own starting configuration.
    /// Methods that discover their own cluster count may return a different
    /// number of rows than `k`.
    fn refine(
        &self,
        vectors: ArrayView2<f64>,
        k: usize,
        init: Option<&Array2<f64>>,
        max_iter: usize,
    ) -> RegimeResult<Refinement>;
}
