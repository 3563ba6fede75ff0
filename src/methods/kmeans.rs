use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_clustering::{KMeans, KMeansInit};
use ndarray::{Array2, ArrayView2};

use crate::core::clusterer::{CentroidRefiner, Clusterer, Refinement};
use crate::core::error::{RegimeError, RegimeResult};
use crate::core::segment::Label;
use crate::metrics::euclidean::nearest_centers;

const TOLERANCE: f64 = 1e-4;

/// Batched-centroid clustering backed by `linfa-clustering`'s k-means.
///
/// Serves both as the `minibatchkmeans` method and as the refiner the
/// seeding logic drives with explicit initial centroids. linfa seeds its
/// generator with a fixed value, so repeated fits on the same data agree.
#[derive(Debug, Clone)]
pub struct KMeansClusterer {
    n_clusters: usize,
    max_iter: usize,
    centers: Option<Array2<f64>>,
}

impl KMeansClusterer {
    pub fn new(n_clusters: usize, max_iter: usize) -> Self {
        Self {
            n_clusters,
            max_iter,
            centers: None,
        }
    }
}

impl Clusterer for KMeansClusterer {
    fn name(&self) -> &'static str {
        "kmeans"
    }

    fn fit_predict(&mut self, vectors: ArrayView2<f64>) -> RegimeResult<Vec<Label>> {
        let fitted = fit(vectors, self.n_clusters, None, self.max_iter)?;
        self.centers = Some(fitted.centroids);
        Ok(fitted.labels)
    }

    fn predict(&self, vectors: ArrayView2<f64>) -> Option<RegimeResult<Vec<Label>>> {
        let centers = self.centers.as_ref()?;
        Some(Ok(nearest_centers(vectors, centers.view())
            .into_iter()
            .map(|c| c as Label)
            .collect()))
    }

    fn cluster_centers(&self) -> Option<&Array2<f64>> {
        self.centers.as_ref()
    }
}

impl CentroidRefiner for KMeansClusterer {
    fn name(&self) -> &'static str {
        "kmeans"
    }

    fn refine(
        &self,
        vectors: ArrayView2<f64>,
        k: usize,
        init: Option<&Array2<f64>>,
        max_iter: usize,
    ) -> RegimeResult<Refinement> {
        fit(vectors, k, init, max_iter)
    }
}

fn fit(
    vectors: ArrayView2<f64>,
    k: usize,
    init: Option<&Array2<f64>>,
    max_iter: usize,
) -> RegimeResult<Refinement> {
    if k == 0 || k > vectors.nrows() {
        return Err(RegimeError::InvalidInput(format!(
            "cannot form {k} clusters from {} samples",
            vectors.nrows()
        )));
    }
    if let Some(init) = init {
        if init.dim() != (k, vectors.ncols()) {
            return Err(RegimeError::DimensionMismatch {
                expected: k * vectors.ncols(),
                actual: init.len(),
            });
        }
    }

    let records = vectors.to_owned();
    let dataset = DatasetBase::from(records.clone());

    let mut params = KMeans::params(k)
        .max_n_iterations(max_iter.max(1) as u64)
        .tolerance(TOLERANCE);
    if let Some(init) = init {
        params = params
            .n_runs(1)
            .init_method(KMeansInit::Precomputed(init.clone()));
    }

    let model = params
        .fit(&dataset)
        .map_err(|e| RegimeError::Clustering(format!("k-means failed: {e}")))?;

    let labels = model
        .predict(&records)
        .iter()
        .map(|&c| c as Label)
        .collect();

    Ok(Refinement {
        labels,
        centroids: model.centroids().clone(),
    })
}
