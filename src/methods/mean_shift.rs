use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::core::clusterer::{CentroidRefiner, Clusterer, Refinement};
use crate::core::error::{RegimeError, RegimeResult};
use crate::core::segment::Label;
use crate::metrics::euclidean::{euclidean, nearest_centers, squared_euclidean};

/// Fraction of the sample count used as the neighbour rank when estimating
/// the bandwidth.
const BANDWIDTH_QUANTILE: f64 = 0.3;

/// A seed stops climbing once its mean moves less than this fraction of the
/// bandwidth.
const STOP_FRACTION: f64 = 1e-3;

/// Mean-shift clustering with a flat kernel.
///
/// Every seed (all samples unless explicit seeds are given) climbs to the
/// mean of the samples within `bandwidth` until it stops moving. Converged
/// seeds are ranked by how many samples their window holds and
/// near-duplicates within one bandwidth of a stronger mode are dropped. The
/// surviving modes are the cluster centers; every sample is labelled by its
/// nearest mode, so there is no noise.
#[derive(Debug, Clone)]
pub struct MeanShiftClusterer {
    bandwidth: Option<f64>,
    max_iter: usize,
    centers: Option<Array2<f64>>,
}

impl MeanShiftClusterer {
    /// `bandwidth == None` estimates it from the data on each fit.
    pub fn new(bandwidth: Option<f64>, max_iter: usize) -> Self {
        Self {
            bandwidth,
            max_iter,
            centers: None,
        }
    }

    fn shift(
        &self,
        vectors: ArrayView2<f64>,
        seeds: ArrayView2<f64>,
        max_iter: usize,
    ) -> RegimeResult<Refinement> {
        if vectors.nrows() == 0 {
            return Err(RegimeError::InvalidInput(
                "mean shift needs at least one sample".into(),
            ));
        }
        if seeds.ncols() != vectors.ncols() {
            return Err(RegimeError::DimensionMismatch {
                expected: vectors.ncols(),
                actual: seeds.ncols(),
            });
        }

        let bandwidth = match self.bandwidth {
            Some(bw) => bw,
            None => estimate_bandwidth(vectors, BANDWIDTH_QUANTILE),
        };
        debug!(bandwidth, seeds = seeds.nrows(), "Running mean shift");

        #[cfg(feature = "parallel")]
        let modes: Vec<(Array1<f64>, usize)> = seeds
            .axis_iter(Axis(0))
            .into_par_iter()
            .filter_map(|seed| climb(vectors, seed, bandwidth, max_iter))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let modes: Vec<(Array1<f64>, usize)> = seeds
            .axis_iter(Axis(0))
            .filter_map(|seed| climb(vectors, seed, bandwidth, max_iter))
            .collect();

        let centers = merge_modes(modes, bandwidth, vectors.ncols());
        if centers.nrows() == 0 {
            return Err(RegimeError::Clustering(format!(
                "mean shift found no modes with bandwidth {bandwidth}"
            )));
        }

        let labels = nearest_centers(vectors, centers.view())
            .into_iter()
            .map(|c| c as Label)
            .collect();
        Ok(Refinement {
            labels,
            centroids: centers,
        })
    }
}

impl Clusterer for MeanShiftClusterer {
    fn name(&self) -> &'static str {
        "meanshift"
    }

    fn fit_predict(&mut self, vectors: ArrayView2<f64>) -> RegimeResult<Vec<Label>> {
        let fitted = self.shift(vectors, vectors, self.max_iter)?;
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

impl CentroidRefiner for MeanShiftClusterer {
    fn name(&self) -> &'static str {
        "meanshift"
    }

    /// Seeds are the initial centroids; `k` is advisory since mean shift
    /// chooses its own mode count.
    fn refine(
        &self,
        vectors: ArrayView2<f64>,
        _k: usize,
        init: Option<&Array2<f64>>,
        max_iter: usize,
    ) -> RegimeResult<Refinement> {
        match init {
            Some(seeds) => self.shift(vectors, seeds.view(), max_iter),
            None => self.shift(vectors, vectors, max_iter),
        }
    }
}

/// Mean distance from each sample to its `quantile * N`-th nearest
/// neighbour, the sample itself counting as the first.
pub fn estimate_bandwidth(vectors: ArrayView2<f64>, quantile: f64) -> f64 {
    let n = vectors.nrows();
    if n == 0 {
        return 1.0;
    }
    let rank = ((n as f64 * quantile) as usize).clamp(1, n);

    let mut total = 0.0;
    let mut dists = Vec::with_capacity(n);
    for row in vectors.rows() {
        dists.clear();
        dists.extend(vectors.rows().into_iter().map(|other| euclidean(row, other)));
        dists.sort_by(|a, b| a.total_cmp(b));
        total += dists[rank - 1];
    }

    let bandwidth = total / n as f64;
    // Identical samples: any positive window holds them all
    if bandwidth > 0.0 {
        bandwidth
    } else {
        1.0
    }
}

/// Shift one seed to its mode. Returns the mode and the number of samples
/// in its final window, or `None` if the seed's window is empty.
fn climb(
    vectors: ArrayView2<f64>,
    seed: ArrayView1<f64>,
    bandwidth: f64,
    max_iter: usize,
) -> Option<(Array1<f64>, usize)> {
    let radius_sq = bandwidth * bandwidth;
    let stop = STOP_FRACTION * bandwidth;
    let mut mean = seed.to_owned();
    let mut support = 0;

    for _ in 0..max_iter.max(1) {
        let mut sum = Array1::<f64>::zeros(vectors.ncols());
        let mut count = 0usize;
        for row in vectors.rows() {
            if squared_euclidean(row, mean.view()) <= radius_sq {
                sum += &row;
                count += 1;
            }
        }
        if count == 0 {
            break;
        }
        let next = sum / count as f64;
        let moved = euclidean(next.view(), mean.view());
        mean = next;
        support = count;
        if moved < stop {
            break;
        }
    }

    (support > 0).then_some((mean, support))
}

/// Keep the strongest modes, dropping any within one bandwidth of a mode
/// already kept. Ties in support keep seed order.
fn merge_modes(mut modes: Vec<(Array1<f64>, usize)>, bandwidth: f64, dim: usize) -> Array2<f64> {
    modes.sort_by(|a, b| b.1.cmp(&a.1));

    let mut kept: Vec<Array1<f64>> = Vec::new();
    for (mode, _) in modes {
        if kept.iter().all(|k| euclidean(k.view(), mode.view()) >= bandwidth) {
            kept.push(mode);
        }
    }

    let mut centers = Array2::zeros((kept.len(), dim));
    for (mut row, mode) in centers.rows_mut().into_iter().zip(&kept) {
        row.assign(mode);
    }
    centers
}
