use ndarray::{s, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::core::centroids::CentroidSet;
use crate::core::clusterer::CentroidRefiner;
use crate::core::error::{RegimeError, RegimeResult};
use crate::core::segment::Label;

/// Pinned-refinement rounds stop early once no free centroid moves by more
/// than this.
const PIN_TOLERANCE: f64 = 1e-9;

/// Named reference centroids, in the order they were defined.
///
/// Serialized as a JSON object `{ name: [f64; D] }` with key order preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct PredefinedCentroids {
    entries: Vec<(String, Vec<f64>)>,
}

impl PredefinedCentroids {
    /// All vectors must share one non-zero dimension and names must be unique.
    pub fn new(entries: Vec<(String, Vec<f64>)>) -> RegimeResult<Self> {
        if let Some((_, first)) = entries.first() {
            let dim = first.len();
            if dim == 0 {
                return Err(RegimeError::InvalidInput(
                    "predefined centroids must have at least one feature".into(),
                ));
            }
            for (name, v) in &entries {
                if v.len() != dim {
                    return Err(RegimeError::DimensionMismatch {
                        expected: dim,
                        actual: v.len(),
                    });
                }
                if entries.iter().filter(|(n, _)| n == name).count() > 1 {
                    return Err(RegimeError::InvalidInput(format!(
                        "duplicate predefined centroid '{name}'"
                    )));
                }
            }
        }
        Ok(Self { entries })
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Feature dimension, or `None` when empty.
    pub fn dim(&self) -> Option<usize> {
        self.entries.first().map(|(_, v)| v.len())
    }

    pub fn names(&self) -> impl ExactSizeIterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    /// Centroids stacked as rows, in definition order.
    pub fn matrix(&self) -> Array2<f64> {
        let dim = self.dim().unwrap_or(0);
        let mut out = Array2::zeros((self.len(), dim));
        for (mut row, (_, v)) in out.rows_mut().into_iter().zip(&self.entries) {
            row.assign(&ndarray::aview1(v.as_slice()));
        }
        out
    }
}

impl TryFrom<Map<String, Value>> for PredefinedCentroids {
    type Error = RegimeError;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut entries = Vec::with_capacity(map.len());
        for (name, value) in map {
            let v: Vec<f64> = serde_json::from_value(value)?;
            entries.push((name, v));
        }
        Self::new(entries)
    }
}

impl From<PredefinedCentroids> for Map<String, Value> {
    fn from(predefined: PredefinedCentroids) -> Self {
        predefined
            .entries
            .into_iter()
            .map(|(name, v)| (name, Value::from(v)))
            .collect()
    }
}

/// How the seeded centroids were turned into the final model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedStrategy {
    /// Predefined centroids used as-is; labels by nearest centroid.
    Fixed,
    /// Seeded centroids handed to one full refinement run.
    Refined,
    /// Predefined rows re-pinned after every single-iteration refinement.
    Pinned,
}

/// Labels and centroids produced by a seeded fit.
#[derive(Debug, Clone)]
pub struct SeedOutcome {
    pub labels: Vec<Label>,
    pub centers: Array2<f64>,
    /// Cluster count after any override by the predefined count.
    pub n_clusters: usize,
    pub strategy: SeedStrategy,
}

impl SeedOutcome {
    pub fn centroid_set(&self) -> CentroidSet {
        CentroidSet::from_indexed(self.centers.clone())
    }
}

/// Reconciles predefined centroids with a requested cluster count and fits
/// the data starting from them.
///
/// `refiner` performs full refinement runs. `bootstrap` performs the
/// single-iteration batched passes used to fill and re-pin centroids; it is
/// the k-means refiner in practice.
pub struct CentroidSeeder<'a> {
    refiner: &'a dyn CentroidRefiner,
    bootstrap: &'a dyn CentroidRefiner,
    max_iter: usize,
}

impl<'a> CentroidSeeder<'a> {
    pub fn new(
        refiner: &'a dyn CentroidRefiner,
        bootstrap: &'a dyn CentroidRefiner,
        max_iter: usize,
    ) -> Self {
        Self {
            refiner,
            bootstrap,
            max_iter,
        }
    }

    /// Fit `vectors` starting from `predefined`.
    ///
    /// With at least as many predefined centroids as requested clusters the
    /// predefined count wins. Otherwise the predefined rows occupy the first
    /// slots of a `requested_k`-row centroid matrix whose remaining rows come
    /// from a single batched refinement pass.
    pub fn seed(
        &self,
        vectors: ArrayView2<f64>,
        requested_k: usize,
        predefined: &PredefinedCentroids,
        fix_predefined: bool,
    ) -> RegimeResult<SeedOutcome> {
        if let Some(dim) = predefined.dim() {
            if dim != vectors.ncols() {
                return Err(RegimeError::DimensionMismatch {
                    expected: vectors.ncols(),
                    actual: dim,
                });
            }
        }

        let p = predefined.len();
        if p > 0 && p >= requested_k {
            self.seed_from_predefined(vectors, requested_k, predefined, fix_predefined)
        } else {
            self.seed_partially(vectors, requested_k, predefined, fix_predefined)
        }
    }

    fn seed_from_predefined(
        &self,
        vectors: ArrayView2<f64>,
        requested_k: usize,
        predefined: &PredefinedCentroids,
        fix_predefined: bool,
    ) -> RegimeResult<SeedOutcome> {
        let k = predefined.len();
        if k != requested_k {
            info!(
                requested = requested_k,
                predefined = k,
                "More predefined centroids than requested clusters; using the predefined count"
            );
        }
        let init = predefined.matrix();

        if fix_predefined {
            let labels = CentroidSet::from_indexed(init.clone()).assign(vectors)?;
            return Ok(SeedOutcome {
                labels,
                centers: init,
                n_clusters: k,
                strategy: SeedStrategy::Fixed,
            });
        }

        let refined = self.refiner.refine(vectors, k, Some(&init), self.max_iter)?;
        Ok(SeedOutcome {
            labels: refined.labels,
            centers: refined.centroids,
            n_clusters: k,
            strategy: SeedStrategy::Refined,
        })
    }

    fn seed_partially(
        &self,
        vectors: ArrayView2<f64>,
        k: usize,
        predefined: &PredefinedCentroids,
        fix_predefined: bool,
    ) -> RegimeResult<SeedOutcome> {
        let p = predefined.len();
        let pinned = predefined.matrix();

        let mut centers = self.bootstrap.refine(vectors, k, None, 1)?.centroids;
        if centers.nrows() != k {
            return Err(RegimeError::InvariantViolation(format!(
                "{} produced {} centroids, expected {k}",
                self.bootstrap.name(),
                centers.nrows()
            )));
        }
        pin_rows(&mut centers, &pinned);

        if !fix_predefined {
            let refined = self.refiner.refine(vectors, k, Some(&centers), self.max_iter)?;
            return Ok(SeedOutcome {
                labels: refined.labels,
                centers: refined.centroids,
                n_clusters: k,
                strategy: SeedStrategy::Refined,
            });
        }

        for round in 0..self.max_iter {
            let mut next = self.bootstrap.refine(vectors, k, Some(&centers), 1)?.centroids;
            pin_rows(&mut next, &pinned);

            let shift = max_row_shift(centers.slice(s![p.., ..]), next.slice(s![p.., ..]));
            centers = next;
            if shift <= PIN_TOLERANCE {
                debug!(round, "Pinned refinement converged");
                break;
            }
        }

        let labels = CentroidSet::from_indexed(centers.clone()).assign(vectors)?;
        Ok(SeedOutcome {
            labels,
            centers,
            n_clusters: k,
            strategy: SeedStrategy::Pinned,
        })
    }
}

/// Overwrite the leading rows of `centers` with `pinned`.
fn pin_rows(centers: &mut Array2<f64>, pinned: &Array2<f64>) {
    let p = pinned.nrows().min(centers.nrows());
    centers.slice_mut(s![..p, ..]).assign(&pinned.slice(s![..p, ..]));
}

/// Largest absolute coordinate change between two centroid matrices.
fn max_row_shift(before: ArrayView2<f64>, after: ArrayView2<f64>) -> f64 {
    before
        .iter()
        .zip(after.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max)
}
