use ndarray::{Array2, ArrayView2, Axis};
use tracing::{debug, warn};

use crate::core::clusterer::Clusterer;
use crate::core::error::{RegimeError, RegimeResult};
use crate::core::segment::{Label, NOISE_LABEL};
use crate::metrics::euclidean::{nearest_centers, squared_euclidean};

/// Iterations the exemplar set must stay unchanged to count as converged.
const CONVERGENCE_ITER: usize = 15;

/// Affinity propagation on negative squared Euclidean similarities.
///
/// The preference (self-similarity) is the median similarity, which lets the
/// method pick its own cluster count. When the exemplar set does not settle
/// within `max_iter` iterations every sample is labelled [`NOISE_LABEL`] and
/// no centers are exposed.
#[derive(Debug, Clone)]
pub struct AffinityPropagation {
    damping: f64,
    max_iter: usize,
    exemplars: Vec<usize>,
    centers: Option<Array2<f64>>,
}

impl AffinityPropagation {
    pub fn new(damping: f64, max_iter: usize) -> Self {
        Self {
            damping,
            max_iter,
            exemplars: Vec::new(),
            centers: None,
        }
    }

    /// Sample indices chosen as exemplars by the last fit.
    pub fn exemplars(&self) -> &[usize] {
        &self.exemplars
    }
}

impl Clusterer for AffinityPropagation {
    fn name(&self) -> &'static str {
        "affinitypropagation"
    }

    fn fit_predict(&mut self, vectors: ArrayView2<f64>) -> RegimeResult<Vec<Label>> {
        let n = vectors.nrows();
        if n == 0 {
            return Err(RegimeError::InvalidInput(
                "affinity propagation needs at least one sample".into(),
            ));
        }

        let similarity = similarity_matrix(vectors);
        let exemplars = match propagate(&similarity, self.damping, self.max_iter) {
            Some(exemplars) => exemplars,
            None => {
                warn!(
                    max_iter = self.max_iter,
                    "Affinity propagation did not converge; all samples labelled as noise"
                );
                self.exemplars.clear();
                self.centers = None;
                return Ok(vec![NOISE_LABEL; n]);
            }
        };

        let exemplars = refine_exemplars(&similarity, exemplars);
        let labels = assign_to_exemplars(&similarity, &exemplars);
        debug!(clusters = exemplars.len(), "Affinity propagation converged");

        self.centers = Some(vectors.select(Axis(0), &exemplars));
        self.exemplars = exemplars;
        Ok(labels.into_iter().map(|c| c as Label).collect())
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

/// `S[i][k] = -||x_i - x_k||^2`, with the median of all entries on the
/// diagonal as the preference.
fn similarity_matrix(vectors: ArrayView2<f64>) -> Array2<f64> {
    let n = vectors.nrows();
    let mut s = Array2::zeros((n, n));
    for i in 0..n {
        for k in (i + 1)..n {
            let d = -squared_euclidean(vectors.row(i), vectors.row(k));
            s[[i, k]] = d;
            s[[k, i]] = d;
        }
    }

    let mut all: Vec<f64> = s.iter().copied().collect();
    all.sort_by(|a, b| a.total_cmp(b));
    let mid = all.len() / 2;
    let preference = if all.len() % 2 == 0 {
        (all[mid - 1] + all[mid]) / 2.0
    } else {
        all[mid]
    };
    s.diag_mut().fill(preference);
    s
}

/// Run the responsibility/availability message passing. Returns the
/// exemplar indices on convergence, `None` otherwise.
fn propagate(s: &Array2<f64>, damping: f64, max_iter: usize) -> Option<Vec<usize>> {
    let n = s.nrows();
    let mut r = Array2::<f64>::zeros((n, n));
    let mut a = Array2::<f64>::zeros((n, n));
    let mut history = vec![[false; CONVERGENCE_ITER]; n];
    let mut is_exemplar = vec![false; n];

    for it in 0..max_iter {
        // Responsibilities
        let mut tmp = &a + s;
        for i in 0..n {
            let mut best = 0;
            let mut first = f64::NEG_INFINITY;
            let mut second = f64::NEG_INFINITY;
            for k in 0..n {
                let v = tmp[[i, k]];
                if v > first {
                    second = first;
                    first = v;
                    best = k;
                } else if v > second {
                    second = v;
                }
            }
            for k in 0..n {
                tmp[[i, k]] = s[[i, k]] - first;
            }
            tmp[[i, best]] = s[[i, best]] - second;
        }
        r = &r * damping + &tmp * (1.0 - damping);

        // Availabilities
        let mut tmp = r.mapv(|v| v.max(0.0));
        for k in 0..n {
            tmp[[k, k]] = r[[k, k]];
        }
        let column_sums = tmp.sum_axis(Axis(0));
        for i in 0..n {
            for k in 0..n {
                tmp[[i, k]] = column_sums[k] - tmp[[i, k]];
            }
        }
        for k in 0..n {
            let self_availability = tmp[[k, k]];
            for i in 0..n {
                tmp[[i, k]] = tmp[[i, k]].min(0.0);
            }
            tmp[[k, k]] = self_availability;
        }
        a = &a * damping + &tmp * (1.0 - damping);

        // Convergence: the exemplar set has been stable for a full window
        let slot = it % CONVERGENCE_ITER;
        for k in 0..n {
            is_exemplar[k] = a[[k, k]] + r[[k, k]] > 0.0;
            history[k][slot] = is_exemplar[k];
        }
        if it + 1 >= CONVERGENCE_ITER {
            let stable = history
                .iter()
                .all(|h| h.iter().all(|&e| e) || h.iter().all(|&e| !e));
            let count = is_exemplar.iter().filter(|&&e| e).count();
            if stable && count > 0 {
                debug!(iterations = it + 1, exemplars = count, "Exemplar set stable");
                return Some((0..n).filter(|&k| is_exemplar[k]).collect());
            }
        }
    }
    None
}

/// Move each exemplar to the member that maximizes total similarity to the
/// rest of its cluster.
fn refine_exemplars(s: &Array2<f64>, exemplars: Vec<usize>) -> Vec<usize> {
    let labels = assign_to_exemplars(s, &exemplars);
    (0..exemplars.len())
        .map(|c| {
            let members: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == c).collect();
            let mut best = exemplars[c];
            let mut best_score = f64::NEG_INFINITY;
            for &j in &members {
                let score: f64 = members.iter().map(|&i| s[[i, j]]).sum();
                if score > best_score {
                    best_score = score;
                    best = j;
                }
            }
            best
        })
        .collect()
}

/// Cluster index of each sample: its most similar exemplar, with exemplars
/// labelling themselves.
fn assign_to_exemplars(s: &Array2<f64>, exemplars: &[usize]) -> Vec<usize> {
    let mut labels: Vec<usize> = (0..s.nrows())
        .map(|i| {
            let mut best = 0;
            let mut best_val = f64::NEG_INFINITY;
            for (c, &k) in exemplars.iter().enumerate() {
                if s[[i, k]] > best_val {
                    best_val = s[[i, k]];
                    best = c;
                }
            }
            best
        })
        .collect();
    for (c, &k) in exemplars.iter().enumerate() {
        labels[k] = c;
    }
    labels
}
