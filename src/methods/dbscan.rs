use linfa::traits::Transformer;
use linfa::ParamGuard;
use linfa_clustering::Dbscan;
use ndarray::ArrayView2;

use crate::core::clusterer::Clusterer;
use crate::core::error::{RegimeError, RegimeResult};
use crate::core::segment::{Label, NOISE_LABEL};
use crate::metrics::euclidean::squared_euclidean;

/// Density-based clustering backed by `linfa-clustering`'s DBSCAN.
///
/// Samples outside every dense region get [`NOISE_LABEL`]. The model has no
/// centers and cannot label new data; it does expose its core samples, from
/// which the pipeline estimates centroids.
#[derive(Debug, Clone)]
pub struct DbscanClusterer {
    eps: f64,
    min_samples: usize,
    core_indices: Option<Vec<usize>>,
}

impl DbscanClusterer {
    pub fn new(eps: f64, min_samples: usize) -> Self {
        Self {
            eps,
            min_samples,
            core_indices: None,
        }
    }
}

impl Clusterer for DbscanClusterer {
    fn name(&self) -> &'static str {
        "dbscan"
    }

    fn fit_predict(&mut self, vectors: ArrayView2<f64>) -> RegimeResult<Vec<Label>> {
        let records = vectors.to_owned();
        let clusters = Dbscan::params(self.min_samples)
            .tolerance(self.eps)
            .check()
            .map_err(|e| RegimeError::Clustering(format!("invalid DBSCAN parameters: {e}")))?
            .transform(&records);

        self.core_indices = Some(core_samples(vectors, self.eps, self.min_samples));

        Ok(clusters
            .iter()
            .map(|c| c.map_or(NOISE_LABEL, |id| id as Label))
            .collect())
    }

    fn core_sample_indices(&self) -> Option<&[usize]> {
        self.core_indices.as_deref()
    }
}

/// Samples with at least `min_samples` points (themselves included) within
/// distance `eps`.
fn core_samples(vectors: ArrayView2<f64>, eps: f64, min_samples: usize) -> Vec<usize> {
    let eps_sq = eps * eps;
    let rows: Vec<_> = vectors.rows().into_iter().collect();
    (0..rows.len())
        .filter(|&i| {
            rows.iter()
                .filter(|other| squared_euclidean(rows[i], **other) <= eps_sq)
                .count()
                >= min_samples
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_noise_and_core_samples() {
        let vectors = array![
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [5.0, 5.0],
            [5.1, 5.0],
            [5.0, 5.1],
            [20.0, 20.0],
        ];
        let mut model = DbscanClusterer::new(0.5, 2);
        let labels = model.fit_predict(vectors.view()).unwrap();

        assert_eq!(labels[6], NOISE_LABEL);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[3], labels[5]);
        assert_ne!(labels[0], labels[3]);
        assert!(labels[..6].iter().all(|&l| l >= 0));

        assert_eq!(model.core_sample_indices(), Some(&[0, 1, 2, 3, 4, 5][..]));
        assert!(model.cluster_centers().is_none());
        assert!(model.predict(vectors.view()).is_none());
    }

    #[test]
    fn test_everything_noise() {
        let vectors = array![[0.0], [10.0], [20.0]];
        let mut model = DbscanClusterer::new(1.0, 2);
        let labels = model.fit_predict(vectors.view()).unwrap();
        assert_eq!(labels, vec![NOISE_LABEL; 3]);
        assert_eq!(model.core_sample_indices(), Some(&[][..]));
    }
}
