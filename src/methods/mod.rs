pub mod affinity;
pub mod dbscan;
pub mod kmeans;
pub mod mean_shift;

use tracing::warn;

use crate::core::clusterer::{CentroidRefiner, Clusterer};
use crate::core::config::{ClusterConfig, ClusteringMethod};
use crate::core::error::RegimeResult;

pub use affinity::AffinityPropagation;
pub use dbscan::DbscanClusterer;
pub use kmeans::KMeansClusterer;
pub use mean_shift::MeanShiftClusterer;

/// Construct the estimator named by the configuration.
pub fn build_model(config: &ClusterConfig) -> RegimeResult<Box<dyn Clusterer>> {
    let model: Box<dyn Clusterer> = match config.method()? {
        ClusteringMethod::MeanShift => Box::new(MeanShiftClusterer::new(
            config.meanshift_bandwidth,
            config.max_iter,
        )),
        ClusteringMethod::MiniBatchKMeans => {
            Box::new(KMeansClusterer::new(config.n_clusters, config.max_iter))
        }
        ClusteringMethod::AffinityPropagation => Box::new(AffinityPropagation::new(
            config.affinity_damping,
            config.affinity_max_iter,
        )),
        ClusteringMethod::Dbscan => Box::new(DbscanClusterer::new(
            config.dbscan_eps,
            config.dbscan_min_samples,
        )),
    };
    Ok(model)
}

/// The refiner used to fit from seeded centroids under the configured
/// method.
///
/// Methods that cannot start from given centroids are replaced by k-means;
/// the substitution is logged and never fails.
pub fn resolve_refiner(config: &ClusterConfig) -> RegimeResult<Box<dyn CentroidRefiner>> {
    let method = config.method()?;
    let refiner: Box<dyn CentroidRefiner> = match method {
        ClusteringMethod::MeanShift => Box::new(MeanShiftClusterer::new(
            config.meanshift_bandwidth,
            config.max_iter,
        )),
        ClusteringMethod::MiniBatchKMeans => {
            Box::new(KMeansClusterer::new(config.n_clusters, config.max_iter))
        }
        ClusteringMethod::AffinityPropagation | ClusteringMethod::Dbscan => {
            warn!(
                method = %method,
                "Predefined centroids are not supported for this method; using k-means instead"
            );
            Box::new(KMeansClusterer::new(config.n_clusters, config.max_iter))
        }
    };
    Ok(refiner)
}
