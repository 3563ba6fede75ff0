pub mod algorithms;
pub mod core;
pub mod io;
pub mod methods;
pub mod metrics;
pub mod pipeline;

pub use crate::algorithms::event_log::{build_event_log, Event, EventLog, EventRecord, EventStatus};
pub use crate::algorithms::naming::cluster_names;
pub use crate::algorithms::seeding::{CentroidSeeder, PredefinedCentroids, SeedOutcome, SeedStrategy};
pub use crate::algorithms::smoothing::{SegmentSmoother, SmoothingOutcome};
pub use crate::core::centroids::{distinct_labels, estimate_centers, CentroidSet, DistanceTable};
pub use crate::core::clusterer::{CentroidRefiner, Clusterer, Refinement};
pub use crate::core::config::{ClusterConfig, ClusteringMethod, FeaturizeConfig, PipelineConfig};
pub use crate::core::error::{RegimeError, RegimeResult};
pub use crate::core::segment::{
    expand_segments, extract_segments, shortest_segment, Label, Segment, NOISE_LABEL,
};
pub use crate::io::dataset::Dataset;
pub use crate::metrics::validity::ClusterValidity;
pub use crate::pipeline::{Pipeline, PipelineOutput, Prediction};

/// Smooth a label sequence against centroids and derive its event log in
/// one call.
///
/// Centroids are estimated per label from `vectors`; `min_segment_length`
/// of 0 skips smoothing.
///
/// # Examples
///
/// ```
/// use ndarray::array;
/// use regime_rs::{postprocess, EventStatus};
///
/// let vectors = array![[0.0], [0.1], [5.0], [0.2], [0.1], [5.1], [5.0], [4.9]];
/// let labels = vec![0, 0, 1, 0, 0, 1, 1, 1];
/// let timestamps: Vec<f64> = (0..8).map(f64::from).collect();
///
/// let (cleaned, log) = postprocess(vectors.view(), &labels, &timestamps, 2, "run").unwrap();
/// assert_eq!(cleaned, vec![0, 0, 0, 0, 0, 1, 1, 1]);
/// assert_eq!(log.events.len(), 4);
/// assert_eq!(log.events[0].status, EventStatus::Started);
/// ```
pub fn postprocess(
    vectors: ndarray::ArrayView2<f64>,
    labels: &[Label],
    timestamps: &[f64],
    min_segment_length: usize,
    case: &str,
) -> RegimeResult<(Vec<Label>, EventLog<f64>)> {
    let distinct = distinct_labels(labels);
    let centroids = estimate_centers(vectors, labels, &distinct, None)?;
    let table = centroids.distance_table(vectors)?;
    let cleaned = SegmentSmoother::new(min_segment_length).smooth(labels, &table)?;
    let log = EventLog::new(case, &extract_segments(&cleaned), timestamps)?;
    Ok((cleaned, log))
}
