use ndarray::{Array2, ArrayView2};
use serde::Serialize;
use tracing::{info, warn};

use crate::algorithms::event_log::EventLog;
use crate::algorithms::naming::{cluster_names, splice_predefined_names};
use crate::algorithms::seeding::{CentroidSeeder, PredefinedCentroids};
use crate::algorithms::smoothing::{SegmentSmoother, SmoothingOutcome};
use crate::core::centroids::{distinct_labels, estimate_centers, CentroidSet};
use crate::core::clusterer::Clusterer;
use crate::core::config::PipelineConfig;
use crate::core::error::{RegimeError, RegimeResult};
use crate::core::segment::{extract_segments, Label, Segment, NOISE_LABEL};
use crate::io::annotations::load_predefined;
use crate::io::dataset::Dataset;
use crate::io::output::{
    CentroidsFile, OutputWriter, CENTERS_FILE, CLUSTER_NAMES_FILE, EVENT_LOG_FILE, LABELS_FILE,
    METRICS_FILE, PREDEFINED_FILE,
};
use crate::methods::{build_model, resolve_refiner, KMeansClusterer};
use crate::metrics::validity::ClusterValidity;

/// Labels and model state straight out of fitting, before post-processing.
struct Fitted {
    labels: Vec<Label>,
    centers: Option<Array2<f64>>,
    core_indices: Option<Vec<usize>>,
}

impl Fitted {
    fn from_model(model: &dyn Clusterer, labels: Vec<Label>) -> Self {
        Self {
            labels,
            centers: model.cluster_centers().cloned(),
            core_indices: model.core_sample_indices().map(<[usize]>::to_vec),
        }
    }

    fn usable_clusters(&self) -> usize {
        distinct_labels(&self.labels)
            .into_iter()
            .filter(|&l| l != NOISE_LABEL)
            .count()
    }
}

/// Everything a clustering run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub labels: Vec<Label>,
    pub segments: Vec<Segment>,
    pub centroids: CentroidSet,
    pub events: EventLog<f64>,
    /// Number of distinct labels after fitting, noise included.
    pub realized_clusters: usize,
    /// Input configuration with `n_clusters` set to the realized count.
    pub config: PipelineConfig,
    pub validity: Option<ClusterValidity>,
    pub cluster_names: Vec<String>,
    pub predefined: Option<PredefinedCentroids>,
    pub smoothing: Option<SmoothingOutcome>,
    /// True when the configured method produced no usable clusters and the
    /// k-means fallback was used instead.
    pub used_fallback: bool,
}

#[derive(Serialize)]
struct MetricsReport {
    n_clusters: usize,
    #[serde(flatten)]
    validity: Option<ClusterValidity>,
}

impl PipelineOutput {
    /// Write every artifact into `writer`'s directory.
    pub fn write(&self, writer: &OutputWriter) -> RegimeResult<()> {
        writer.write_json(LABELS_FILE, &self.labels)?;
        writer.write_json(CENTERS_FILE, &CentroidsFile::from(&self.centroids))?;
        writer.write_json(EVENT_LOG_FILE, &self.events.records())?;
        writer.write_json(
            METRICS_FILE,
            &MetricsReport {
                n_clusters: self.realized_clusters,
                validity: self.validity,
            },
        )?;
        writer.write_json(CLUSTER_NAMES_FILE, &self.cluster_names)?;
        if let Some(predefined) = &self.predefined {
            writer.write_json(PREDEFINED_FILE, predefined)?;
        }
        Ok(())
    }
}

/// Labels for a new dataset produced from saved centroids.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub labels: Vec<Label>,
    pub segments: Vec<Segment>,
    pub events: EventLog<f64>,
    pub smoothing: Option<SmoothingOutcome>,
}

impl Prediction {
    pub fn write(&self, writer: &OutputWriter) -> RegimeResult<()> {
        writer.write_json(LABELS_FILE, &self.labels)?;
        writer.write_json(EVENT_LOG_FILE, &self.events.records())?;
        Ok(())
    }
}

/// Batch labelling pipeline driven by a [`PipelineConfig`].
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> RegimeResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Cluster `dataset`, reading predefined centroids from the configured
    /// annotations directory when they are enabled.
    pub fn run(&self, dataset: &Dataset) -> RegimeResult<PipelineOutput> {
        let predefined = if self.config.cluster.use_predefined_centroids {
            Some(load_predefined(&self.config.cluster.annotations_dir, dataset)?)
        } else {
            None
        };
        self.run_with_predefined(dataset, predefined)
    }

    /// Cluster `dataset`, seeding from `predefined` when given.
    pub fn run_with_predefined(
        &self,
        dataset: &Dataset,
        predefined: Option<PredefinedCentroids>,
    ) -> RegimeResult<PipelineOutput> {
        if dataset.is_empty() {
            return Err(RegimeError::InvalidInput("dataset has no samples".into()));
        }
        let cluster = &self.config.cluster;
        let vectors = dataset.vectors();

        let mut fitted = match &predefined {
            Some(predefined) => self.fit_seeded(vectors, predefined)?,
            None => {
                let mut model = build_model(cluster)?;
                let labels = model.fit_predict(vectors)?;
                Fitted::from_model(model.as_ref(), labels)
            }
        };

        let mut used_fallback = false;
        if fitted.usable_clusters() == 0 {
            warn!(
                method = %cluster.learning_method,
                "No usable clusters found; refitting with k-means"
            );
            let mut fallback = KMeansClusterer::new(cluster.n_clusters, cluster.max_iter);
            let labels = fallback.fit_predict(vectors).map_err(|e| {
                RegimeError::ConvergenceFailure(format!(
                    "{} produced no clusters and the k-means fallback failed: {e}",
                    cluster.learning_method
                ))
            })?;
            fitted = Fitted::from_model(&fallback, labels);
            used_fallback = true;
            if fitted.usable_clusters() == 0 {
                return Err(RegimeError::ConvergenceFailure(format!(
                    "{} and the k-means fallback both produced no clusters",
                    cluster.learning_method
                )));
            }
        }

        let distinct = distinct_labels(&fitted.labels);
        let realized = distinct.len();
        info!(clusters = realized, "Clustering finished");

        let centroids = match fitted.centers.take() {
            Some(centers) => CentroidSet::from_native(centers, &distinct)?,
            None => estimate_centers(
                vectors,
                &fitted.labels,
                &distinct,
                fitted.core_indices.as_deref(),
            )?,
        };

        let (labels, smoothing) =
            smooth(fitted.labels, &centroids, vectors, cluster.min_segment_length)?;
        let segments = extract_segments(&labels);
        let events = EventLog::new(&self.config.featurize.dataset, &segments, dataset.timestamps())?;

        let validity = ClusterValidity::compute(vectors, &labels)?;
        let mut names = cluster_names(centroids.centers().view(), dataset.feature_names());
        if let Some(predefined) = &predefined {
            splice_predefined_names(&mut names, predefined.names());
        }

        Ok(PipelineOutput {
            labels,
            segments,
            centroids,
            events,
            realized_clusters: realized,
            config: self.config.with_realized_clusters(realized),
            validity,
            cluster_names: names,
            predefined,
            smoothing,
            used_fallback,
        })
    }

    fn fit_seeded(
        &self,
        vectors: ArrayView2<f64>,
        predefined: &PredefinedCentroids,
    ) -> RegimeResult<Fitted> {
        let cluster = &self.config.cluster;
        let refiner = resolve_refiner(cluster)?;
        let bootstrap = KMeansClusterer::new(cluster.n_clusters, cluster.max_iter);
        let seeder = CentroidSeeder::new(refiner.as_ref(), &bootstrap, cluster.max_iter);

        let outcome = seeder.seed(
            vectors,
            cluster.n_clusters,
            predefined,
            cluster.fix_predefined_centroids,
        )?;
        info!(
            strategy = ?outcome.strategy,
            clusters = outcome.n_clusters,
            "Fitted from predefined centroids"
        );
        Ok(Fitted {
            labels: outcome.labels,
            centers: Some(outcome.centers),
            core_indices: None,
        })
    }

    /// Label `dataset` by nearest saved centroid, then smooth and derive
    /// events as a clustering run would.
    pub fn predict(
        centroids: &CentroidSet,
        dataset: &Dataset,
        min_segment_length: usize,
        case: &str,
    ) -> RegimeResult<Prediction> {
        let vectors = dataset.vectors();
        let labels = centroids.assign(vectors)?;
        let (labels, smoothing) = smooth(labels, centroids, vectors, min_segment_length)?;
        let segments = extract_segments(&labels);
        let events = EventLog::new(case, &segments, dataset.timestamps())?;
        Ok(Prediction {
            labels,
            segments,
            events,
            smoothing,
        })
    }
}

fn smooth(
    labels: Vec<Label>,
    centroids: &CentroidSet,
    vectors: ArrayView2<f64>,
    min_segment_length: usize,
) -> RegimeResult<(Vec<Label>, Option<SmoothingOutcome>)> {
    if min_segment_length == 0 {
        return Ok((labels, None));
    }
    let table = centroids.distance_table(vectors)?;
    let outcome = SegmentSmoother::new(min_segment_length).run(&labels, &table)?;
    info!(
        iterations = outcome.iterations,
        stalled = outcome.stalled,
        "Smoothed short segments"
    );
    Ok((outcome.labels.clone(), Some(outcome)))
}
