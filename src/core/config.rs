use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::{RegimeError, RegimeResult};

/// Clustering method selected by `cluster.learning_method`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusteringMethod {
    MeanShift,
    MiniBatchKMeans,
    AffinityPropagation,
    Dbscan,
}

impl ClusteringMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusteringMethod::MeanShift => "meanshift",
            ClusteringMethod::MiniBatchKMeans => "minibatchkmeans",
            ClusteringMethod::AffinityPropagation => "affinitypropagation",
            ClusteringMethod::Dbscan => "dbscan",
        }
    }
}

impl fmt::Display for ClusteringMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClusteringMethod {
    type Err = RegimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "meanshift" => Ok(ClusteringMethod::MeanShift),
            "minibatchkmeans" => Ok(ClusteringMethod::MiniBatchKMeans),
            "affinitypropagation" => Ok(ClusteringMethod::AffinityPropagation),
            "dbscan" => Ok(ClusteringMethod::Dbscan),
            other => Err(RegimeError::Configuration(format!(
                "learning method '{other}' not implemented \
                 (expected meanshift, minibatchkmeans, affinitypropagation or dbscan)"
            ))),
        }
    }
}

/// Settings shared with the featurization stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeaturizeConfig {
    /// Dataset name; used as the case identifier of the event log.
    #[serde(default)]
    pub dataset: String,
    /// Keys read by other stages (window size, columns, ...), kept verbatim.
    #[serde(flatten)]
    pub other: BTreeMap<String, toml::Value>,
}

/// Clustering and post-processing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub learning_method: String,
    /// Requested cluster count. Overwritten with the realized count after a run.
    pub n_clusters: usize,
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    #[serde(default)]
    pub use_predefined_centroids: bool,
    #[serde(default)]
    pub fix_predefined_centroids: bool,
    #[serde(default = "default_annotations_dir")]
    pub annotations_dir: PathBuf,
    /// Segments shorter than this are smoothed away; 0 disables smoothing.
    #[serde(default)]
    pub min_segment_length: usize,
    #[serde(default = "default_dbscan_eps")]
    pub dbscan_eps: f64,
    #[serde(default = "default_dbscan_min_samples")]
    pub dbscan_min_samples: usize,
    #[serde(default = "default_affinity_damping")]
    pub affinity_damping: f64,
    #[serde(default = "default_affinity_max_iter")]
    pub affinity_max_iter: usize,
    /// Mean-shift kernel bandwidth; estimated from the data when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meanshift_bandwidth: Option<f64>,
    #[serde(flatten)]
    pub other: BTreeMap<String, toml::Value>,
}

fn default_max_iter() -> usize {
    100
}

fn default_annotations_dir() -> PathBuf {
    PathBuf::from("annotations")
}

fn default_dbscan_eps() -> f64 {
    0.5
}

fn default_dbscan_min_samples() -> usize {
    5
}

fn default_affinity_damping() -> f64 {
    0.9
}

fn default_affinity_max_iter() -> usize {
    1000
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            learning_method: ClusteringMethod::MiniBatchKMeans.to_string(),
            n_clusters: 5,
            max_iter: default_max_iter(),
            use_predefined_centroids: false,
            fix_predefined_centroids: false,
            annotations_dir: default_annotations_dir(),
            min_segment_length: 0,
            dbscan_eps: default_dbscan_eps(),
            dbscan_min_samples: default_dbscan_min_samples(),
            affinity_damping: default_affinity_damping(),
            affinity_max_iter: default_affinity_max_iter(),
            meanshift_bandwidth: None,
            other: BTreeMap::new(),
        }
    }
}

/// Top-level params file.
///
/// Sections owned by other pipeline stages are carried through untouched so
/// that writing the realized cluster count back does not drop them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub featurize: FeaturizeConfig,
    pub cluster: ClusterConfig,
    #[serde(flatten)]
    pub other: BTreeMap<String, toml::Value>,
}

impl PipelineConfig {
    /// Load and validate a TOML params file.
    pub fn load(path: &Path) -> RegimeResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RegimeError::io(path, e))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> RegimeResult<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> RegimeResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the params file back to disk.
    pub fn save(&self, path: &Path) -> RegimeResult<()> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content).map_err(|e| RegimeError::io(path, e))
    }

    /// Validate configuration values.
    pub fn validate(&self) -> RegimeResult<()> {
        let c = &self.cluster;
        c.method()?;

        if c.n_clusters == 0 {
            return Err(RegimeError::Configuration(
                "cluster.n_clusters must be greater than 0".into(),
            ));
        }
        if c.max_iter == 0 {
            return Err(RegimeError::Configuration(
                "cluster.max_iter must be greater than 0".into(),
            ));
        }
        if !(0.5..1.0).contains(&c.affinity_damping) {
            return Err(RegimeError::Configuration(format!(
                "cluster.affinity_damping must be in [0.5, 1.0), got {}",
                c.affinity_damping
            )));
        }
        if c.dbscan_eps <= 0.0 {
            return Err(RegimeError::Configuration(
                "cluster.dbscan_eps must be positive".into(),
            ));
        }
        if c.dbscan_min_samples < 2 {
            return Err(RegimeError::Configuration(
                "cluster.dbscan_min_samples must be at least 2".into(),
            ));
        }
        if let Some(bw) = c.meanshift_bandwidth {
            if bw <= 0.0 {
                return Err(RegimeError::Configuration(
                    "cluster.meanshift_bandwidth must be positive".into(),
                ));
            }
        }
        Ok(())
    }

    /// The configuration to persist after a run that realized `n` clusters.
    pub fn with_realized_clusters(&self, n: usize) -> Self {
        let mut updated = self.clone();
        updated.cluster.n_clusters = n;
        updated
    }
}

impl ClusterConfig {
    pub fn method(&self) -> RegimeResult<ClusteringMethod> {
        self.learning_method.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: &str = r#"
[featurize]
dataset = "press_line_3"
window_size = 20
columns = ["speed", "force"]

[cluster]
learning_method = "minibatchkmeans"
n_clusters = 4
max_iter = 50
min_segment_length = 3
scaler = "standard"

[evaluate]
show_plots = false
"#;

    #[test]
    fn test_parse_with_defaults() {
        let config = PipelineConfig::from_toml_str(PARAMS).unwrap();
        assert_eq!(config.featurize.dataset, "press_line_3");
        assert_eq!(config.cluster.n_clusters, 4);
        assert_eq!(config.cluster.min_segment_length, 3);
        assert!(!config.cluster.use_predefined_centroids);
        assert_eq!(config.cluster.dbscan_min_samples, 5);
        assert_eq!(config.cluster.method().unwrap(), ClusteringMethod::MiniBatchKMeans);
    }

    #[test]
    fn test_unknown_method_is_configuration_error() {
        let content = PARAMS.replace("minibatchkmeans", "gaussianmixture");
        let err = PipelineConfig::from_toml_str(&content).unwrap_err();
        assert!(matches!(err, RegimeError::Configuration(_)));
        assert!(err.to_string().contains("gaussianmixture"));
    }

    #[test]
    fn test_method_names_case_insensitive() {
        assert_eq!(
            "MeanShift".parse::<ClusteringMethod>().unwrap(),
            ClusteringMethod::MeanShift
        );
        assert_eq!(
            "dbscan".parse::<ClusteringMethod>().unwrap().to_string(),
            "dbscan"
        );
    }

    #[test]
    fn test_rejects_zero_clusters() {
        let content = PARAMS.replace("n_clusters = 4", "n_clusters = 0");
        assert!(PipelineConfig::from_toml_str(&content).is_err());
    }

    #[test]
    fn test_realized_count_round_trip_keeps_other_sections() {
        let config = PipelineConfig::from_toml_str(PARAMS).unwrap();
        let updated = config.with_realized_clusters(3);
        assert_eq!(config.cluster.n_clusters, 4, "original is untouched");

        let text = updated.to_toml_string().unwrap();
        let reparsed = PipelineConfig::from_toml_str(&text).unwrap();
        assert_eq!(reparsed.cluster.n_clusters, 3);
        assert_eq!(reparsed.featurize.dataset, "press_line_3");
        assert!(reparsed.other.contains_key("evaluate"));
        assert_eq!(
            reparsed.featurize.other.get("window_size"),
            Some(&toml::Value::Integer(20))
        );
        assert!(reparsed.featurize.other.contains_key("columns"));
        assert_eq!(
            reparsed.cluster.other.get("scaler").and_then(|v| v.as_str()),
            Some("standard")
        );
        assert_eq!(reparsed, updated);
    }
}
