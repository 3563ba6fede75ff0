use std::path::{Path, PathBuf};

use ndarray::Array2;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::centroids::CentroidSet;
use crate::core::error::{RegimeError, RegimeResult};
use crate::core::segment::Label;

pub const LABELS_FILE: &str = "labels.json";
pub const CENTERS_FILE: &str = "cluster_centers.json";
pub const EVENT_LOG_FILE: &str = "event_log.json";
pub const METRICS_FILE: &str = "metrics.json";
pub const CLUSTER_NAMES_FILE: &str = "cluster_names.json";
pub const PREDEFINED_FILE: &str = "predefined_centroids.json";

/// Serialized form of a [`CentroidSet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidsFile {
    pub labels: Vec<Label>,
    pub centers: Vec<Vec<f64>>,
}

impl From<&CentroidSet> for CentroidsFile {
    fn from(set: &CentroidSet) -> Self {
        Self {
            labels: set.labels().to_vec(),
            centers: set.rows(),
        }
    }
}

impl TryFrom<CentroidsFile> for CentroidSet {
    type Error = RegimeError;

    fn try_from(file: CentroidsFile) -> Result<Self, Self::Error> {
        let dim = file.centers.first().map_or(0, Vec::len);
        if let Some(bad) = file.centers.iter().find(|r| r.len() != dim) {
            return Err(RegimeError::DimensionMismatch {
                expected: dim,
                actual: bad.len(),
            });
        }
        let n = file.centers.len();
        let flat: Vec<f64> = file.centers.into_iter().flatten().collect();
        let centers = Array2::from_shape_vec((n, dim), flat)
            .map_err(|e| RegimeError::InvalidInput(e.to_string()))?;
        CentroidSet::new(file.labels, centers)
    }
}

/// Writes pipeline artifacts as pretty-printed JSON into one directory.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    dir: PathBuf,
}

impl OutputWriter {
    /// Creates `dir` if needed.
    pub fn new(dir: impl Into<PathBuf>) -> RegimeResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| RegimeError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write_json<T: Serialize + ?Sized>(
        &self,
        file_name: &str,
        value: &T,
    ) -> RegimeResult<PathBuf> {
        let path = self.dir.join(file_name);
        write_json(&path, value)?;
        Ok(path)
    }
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> RegimeResult<()> {
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content).map_err(|e| RegimeError::io(path, e))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> RegimeResult<T> {
    let content = std::fs::read_to_string(path).map_err(|e| RegimeError::io(path, e))?;
    Ok(serde_json::from_str(&content)?)
}

/// Load a centroid set written as [`CENTERS_FILE`].
pub fn read_centroids(path: &Path) -> RegimeResult<CentroidSet> {
    let file: CentroidsFile = read_json(path)?;
    file.try_into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_centroids_file_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(tmp.path().join("out")).unwrap();
        let set = CentroidSet::new(vec![-1, 2], array![[0.5, 1.0], [3.0, 4.0]]).unwrap();

        let path = writer
            .write_json(CENTERS_FILE, &CentroidsFile::from(&set))
            .unwrap();
        assert!(path.ends_with(CENTERS_FILE));
        assert_eq!(read_centroids(&path).unwrap(), set);
    }

    #[test]
    fn test_ragged_centers_rejected() {
        let file = CentroidsFile {
            labels: vec![0, 1],
            centers: vec![vec![1.0, 2.0], vec![3.0]],
        };
        assert!(CentroidSet::try_from(file).is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = read_centroids(&tmp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, RegimeError::Io { .. }));
    }
}
