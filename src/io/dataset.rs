use std::path::Path;

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::core::error::{RegimeError, RegimeResult};

/// On-disk layout of a dataset file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DatasetFile {
    timestamps: Vec<f64>,
    vectors: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    feature_names: Vec<String>,
}

/// Time-ordered feature vectors: one row of `vectors` per timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    timestamps: Vec<f64>,
    vectors: Array2<f64>,
    feature_names: Vec<String>,
}

impl Dataset {
    /// Checks that there is one timestamp per row, timestamps never
    /// decrease, values are finite, and feature names (if any) match the
    /// column count.
    pub fn new(
        timestamps: Vec<f64>,
        vectors: Array2<f64>,
        feature_names: Vec<String>,
    ) -> RegimeResult<Self> {
        if timestamps.len() != vectors.nrows() {
            return Err(RegimeError::DimensionMismatch {
                expected: vectors.nrows(),
                actual: timestamps.len(),
            });
        }
        if let Some(i) = timestamps.windows(2).position(|w| w[1] < w[0]) {
            return Err(RegimeError::InvalidInput(format!(
                "timestamps decrease at index {}",
                i + 1
            )));
        }
        if vectors.iter().any(|v| !v.is_finite()) {
            return Err(RegimeError::InvalidInput(
                "feature vectors contain non-finite values".into(),
            ));
        }
        if !feature_names.is_empty() && feature_names.len() != vectors.ncols() {
            return Err(RegimeError::DimensionMismatch {
                expected: vectors.ncols(),
                actual: feature_names.len(),
            });
        }
        Ok(Self {
            timestamps,
            vectors,
            feature_names,
        })
    }

    /// Build from row vectors, which must all share one length.
    pub fn from_rows(
        timestamps: Vec<f64>,
        rows: Vec<Vec<f64>>,
        feature_names: Vec<String>,
    ) -> RegimeResult<Self> {
        let dim = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().find(|r| r.len() != dim) {
            return Err(RegimeError::DimensionMismatch {
                expected: dim,
                actual: bad.len(),
            });
        }
        let n = rows.len();
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        let vectors = Array2::from_shape_vec((n, dim), flat)
            .map_err(|e| RegimeError::InvalidInput(e.to_string()))?;
        Self::new(timestamps, vectors, feature_names)
    }

    pub fn load(path: &Path) -> RegimeResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RegimeError::io(path, e))?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> RegimeResult<Self> {
        let file: DatasetFile = serde_json::from_str(content)?;
        Self::from_rows(file.timestamps, file.vectors, file.feature_names)
    }

    pub fn to_json_string(&self) -> RegimeResult<String> {
        let file = DatasetFile {
            timestamps: self.timestamps.clone(),
            vectors: self
                .vectors
                .rows()
                .into_iter()
                .map(|r| r.to_vec())
                .collect(),
            feature_names: self.feature_names.clone(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn vectors(&self) -> ArrayView2<'_, f64> {
        self.vectors.view()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Feature dimension `D`.
    pub fn dim(&self) -> usize {
        self.vectors.ncols()
    }

    /// Row indices whose timestamp falls in `[start, end]`.
    pub fn indices_between(&self, start: f64, end: f64) -> std::ops::Range<usize> {
        let lo = self.timestamps.partition_point(|&t| t < start);
        let hi = self.timestamps.partition_point(|&t| t <= end);
        lo..hi.max(lo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &str = r#"{
        "timestamps": [0.0, 1.0, 2.0, 3.0],
        "vectors": [[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]],
        "feature_names": ["speed", "load"]
    }"#;

    #[test]
    fn test_parse() {
        let ds = Dataset::from_json_str(DATA).unwrap();
        assert_eq!(ds.len(), 4);
        assert_eq!(ds.dim(), 2);
        assert_eq!(ds.vectors()[[2, 1]], 30.0);
        assert_eq!(ds.feature_names(), &["speed", "load"]);

        let back = Dataset::from_json_str(&ds.to_json_string().unwrap()).unwrap();
        assert_eq!(back, ds);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = Dataset::from_rows(vec![0.0, 1.0], vec![vec![1.0, 2.0], vec![1.0]], vec![])
            .unwrap_err();
        assert!(matches!(err, RegimeError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_timestamp_count_and_order() {
        let err = Dataset::from_rows(vec![0.0], vec![vec![1.0], vec![2.0]], vec![]).unwrap_err();
        assert!(matches!(err, RegimeError::DimensionMismatch { .. }));

        let err = Dataset::from_rows(vec![1.0, 0.5], vec![vec![1.0], vec![2.0]], vec![])
            .unwrap_err();
        assert!(matches!(err, RegimeError::InvalidInput(_)));
    }

    #[test]
    fn test_feature_name_count_checked() {
        let err = Dataset::from_rows(vec![0.0], vec![vec![1.0, 2.0]], vec!["a".into()])
            .unwrap_err();
        assert!(matches!(err, RegimeError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_indices_between() {
        let ds = Dataset::from_json_str(DATA).unwrap();
        assert_eq!(ds.indices_between(0.5, 2.0), 1..3);
        assert_eq!(ds.indices_between(5.0, 9.0), 4..4);
        assert_eq!(ds.indices_between(0.0, 0.0), 0..1);
    }
}
