use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the labelling pipeline.
///
/// Recoverable conditions (smoothing stalls, unsupported seeding strategies,
/// a first convergence failure) are handled where they are detected and never
/// surface through this type.
#[derive(Debug, Error)]
pub enum RegimeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Missing prerequisite: {artifact} ({hint})")]
    PrerequisiteMissing { artifact: PathBuf, hint: String },

    #[error("Clustering produced no usable clusters: {0}")]
    ConvergenceFailure(String),

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Clustering backend error: {0}")]
    Clustering(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RegimeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RegimeError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for RegimeError {
    fn from(err: serde_json::Error) -> Self {
        RegimeError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for RegimeError {
    fn from(err: toml::de::Error) -> Self {
        RegimeError::Configuration(err.to_string())
    }
}

impl From<toml::ser::Error> for RegimeError {
    fn from(err: toml::ser::Error) -> Self {
        RegimeError::Serialization(err.to_string())
    }
}

/// Result type alias for pipeline operations.
pub type RegimeResult<T> = Result<T, RegimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prerequisite_names_artifact() {
        let err = RegimeError::PrerequisiteMissing {
            artifact: PathBuf::from("annotations/run1"),
            hint: "annotations are required for predefined centroids".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("annotations/run1"));
        assert!(msg.contains("predefined centroids"));
    }

    #[test]
    fn test_dimension_mismatch_display() {
        let err = RegimeError::DimensionMismatch {
            expected: 4,
            actual: 3,
        };
        assert!(err.to_string().contains('4'));
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn test_toml_error_is_configuration() {
        let parse: Result<toml::Value, _> = toml::from_str("[cluster\nn_clusters = 3");
        let err: RegimeError = parse.unwrap_err().into();
        assert!(matches!(err, RegimeError::Configuration(_)));
    }
}
