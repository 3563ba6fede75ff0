use std::path::{Path, PathBuf};

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::algorithms::seeding::PredefinedCentroids;
use crate::core::error::{RegimeError, RegimeResult};
use crate::io::dataset::Dataset;

const PREDEFINED_HINT: &str = "annotations are required to build predefined centroids";

/// A labelled time range `[start, end]`, in dataset timestamp units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub label: String,
    pub start: f64,
    pub end: f64,
}

/// The annotation file inside `dir`: the first `.json` file by name.
pub fn find_annotation_file(dir: &Path) -> RegimeResult<PathBuf> {
    if !dir.is_dir() {
        return Err(RegimeError::PrerequisiteMissing {
            artifact: dir.to_path_buf(),
            hint: PREDEFINED_HINT.into(),
        });
    }

    let entries = std::fs::read_dir(dir).map_err(|e| RegimeError::io(dir, e))?;
    let mut candidates = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| RegimeError::io(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            candidates.push(path);
        }
    }
    candidates.sort();

    candidates
        .into_iter()
        .next()
        .ok_or_else(|| RegimeError::PrerequisiteMissing {
            artifact: dir.join("*.json"),
            hint: PREDEFINED_HINT.into(),
        })
}

pub fn read_annotations(path: &Path) -> RegimeResult<Vec<Annotation>> {
    let content = std::fs::read_to_string(path).map_err(|e| RegimeError::io(path, e))?;
    let annotations: Vec<Annotation> = serde_json::from_str(&content)?;
    for a in &annotations {
        if a.end < a.start {
            return Err(RegimeError::InvalidInput(format!(
                "annotation '{}' ends ({}) before it starts ({})",
                a.label, a.end, a.start
            )));
        }
    }
    Ok(annotations)
}

/// One centroid per annotation label, in order of first appearance.
///
/// Each centroid is the mean of the feature vectors whose timestamps fall
/// in any of that label's ranges.
pub fn centroids_from_annotations(
    dataset: &Dataset,
    annotations: &[Annotation],
) -> RegimeResult<PredefinedCentroids> {
    if annotations.is_empty() {
        return Err(RegimeError::InvalidInput("annotation list is empty".into()));
    }

    let mut order: Vec<&str> = Vec::new();
    for a in annotations {
        if !order.contains(&a.label.as_str()) {
            order.push(&a.label);
        }
    }

    let vectors = dataset.vectors();
    let mut entries = Vec::with_capacity(order.len());
    for label in order {
        let mut sum = Array1::<f64>::zeros(dataset.dim());
        let mut count = 0usize;
        let mut covered = vec![false; dataset.len()];
        for a in annotations.iter().filter(|a| a.label == label) {
            for i in dataset.indices_between(a.start, a.end) {
                // Overlapping ranges of one label count each sample once
                if !covered[i] {
                    covered[i] = true;
                    sum += &vectors.row(i);
                    count += 1;
                }
            }
        }
        if count == 0 {
            return Err(RegimeError::InvalidInput(format!(
                "annotation label '{label}' covers no samples"
            )));
        }
        debug!(label, samples = count, "Derived predefined centroid");
        entries.push((label.to_string(), (sum / count as f64).to_vec()));
    }

    PredefinedCentroids::new(entries)
}

/// Locate, read and reduce the annotations in `dir` to predefined centroids.
pub fn load_predefined(dir: &Path, dataset: &Dataset) -> RegimeResult<PredefinedCentroids> {
    let path = find_annotation_file(dir)?;
    let annotations = read_annotations(&path)?;
    let predefined = centroids_from_annotations(dataset, &annotations)?;
    info!(
        file = %path.display(),
        centroids = predefined.len(),
        "Loaded predefined centroids from annotations"
    );
    Ok(predefined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Dataset {
        Dataset::from_rows(
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            vec![
                vec![1.0, 1.0],
                vec![1.0, 3.0],
                vec![9.0, 9.0],
                vec![5.0, 5.0],
                vec![5.0, 7.0],
                vec![1.0, 2.0],
            ],
            vec![],
        )
        .unwrap()
    }

    fn annotation(label: &str, start: f64, end: f64) -> Annotation {
        Annotation {
            label: label.into(),
            start,
            end,
        }
    }

    #[test]
    fn test_centroids_first_appearance_order() {
        let annotations = vec![
            annotation("press", 3.0, 4.0),
            annotation("idle", 0.0, 1.0),
            annotation("idle", 5.0, 5.0),
        ];
        let pre = centroids_from_annotations(&dataset(), &annotations).unwrap();
        let items: Vec<_> = pre.iter().collect();
        assert_eq!(items[0], ("press", &[5.0, 6.0][..]));
        assert_eq!(items[1].0, "idle");
        assert_eq!(items[1].1, &[1.0, 2.0][..]);
    }

    #[test]
    fn test_overlap_counts_once() {
        let annotations = vec![annotation("a", 0.0, 1.0), annotation("a", 1.0, 1.0)];
        let pre = centroids_from_annotations(&dataset(), &annotations).unwrap();
        assert_eq!(pre.iter().next().unwrap().1, &[1.0, 2.0][..]);
    }

    #[test]
    fn test_empty_label_is_invalid() {
        let annotations = vec![annotation("ghost", 10.0, 20.0)];
        let err = centroids_from_annotations(&dataset(), &annotations).unwrap_err();
        assert!(matches!(err, RegimeError::InvalidInput(_)));
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_missing_directory_names_artifact() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("run7");
        let err = load_predefined(&missing, &dataset()).unwrap_err();
        match err {
            RegimeError::PrerequisiteMissing { artifact, .. } => assert_eq!(artifact, missing),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_json_file() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "x").unwrap();
        let err = find_annotation_file(tmp.path()).unwrap_err();
        assert!(matches!(err, RegimeError::PrerequisiteMissing { .. }));
    }

    #[test]
    fn test_load_from_directory() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("labels.json"),
            r#"[{"label": "idle", "start": 0.0, "end": 1.0}]"#,
        )
        .unwrap();
        let pre = load_predefined(tmp.path(), &dataset()).unwrap();
        assert_eq!(pre.len(), 1);
    }

    #[test]
    fn test_reversed_range_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.json");
        std::fs::write(&path, r#"[{"label": "x", "start": 3.0, "end": 1.0}]"#).unwrap();
        assert!(matches!(
            read_annotations(&path).unwrap_err(),
            RegimeError::InvalidInput(_)
        ));
    }
}
