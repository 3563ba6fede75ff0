use serde::{Deserialize, Serialize};

/// A cluster label assigned to one time step.
///
/// Labels need not be contiguous. Density-based models emit [`NOISE_LABEL`]
/// for outliers; the segmentation code treats it like any other value.
pub type Label = i64;

/// Label emitted by density-based models for samples outside every cluster.
pub const NOISE_LABEL: Label = -1;

/// A maximal run of one label value over the inclusive range
/// `[start_index, end_index]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Position of this run in the segment list (0-based, contiguous).
    pub segment_index: usize,
    pub label: Label,
    pub length: usize,
    pub start_index: usize,
    pub end_index: usize,
}

/// Collapse a label sequence into its maximal runs of identical labels.
///
/// The returned segments partition `[0, labels.len() - 1]` exactly and are
/// ordered by `start_index`. An empty input yields an empty list.
///
/// # Examples
///
/// ```
/// use regime_rs::extract_segments;
///
/// let segments = extract_segments(&[0, 0, 1, 1, 1, 0]);
/// assert_eq!(segments.len(), 3);
/// assert_eq!((segments[1].label, segments[1].length), (1, 3));
/// ```
pub fn extract_segments(labels: &[Label]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let Some(&first) = labels.first() else {
        return segments;
    };

    let mut current = first;
    let mut start = 0;

    for (i, &label) in labels.iter().enumerate().skip(1) {
        if label != current {
            segments.push(Segment {
                segment_index: segments.len(),
                label: current,
                length: i - start,
                start_index: start,
                end_index: i - 1,
            });
            current = label;
            start = i;
        }
    }

    // Close the trailing run
    segments.push(Segment {
        segment_index: segments.len(),
        label: current,
        length: labels.len() - start,
        start_index: start,
        end_index: labels.len() - 1,
    });

    segments
}

/// Rebuild the label sequence described by a segment list.
pub fn expand_segments(segments: &[Segment]) -> Vec<Label> {
    let total = segments.last().map_or(0, |s| s.end_index + 1);
    let mut labels = Vec::with_capacity(total);
    for segment in segments {
        labels.resize(labels.len() + segment.length, segment.label);
    }
    labels
}

/// The shortest segment, ties broken by lowest `segment_index`.
pub fn shortest_segment(segments: &[Segment]) -> Option<&Segment> {
    // min_by_key keeps the first of equal minima
    segments.iter().min_by_key(|s| s.length)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_rows(segments: &[Segment]) -> Vec<[i64; 5]> {
        segments
            .iter()
            .map(|s| {
                [
                    s.segment_index as i64,
                    s.label,
                    s.length as i64,
                    s.start_index as i64,
                    s.end_index as i64,
                ]
            })
            .collect()
    }

    #[test]
    fn test_documented_example() {
        let labels = vec![0, 0, 1, 1, 1, 0, 0, 0, 0, 2, 2, 2];
        let segments = extract_segments(&labels);
        assert_eq!(
            as_rows(&segments),
            vec![[0, 0, 2, 0, 1], [1, 1, 3, 2, 4], [2, 0, 4, 5, 8], [3, 2, 3, 9, 11]]
        );
    }

    #[test]
    fn test_single_segment() {
        let segments = extract_segments(&[7, 7, 7]);
        assert_eq!(as_rows(&segments), vec![[0, 7, 3, 0, 2]]);
    }

    #[test]
    fn test_single_sample() {
        let segments = extract_segments(&[4]);
        assert_eq!(as_rows(&segments), vec![[0, 4, 1, 0, 0]]);
    }

    #[test]
    fn test_trailing_singleton_is_kept() {
        let segments = extract_segments(&[1, 1, 2]);
        assert_eq!(as_rows(&segments), vec![[0, 1, 2, 0, 1], [1, 2, 1, 2, 2]]);
    }

    #[test]
    fn test_empty_input() {
        assert!(extract_segments(&[]).is_empty());
        assert!(expand_segments(&[]).is_empty());
    }

    #[test]
    fn test_noise_label_is_ordinary() {
        let segments = extract_segments(&[NOISE_LABEL, NOISE_LABEL, 0, NOISE_LABEL]);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].label, NOISE_LABEL);
        assert_eq!(segments[2].length, 1);
    }

    #[test]
    fn test_partition_and_roundtrip() {
        // Pseudo-random sequence with runs of varying length
        let labels: Vec<Label> = (0..200u64)
            .map(|i| ((i * 7919 % 31) / 9) as Label)
            .collect();
        let segments = extract_segments(&labels);

        let mut expected_start = 0;
        for (k, s) in segments.iter().enumerate() {
            assert_eq!(s.segment_index, k);
            assert_eq!(s.start_index, expected_start);
            assert_eq!(s.end_index + 1 - s.start_index, s.length);
            if k > 0 {
                assert_ne!(segments[k - 1].label, s.label, "runs must be maximal");
            }
            expected_start = s.end_index + 1;
        }
        assert_eq!(expected_start, labels.len());

        let rebuilt = expand_segments(&segments);
        assert_eq!(rebuilt, labels);
        assert_eq!(extract_segments(&rebuilt), segments);
    }

    #[test]
    fn test_shortest_prefers_leftmost() {
        let segments = extract_segments(&[0, 0, 1, 1, 2, 2, 2]);
        let s = shortest_segment(&segments).unwrap();
        assert_eq!(s.segment_index, 0);

        let segments = extract_segments(&[0, 0, 0, 1, 2, 2, 3]);
        let s = shortest_segment(&segments).unwrap();
        assert_eq!(s.segment_index, 1);
    }
}
