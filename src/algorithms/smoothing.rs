use ndarray::s;
use tracing::{debug, warn};

use crate::algorithms::common::{argmin, finite_max, majority};
use crate::core::centroids::DistanceTable;
use crate::core::error::{RegimeError, RegimeResult};
use crate::core::segment::{extract_segments, shortest_segment, Label, Segment};

/// Result of a smoothing run.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothingOutcome {
    pub labels: Vec<Label>,
    /// Number of short segments resolved.
    pub iterations: usize,
    /// True when the loop ended because no further segment could be removed.
    pub stalled: bool,
}

/// How a too-short segment is absorbed by its neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Previous,
    Next,
    /// First `at` samples go to the previous label, the rest to the next.
    Split { at: usize },
}

/// Removes segments shorter than a minimum length by reassigning their
/// samples to neighbouring labels.
///
/// Each iteration resolves the globally shortest segment (leftmost on ties).
/// Its samples vote for their second-closest centroid; if the winning label
/// matches a neighbour the whole run joins that neighbour, otherwise the run
/// is split at its midpoint between the two neighbours so no third label is
/// introduced. The loop stops when every segment is long enough, or when an
/// iteration fails to reduce the segment count.
#[derive(Debug, Clone, Copy)]
pub struct SegmentSmoother {
    min_length: usize,
}

impl SegmentSmoother {
    /// `min_length == 0` disables smoothing.
    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    /// Smooth `labels`, returning the cleaned sequence.
    pub fn smooth(&self, labels: &[Label], table: &DistanceTable) -> RegimeResult<Vec<Label>> {
        Ok(self.run(labels, table)?.labels)
    }

    /// Smooth `labels` and report how the loop terminated.
    ///
    /// `table.distances` must have one row per label and one column per
    /// label value that occurs in `labels`.
    pub fn run(&self, labels: &[Label], table: &DistanceTable) -> RegimeResult<SmoothingOutcome> {
        let mut labels = labels.to_vec();
        let mut segments = extract_segments(&labels);

        let done = |labels: Vec<Label>, iterations, stalled| SmoothingOutcome {
            labels,
            iterations,
            stalled,
        };

        if self.min_length == 0 || segments.is_empty() {
            return Ok(done(labels, 0, false));
        }
        if table.distances.nrows() != labels.len() {
            return Err(RegimeError::DimensionMismatch {
                expected: labels.len(),
                actual: table.distances.nrows(),
            });
        }

        let mut iterations = 0;
        loop {
            let Some(&shortest) = shortest_segment(&segments) else {
                return Ok(done(labels, iterations, false));
            };
            if shortest.length >= self.min_length {
                return Ok(done(labels, iterations, false));
            }
            if segments.len() == 1 {
                warn!(
                    length = shortest.length,
                    min_length = self.min_length,
                    "Sequence is a single segment; nothing to merge it into"
                );
                return Ok(done(labels, iterations, true));
            }

            let voted = second_closest_majority(table, &shortest)?;
            let (previous, next) = neighbour_labels(&segments, shortest.segment_index);
            let resolution = resolve(voted, previous, next, shortest.length);

            let run = &mut labels[shortest.start_index..=shortest.end_index];
            match resolution {
                Resolution::Previous => run.fill(previous),
                Resolution::Next => run.fill(next),
                Resolution::Split { at } => {
                    run[..at].fill(previous);
                    run[at..].fill(next);
                }
            }
            iterations += 1;

            let resegmented = extract_segments(&labels);
            debug!(
                segment = shortest.segment_index,
                label = shortest.label,
                length = shortest.length,
                voted,
                ?resolution,
                segments_before = segments.len(),
                segments_after = resegmented.len(),
                "Resolved short segment"
            );

            if resegmented.len() == segments.len() {
                warn!(
                    segments = segments.len(),
                    "Could not remove any more segments"
                );
                return Ok(done(labels, iterations, true));
            }
            segments = resegmented;
        }
    }
}

/// Majority vote over the second-closest centroid of every sample in the
/// segment, returned as a label value.
fn second_closest_majority(table: &DistanceTable, segment: &Segment) -> RegimeResult<Label> {
    let own = table.column_of(segment.label).ok_or_else(|| {
        RegimeError::InvariantViolation(format!(
            "label {} has no centroid column in the distance table",
            segment.label
        ))
    })?;

    let mut window = table
        .distances
        .slice(s![segment.start_index..segment.end_index + 1, ..])
        .to_owned();

    // Must exceed every distance in this window, so the own column never wins
    let sentinel = finite_max(window.iter()) + 1.0;
    window.column_mut(own).fill(sentinel);

    let votes: Vec<usize> = window.rows().into_iter().map(argmin).collect();
    let winner = majority(&votes, window.ncols()).ok_or_else(|| {
        RegimeError::InvariantViolation("cannot vote over an empty segment".into())
    })?;
    Ok(table.columns[winner])
}

/// Labels of the segments before and after `segment_index`.
///
/// At either end of the sequence both sides collapse to the one existing
/// neighbour. Requires at least two segments.
fn neighbour_labels(segments: &[Segment], segment_index: usize) -> (Label, Label) {
    let last = segments.len() - 1;
    if segment_index == 0 {
        let next = segments[1].label;
        (next, next)
    } else if segment_index == last {
        let previous = segments[last - 1].label;
        (previous, previous)
    } else {
        (
            segments[segment_index - 1].label,
            segments[segment_index + 1].label,
        )
    }
}

fn resolve(voted: Label, previous: Label, next: Label, length: usize) -> Resolution {
    if voted == previous {
        Resolution::Previous
    } else if voted == next {
        Resolution::Next
    } else {
        Resolution::Split { at: length / 2 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Distance table over labels `0..k` where each sample is at distance
    /// `near` from the centroid listed in `second`, 0 from its own centroid,
    /// and `far` from all others.
    fn table_with_second(labels: &[Label], second: &[Label], k: usize) -> DistanceTable {
        let mut distances = Array2::from_elem((labels.len(), k), 10.0);
        for (i, (&own, &snd)) in labels.iter().zip(second).enumerate() {
            distances[[i, own as usize]] = 0.0;
            distances[[i, snd as usize]] = 1.0;
        }
        DistanceTable {
            columns: (0..k as Label).collect(),
            distances,
        }
    }

    #[test]
    fn test_disabled_returns_input() {
        let labels = vec![0, 1, 0, 2];
        let table = table_with_second(&labels, &[1, 0, 1, 0], 3);
        let out = SegmentSmoother::new(0).run(&labels, &table).unwrap();
        assert_eq!(out.labels, labels);
        assert_eq!(out.iterations, 0);
    }

    #[test]
    fn test_already_long_enough_is_noop() {
        let labels = vec![0, 0, 1, 1, 1, 0, 0, 0, 0, 2, 2, 2];
        let table = table_with_second(&labels, &[1; 12], 3);
        let out = SegmentSmoother::new(2).run(&labels, &table).unwrap();
        assert_eq!(out.labels, labels);
        assert!(!out.stalled);
    }

    #[test]
    fn test_vote_matches_previous() {
        // Middle run of 1s votes for 0 (the previous neighbour)
        let labels = vec![0, 0, 0, 1, 2, 2, 2];
        let second = vec![1, 1, 1, 0, 1, 1, 1];
        let table = table_with_second(&labels, &second, 3);
        let out = SegmentSmoother::new(2).smooth(&labels, &table).unwrap();
        assert_eq!(out, vec![0, 0, 0, 0, 2, 2, 2]);
    }

    #[test]
    fn test_vote_matches_next() {
        let labels = vec![0, 0, 0, 1, 2, 2, 2];
        let second = vec![1, 1, 1, 2, 1, 1, 1];
        let table = table_with_second(&labels, &second, 3);
        let out = SegmentSmoother::new(2).smooth(&labels, &table).unwrap();
        assert_eq!(out, vec![0, 0, 0, 2, 2, 2, 2]);
    }

    #[test]
    fn test_unrelated_vote_splits_at_midpoint() {
        // Run of four 1s votes for label 3, which neighbours neither side
        let labels = vec![0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 2];
        let second = vec![1, 1, 1, 1, 1, 3, 3, 3, 3, 1, 1, 1, 1, 1];
        let table = table_with_second(&labels, &second, 4);
        let out = SegmentSmoother::new(5).run(&labels, &table).unwrap();
        assert_eq!(
            out.labels,
            vec![0, 0, 0, 0, 0, 0, 0, 2, 2, 2, 2, 2, 2, 2]
        );
        assert_eq!(out.iterations, 1);
    }

    #[test]
    fn test_odd_split_gives_remainder_to_next() {
        let labels = vec![0, 0, 0, 0, 1, 1, 1, 2, 2, 2, 2];
        let second = vec![1, 1, 1, 1, 3, 3, 3, 1, 1, 1, 1];
        let table = table_with_second(&labels, &second, 4);
        let out = SegmentSmoother::new(4).smooth(&labels, &table).unwrap();
        assert_eq!(out, vec![0, 0, 0, 0, 0, 2, 2, 2, 2, 2, 2]);
    }

    #[test]
    fn test_first_segment_joins_next() {
        let labels = vec![1, 0, 0, 0];
        // Votes for 2, but both neighbours collapse to 0 → split: at = 0
        let table = table_with_second(&labels, &[2, 1, 1, 1], 3);
        let out = SegmentSmoother::new(2).smooth(&labels, &table).unwrap();
        assert_eq!(out, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_last_segment_joins_previous() {
        let labels = vec![0, 0, 0, 1];
        let table = table_with_second(&labels, &[1, 1, 1, 0], 2);
        let out = SegmentSmoother::new(2).smooth(&labels, &table).unwrap();
        assert_eq!(out, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_leftmost_shortest_resolved_first() {
        // Singletons at index 3 (label 1) and 4 (label 2) tie on length.
        // Resolving the left one first absorbs it into label 2 and finishes;
        // resolving the right one first would leave label 3 behind instead.
        let labels = vec![0, 0, 0, 1, 2, 3, 3, 3];
        let second = vec![1, 1, 1, 2, 3, 2, 2, 2];
        let table = table_with_second(&labels, &second, 4);
        let out = SegmentSmoother::new(2).run(&labels, &table).unwrap();
        assert_eq!(out.labels, vec![0, 0, 0, 2, 2, 3, 3, 3]);
        assert_eq!(out.iterations, 1);
    }

    #[test]
    fn test_single_segment_stalls() {
        let labels = vec![4, 4];
        let table = DistanceTable {
            columns: vec![4],
            distances: Array2::zeros((2, 1)),
        };
        let out = SegmentSmoother::new(5).run(&labels, &table).unwrap();
        assert_eq!(out.labels, labels);
        assert!(out.stalled);
    }

    #[test]
    fn test_missing_column_is_invariant_violation() {
        let labels = vec![0, 0, 5, 0, 0];
        let table = table_with_second(&[0, 0, 1, 0, 0], &[1, 1, 0, 1, 1], 2);
        let err = SegmentSmoother::new(2).run(&labels, &table).unwrap_err();
        assert!(matches!(err, RegimeError::InvariantViolation(_)));
    }

    #[test]
    fn test_row_count_checked() {
        let labels = vec![0, 1, 0];
        let table = table_with_second(&[0, 1], &[1, 0], 2);
        let err = SegmentSmoother::new(2).run(&labels, &table).unwrap_err();
        assert!(matches!(err, RegimeError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_sentinel_exceeds_local_maximum() {
        // Distances in the window reach 900; a fixed sentinel below that
        // would let the run vote for its own label and force a split.
        let labels = vec![0, 0, 0, 1, 1, 2, 2, 2];
        let mut distances = Array2::from_elem((8, 3), 500.0);
        for (i, &label) in labels.iter().enumerate() {
            distances[[i, label as usize]] = 0.0;
        }
        distances[[3, 0]] = 900.0;
        distances[[4, 0]] = 900.0;
        distances[[3, 2]] = 800.0;
        distances[[4, 2]] = 700.0;
        let table = DistanceTable {
            columns: vec![0, 1, 2],
            distances,
        };
        let out = SegmentSmoother::new(3).smooth(&labels, &table).unwrap();
        assert_eq!(out, vec![0, 0, 0, 2, 2, 2, 2, 2]);
    }

    #[test]
    fn test_segment_count_never_increases() {
        let labels: Vec<Label> = (0..120u64).map(|i| ((i * 37 % 11) % 3) as Label).collect();
        let second: Vec<Label> = labels.iter().map(|&l| (l + 1) % 3).collect();
        let table = table_with_second(&labels, &second, 3);
        let before = extract_segments(&labels).len();

        for min_length in 1..6 {
            let out = SegmentSmoother::new(min_length).run(&labels, &table).unwrap();
            let after = extract_segments(&out.labels);
            assert!(after.len() <= before);
            assert!(out.iterations <= before);
            if !out.stalled {
                assert!(after.iter().all(|s| s.length >= min_length));
            }
        }
    }
}
