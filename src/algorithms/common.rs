use ndarray::ArrayView1;

/// Index of the smallest value, ties broken by lowest index.
///
/// NaN entries never win. Returns 0 for an all-NaN or empty row.
pub fn argmin(values: ArrayView1<f64>) -> usize {
    let mut best = 0;
    let mut best_val = f64::INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v < best_val {
            best_val = v;
            best = i;
        }
    }
    best
}

/// Most frequent value in `votes`, where every vote is below `n_bins`.
///
/// Ties go to the lowest value, matching the argmax-over-counts convention.
pub fn majority(votes: &[usize], n_bins: usize) -> Option<usize> {
    if votes.is_empty() {
        return None;
    }
    let mut counts = vec![0usize; n_bins];
    for &v in votes {
        counts[v] += 1;
    }
    let mut best = 0;
    for (bin, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = bin;
        }
    }
    Some(best)
}

/// Largest finite value in an iterator, or 0.0 when there is none.
pub fn finite_max<'a>(values: impl IntoIterator<Item = &'a f64>) -> f64 {
    values
        .into_iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max)
        .max(0.0)
}
