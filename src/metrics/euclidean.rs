use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1, Zip};

/// Minimum number of rows before the distance table is filled in parallel.
/// Below this threshold, thread-dispatch overhead exceeds parallelism gains.
#[cfg(feature = "parallel")]
const MIN_PARALLEL_ROWS: usize = 4096;

/// Squared Euclidean distance between two equal-length vectors.
#[inline]
pub fn squared_euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Euclidean distance between two equal-length vectors.
#[inline]
pub fn euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    squared_euclidean(a, b).sqrt()
}

/// Distance from every sample to every center: an `N x K` table where entry
/// `(i, k)` is `||vectors[i] - centers[k]||`.
///
/// With the `parallel` feature, large inputs are filled row-wise on the rayon
/// pool. The result is identical to the sequential path.
pub fn pairwise_distances(vectors: ArrayView2<f64>, centers: ArrayView2<f64>) -> Array2<f64> {
    let mut table = Array2::zeros((vectors.nrows(), centers.nrows()));

    #[cfg(feature = "parallel")]
    if vectors.nrows() >= MIN_PARALLEL_ROWS {
        Zip::from(table.rows_mut())
            .and(vectors.rows())
            .par_for_each(|out, row| fill_row(out, row, centers));
        return table;
    }

    Zip::from(table.rows_mut())
        .and(vectors.rows())
        .for_each(|out, row| fill_row(out, row, centers));
    table
}

fn fill_row(mut out: ArrayViewMut1<f64>, row: ArrayView1<f64>, centers: ArrayView2<f64>) {
    for (slot, center) in out.iter_mut().zip(centers.rows()) {
        *slot = euclidean(row, center);
    }
}

/// Index of the nearest center for every sample (ties → lowest center index).
pub fn nearest_centers(vectors: ArrayView2<f64>, centers: ArrayView2<f64>) -> Vec<usize> {
    vectors
        .rows()
        .into_iter()
        .map(|row| {
            let mut best = 0;
            let mut best_dist = f64::INFINITY;
            for (k, center) in centers.rows().into_iter().enumerate() {
                let d = squared_euclidean(row, center);
                if d < best_dist {
                    best_dist = d;
                    best = k;
                }
            }
            best
        })
        .collect()
}
