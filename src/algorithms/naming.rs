use ndarray::ArrayView2;

use crate::algorithms::common::argmin;

/// Describe each centroid row by the features it has the extreme value of.
///
/// Row `i` is named `"{i}: "` followed by `highest <feature>, ` for every
/// feature whose maximum over all centroids is in row `i`, and likewise
/// `lowest <feature>, ` for minima. Ties go to the lowest row.
pub fn cluster_names(centers: ArrayView2<f64>, feature_names: &[String]) -> Vec<String> {
    let mut names: Vec<String> = (0..centers.nrows()).map(|i| format!("{i}: ")).collect();
    if centers.nrows() == 0 {
        return names;
    }

    for (j, column) in centers.columns().into_iter().enumerate() {
        let feature = feature_names
            .get(j)
            .cloned()
            .unwrap_or_else(|| format!("feature_{j}"));
        let highest = argmin(column.mapv(|v| -v).view());
        let lowest = argmin(column);
        names[highest].push_str(&format!("highest {feature}, "));
        names[lowest].push_str(&format!("lowest {feature}, "));
    }
    names
}

/// Insert predefined centroid names after the index of each cluster name.
///
/// Only applied when the counts match; a method that chose its own cluster
/// count leaves the names untouched.
pub fn splice_predefined_names<'a>(
    names: &mut [String],
    predefined: impl ExactSizeIterator<Item = &'a str>,
) {
    if predefined.len() != names.len() {
        return;
    }
    for (name, key) in names.iter_mut().zip(predefined) {
        let description = name
            .split_once(": ")
            .map(|(_, rest)| rest.to_string())
            .unwrap_or_default();
        let index = name.split(':').next().unwrap_or_default().to_string();
        *name = format!("{index}: {}, {description}", key.to_uppercase());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_extremes_named() {
        let centers = array![[0.0, 5.0], [10.0, 1.0], [3.0, 9.0]];
        let features = vec!["speed".to_string(), "load".to_string()];
        let names = cluster_names(centers.view(), &features);
        assert_eq!(
            names,
            vec![
                "0: lowest speed, ",
                "1: highest speed, lowest load, ",
                "2: highest load, ",
            ]
        );
    }

    #[test]
    fn test_missing_feature_names() {
        let centers = array![[1.0], [2.0]];
        let names = cluster_names(centers.view(), &[]);
        assert_eq!(names, vec!["0: lowest feature_0, ", "1: highest feature_0, "]);
    }

    #[test]
    fn test_splice_only_on_matching_count() {
        let mut names = vec!["0: lowest x, ".to_string(), "1: highest x, ".to_string()];
        splice_predefined_names(&mut names, ["idle", "press"].into_iter());
        assert_eq!(names, vec!["0: IDLE, lowest x, ", "1: PRESS, highest x, "]);

        let mut names = vec!["0: lowest x, ".to_string()];
        splice_predefined_names(&mut names, ["idle", "press"].into_iter());
        assert_eq!(names, vec!["0: lowest x, "]);
    }
}
