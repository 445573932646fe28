use crate::vectorize::{FeatureMatrix, Vocabulary};

/// Terms with the highest mean weight over the rows labelled `group`.
///
/// Only strictly positive means qualify. Equal means rank the lower column
/// first, so the result does not depend on sort stability.
pub fn top_keywords(
    matrix: &FeatureMatrix,
    vocabulary: &Vocabulary,
    labels: &[usize],
    group: usize,
    top_n: usize,
) -> Vec<String> {
    ranked_columns(matrix, labels, group, top_n)
        .into_iter()
        .filter_map(|(col, _)| vocabulary.term(col).map(str::to_string))
        .collect()
}

/// `(column, mean weight)` pairs in rank order.
pub fn ranked_columns(
    matrix: &FeatureMatrix,
    labels: &[usize],
    group: usize,
    top_n: usize,
) -> Vec<(usize, f64)> {
    let members: Vec<usize> = labels
        .iter()
        .enumerate()
        .filter(|(idx, &label)| label == group && *idx < matrix.n_rows())
        .map(|(idx, _)| idx)
        .collect();
    if members.is_empty() || top_n == 0 {
        return Vec::new();
    }
    let mut sums = vec![0.0f64; matrix.n_cols()];
    for &idx in &members {
        for &(col, weight) in matrix.row(idx) {
            sums[col] += weight;
        }
    }
    let count = members.len() as f64;
    let mut ranked: Vec<(usize, f64)> = sums
        .into_iter()
        .enumerate()
        .map(|(col, sum)| (col, sum / count))
        .filter(|&(_, mean)| mean > 0.0)
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(top_n);
    ranked
}
