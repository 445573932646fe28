use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{NotefoldError, Result};
use crate::normalization::terms;

/// Sparse row-major term-weight matrix. Each row holds `(column, weight)`
/// pairs sorted by column.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    rows: Vec<Vec<(usize, f64)>>,
    n_cols: usize,
}

impl FeatureMatrix {
    /// Builds a matrix, rejecting out-of-range columns, unsorted rows and
    /// non-finite weights.
    pub fn from_rows(rows: Vec<Vec<(usize, f64)>>, n_cols: usize) -> Result<Self> {
        let matrix = Self { rows, n_cols };
        matrix.check()?;
        Ok(matrix)
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn row(&self, idx: usize) -> &[(usize, f64)] {
        &self.rows[idx]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[(usize, f64)]> {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn dense_row(&self, idx: usize) -> Vec<f64> {
        let mut dense = vec![0.0; self.n_cols];
        for &(col, weight) in &self.rows[idx] {
            dense[col] = weight;
        }
        dense
    }

    pub(crate) fn check(&self) -> Result<()> {
        for (idx, row) in self.rows.iter().enumerate() {
            let mut prev: Option<usize> = None;
            for &(col, weight) in row {
                if col >= self.n_cols {
                    return Err(NotefoldError::Internal(format!(
                        "row {idx} references column {col} of {}",
                        self.n_cols
                    )));
                }
                if prev.is_some_and(|p| p >= col) {
                    return Err(NotefoldError::Internal(format!(
                        "row {idx} columns are not strictly increasing"
                    )));
                }
                if !weight.is_finite() {
                    return Err(NotefoldError::Internal(format!(
                        "row {idx} column {col} has non-finite weight"
                    )));
                }
                prev = Some(col);
            }
        }
        Ok(())
    }
}

/// Column index → term, lexically ordered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    terms: Vec<String>,
}

impl Vocabulary {
    pub fn new(terms: Vec<String>) -> Self {
        Self { terms }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn term(&self, col: usize) -> Option<&str> {
        self.terms.get(col).map(String::as_str)
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }
}

#[derive(Debug, Clone)]
pub struct Features {
    pub matrix: FeatureMatrix,
    pub vocabulary: Vocabulary,
}

/// Unigram + bigram TF-IDF with smoothed idf and L2-normalised rows. The
/// vocabulary is fitted on every call; nothing is kept between batches.
#[derive(Debug, Clone, Copy)]
pub struct TfidfVectorizer {
    max_features: usize,
}

impl TfidfVectorizer {
    pub fn new(max_features: usize) -> Self {
        Self {
            max_features: max_features.max(1),
        }
    }

    pub fn fit_transform<S: AsRef<str>>(&self, texts: &[S]) -> Result<Features> {
        if texts.is_empty() {
            return Err(NotefoldError::Input("cannot vectorize an empty batch"));
        }
        let counts: Vec<FxHashMap<String, u32>> = texts
            .iter()
            .map(|text| {
                let mut counts = FxHashMap::default();
                for term in terms(text.as_ref()) {
                    *counts.entry(term).or_insert(0u32) += 1;
                }
                counts
            })
            .collect();

        let mut corpus_freq: FxHashMap<&str, (u64, u32)> = FxHashMap::default();
        for doc in &counts {
            for (term, &count) in doc {
                let entry = corpus_freq.entry(term.as_str()).or_insert((0, 0));
                entry.0 += u64::from(count);
                entry.1 += 1;
            }
        }

        let mut ranked: Vec<(&str, u64, u32)> = corpus_freq
            .into_iter()
            .map(|(term, (total, df))| (term, total, df))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(self.max_features);
        ranked.sort_by(|a, b| a.0.cmp(b.0));

        let n_docs = texts.len() as f64;
        let idf: Vec<f64> = ranked
            .iter()
            .map(|&(_, _, df)| ((1.0 + n_docs) / (1.0 + f64::from(df))).ln() + 1.0)
            .collect();
        let column: FxHashMap<&str, usize> = ranked
            .iter()
            .enumerate()
            .map(|(col, &(term, _, _))| (term, col))
            .collect();

        let rows = counts
            .iter()
            .map(|doc| {
                let mut row: Vec<(usize, f64)> = doc
                    .iter()
                    .filter_map(|(term, &count)| {
                        column
                            .get(term.as_str())
                            .map(|&col| (col, f64::from(count) * idf[col]))
                    })
                    .collect();
                row.sort_by_key(|&(col, _)| col);
                l2_normalize(&mut row);
                row
            })
            .collect();

        let vocabulary = Vocabulary::new(ranked.iter().map(|&(term, _, _)| term.to_string()).collect());
        let matrix = FeatureMatrix::from_rows(rows, vocabulary.len())?;
        Ok(Features { matrix, vocabulary })
    }
}

fn l2_normalize(row: &mut [(usize, f64)]) {
    let norm = row.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
    if norm == 0.0 {
        return;
    }
    for (_, weight) in row.iter_mut() {
        *weight /= norm;
    }
}
