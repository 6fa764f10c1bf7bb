use std::collections::{BTreeMap, HashMap, HashSet};

use common::error::AppError;
use serde::{Deserialize, Serialize};

/// Sparse vector as `(column, weight)` pairs sorted by column.
pub type SparseVector = Vec<(usize, f64)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermNorm {
    L1,
    L2,
}

/// Fitted term-frequency / inverse-document-frequency weighting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    #[serde(default = "default_lowercase")]
    lowercase: bool,
    #[serde(default = "default_ngram_range")]
    ngram_range: (usize, usize),
    #[serde(default)]
    sublinear_tf: bool,
    #[serde(default = "default_norm")]
    norm: Option<TermNorm>,
    #[serde(default)]
    stop_words: HashSet<String>,
}

const fn default_lowercase() -> bool {
    true
}

const fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

#[allow(clippy::unnecessary_wraps)]
const fn default_norm() -> Option<TermNorm> {
    Some(TermNorm::L2)
}

impl TextVectorizer {
    pub fn new(vocabulary: HashMap<String, usize>, idf: Vec<f64>) -> Self {
        Self {
            vocabulary,
            idf,
            lowercase: default_lowercase(),
            ngram_range: default_ngram_range(),
            sublinear_tf: false,
            norm: default_norm(),
            stop_words: HashSet::new(),
        }
    }

    #[must_use]
    pub fn with_ngram_range(mut self, min_n: usize, max_n: usize) -> Self {
        let min_n = min_n.max(1);
        self.ngram_range = (min_n, max_n.max(min_n));
        self
    }

    #[must_use]
    pub fn with_stop_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop_words = words.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn with_sublinear_tf(mut self, enabled: bool) -> Self {
        self.sublinear_tf = enabled;
        self
    }

    pub fn dimension(&self) -> usize {
        self.idf.len()
    }

    pub(crate) fn validate(&self) -> Result<(), AppError> {
        if let Some((term, column)) = self
            .vocabulary
            .iter()
            .find(|(_, column)| **column >= self.idf.len())
        {
            return Err(AppError::Artifact(format!(
                "vocabulary term '{term}' maps to column {column} beyond {} idf weights",
                self.idf.len()
            )));
        }
        Ok(())
    }

    /// Splits text into the terms the vectorizer counts: runs of two or more
    /// word characters, minus stop words, expanded to the fitted n-gram range.
    pub fn analyze(&self, text: &str) -> Vec<String> {
        let text = if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_owned()
        };

        let tokens: Vec<&str> = text
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|token| token.chars().nth(1).is_some())
            .filter(|token| !self.stop_words.contains(*token))
            .collect();

        let (min_n, max_n) = self.ngram_range;
        let mut terms = Vec::new();
        for n in min_n.max(1)..=max_n {
            terms.extend(tokens.windows(n).map(|window| window.join(" ")));
        }
        terms
    }

    /// Projects `text` into the fitted space. Unknown terms are ignored.
    pub fn transform(&self, text: &str) -> Result<SparseVector, AppError> {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for term in self.analyze(text) {
            if let Some(column) = self.vocabulary.get(&term) {
                *counts.entry(*column).or_insert(0.0) += 1.0;
            }
        }

        let mut weights = SparseVector::with_capacity(counts.len());
        for (column, count) in counts {
            let idf = self.idf.get(column).copied().ok_or_else(|| {
                AppError::Computation(format!("no idf weight for column {column}"))
            })?;
            let tf = if self.sublinear_tf {
                1.0 + count.ln()
            } else {
                count
            };
            weights.push((column, tf * idf));
        }

        if let Some(norm) = self.norm {
            let length = match norm {
                TermNorm::L1 => weights.iter().map(|(_, w)| w.abs()).sum::<f64>(),
                TermNorm::L2 => weights.iter().map(|(_, w)| w * w).sum::<f64>().sqrt(),
            };
            if length > 0.0 {
                for (_, weight) in &mut weights {
                    *weight /= length;
                }
            }
        }

        Ok(weights)
    }
}

/// Compressed sparse row matrix, one row per catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparseMatrix {
    shape: (usize, usize),
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
}

impl SparseMatrix {
    pub fn from_rows(columns: usize, rows: &[SparseVector]) -> Self {
        let mut indptr = Vec::with_capacity(rows.len().saturating_add(1));
        let mut indices = Vec::new();
        let mut data = Vec::new();
        indptr.push(0);
        for row in rows {
            for (column, value) in row {
                indices.push(*column);
                data.push(*value);
            }
            indptr.push(indices.len());
        }
        Self {
            shape: (rows.len(), columns),
            indptr,
            indices,
            data,
        }
    }

    pub const fn rows(&self) -> usize {
        self.shape.0
    }

    pub const fn columns(&self) -> usize {
        self.shape.1
    }

    pub(crate) fn validate(&self) -> Result<(), AppError> {
        let (rows, columns) = self.shape;
        if self.indptr.len() != rows.saturating_add(1) {
            return Err(AppError::Artifact(format!(
                "matrix has {rows} rows but {} row pointers",
                self.indptr.len()
            )));
        }
        if self.indptr.first().copied() != Some(0)
            || self.indptr.windows(2).any(|pair| pair[0] > pair[1])
        {
            return Err(AppError::Artifact(
                "matrix row pointers must start at zero and never decrease".to_string(),
            ));
        }
        if self.indptr.last().copied() != Some(self.indices.len())
            || self.indices.len() != self.data.len()
        {
            return Err(AppError::Artifact(format!(
                "matrix stores {} indices and {} values, row pointers end at {:?}",
                self.indices.len(),
                self.data.len(),
                self.indptr.last()
            )));
        }
        if let Some(column) = self.indices.iter().find(|column| **column >= columns) {
            return Err(AppError::Artifact(format!(
                "matrix column {column} is outside its {columns} columns"
            )));
        }
        Ok(())
    }

    fn row(&self, row: usize) -> Option<(&[usize], &[f64])> {
        let start = *self.indptr.get(row)?;
        let end = *self.indptr.get(row.checked_add(1)?)?;
        Some((self.indices.get(start..end)?, self.data.get(start..end)?))
    }

    /// Cosine similarity between `query` and every row, in row order.
    pub fn cosine_similarities(&self, query: &[(usize, f64)]) -> Vec<f64> {
        let mut dense = vec![0.0; self.columns()];
        for (column, weight) in query {
            if let Some(slot) = dense.get_mut(*column) {
                *slot = *weight;
            }
        }
        let query_norm = dense.iter().map(|w| w * w).sum::<f64>().sqrt();

        (0..self.rows())
            .map(|row| {
                let Some((indices, values)) = self.row(row) else {
                    return 0.0;
                };
                let mut dot = 0.0;
                let mut row_norm = 0.0;
                for (column, value) in indices.iter().zip(values) {
                    dot += value * dense.get(*column).copied().unwrap_or(0.0);
                    row_norm += value * value;
                }
                let row_norm: f64 = f64::sqrt(row_norm);
                if query_norm <= 0.0 || row_norm <= 0.0 {
                    0.0
                } else {
                    dot / (query_norm * row_norm)
                }
            })
            .collect()
    }
}

/// Fitted vectorizer paired with the catalog's document matrix.
#[derive(Debug, Clone)]
pub struct TextIndex {
    vectorizer: TextVectorizer,
    matrix: SparseMatrix,
}

impl TextIndex {
    pub fn new(vectorizer: TextVectorizer, matrix: SparseMatrix) -> Result<Self, AppError> {
        vectorizer.validate()?;
        matrix.validate()?;
        if vectorizer.dimension() != matrix.columns() {
            return Err(AppError::Artifact(format!(
                "vectorizer has {} terms but matrix has {} columns",
                vectorizer.dimension(),
                matrix.columns()
            )));
        }
        Ok(Self { vectorizer, matrix })
    }

    pub const fn rows(&self) -> usize {
        self.matrix.rows()
    }

    /// Similarity of `query` to every catalog row, in row order.
    pub fn similarities(&self, query: &str) -> Result<Vec<f64>, AppError> {
        let vector = self.vectorizer.transform(query)?;
        Ok(self.matrix.cosine_similarities(&vector))
    }
}
