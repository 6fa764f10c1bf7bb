//! Persisted model bundle: catalog, feature table, scaler, neighbor index and
//! the optional text index, plus the loader that finds and validates it.

mod neighbors;
mod scaler;
mod text;

pub use neighbors::{DistanceMetric, Neighbor, NeighborIndex};
pub use scaler::FeatureScaler;
pub use text::{SparseMatrix, SparseVector, TermNorm, TextIndex, TextVectorizer};

use std::{fmt, path::Path};

use common::error::AppError;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, error, info, warn};

/// Position of a book in the catalog and in every table aligned with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RowIndex(usize);

impl RowIndex {
    pub const fn new(position: usize) -> Self {
        Self(position)
    }

    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for RowIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub title: String,
    pub authors: String,
    #[serde(default)]
    pub language_code: String,
    #[serde(deserialize_with = "nullable_rating")]
    pub average_rating: f64,
    #[serde(default, deserialize_with = "whole_count")]
    pub ratings_count: u64,
}

fn nullable_rating<'de, D>(de: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(de)?.unwrap_or(f64::NAN))
}

/// Accepts integral counts stored as floats (`1234.0`) and truncates them.
/// A missing count reads as zero.
fn whole_count<'de, D>(de: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Whole(u64),
        Float(f64),
    }

    match Option::<Count>::deserialize(de)? {
        None => Ok(0),
        Some(Count::Whole(count)) => Ok(count),
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Some(Count::Float(count)) if count.is_finite() && count >= 0.0 => {
            Ok(count.trunc() as u64)
        }
        Some(Count::Float(count)) => Err(serde::de::Error::custom(format!(
            "ratings_count must be a non-negative number, got {count}"
        ))),
    }
}

/// Numeric feature rows, aligned 1:1 with the catalog.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    rows: Vec<Vec<f64>>,
}

impl FeatureTable {
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self, AppError> {
        if let Some(width) = rows.first().map(Vec::len) {
            if let Some(position) = rows.iter().position(|row| row.len() != width) {
                return Err(AppError::Artifact(format!(
                    "feature row {position} has a different width than row 0 ({width})"
                )));
            }
        }
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, row: RowIndex) -> Option<&[f64]> {
        self.rows.get(row.get()).map(Vec::as_slice)
    }
}

/// Immutable, fully validated model state shared by every request.
#[derive(Debug, Clone)]
pub struct ModelBundle {
    catalog: Vec<BookRecord>,
    features: Option<FeatureTable>,
    scaler: FeatureScaler,
    neighbor_index: NeighborIndex,
    text_index: Option<TextIndex>,
}

impl ModelBundle {
    /// Assembles a bundle, enforcing that every parallel table has one row per book.
    pub fn new(
        catalog: Vec<BookRecord>,
        features: Option<FeatureTable>,
        scaler: FeatureScaler,
        neighbor_index: NeighborIndex,
        text_index: Option<TextIndex>,
    ) -> Result<Self, AppError> {
        let books = catalog.len();
        scaler.validate()?;
        neighbor_index.validate()?;

        if neighbor_index.len() != books {
            return Err(AppError::Artifact(format!(
                "neighbor index holds {} samples for {books} books",
                neighbor_index.len()
            )));
        }
        if let Some(features) = &features {
            if features.len() != books {
                return Err(AppError::Artifact(format!(
                    "feature table has {} rows for {books} books",
                    features.len()
                )));
            }
        }
        if let Some(text_index) = &text_index {
            if text_index.rows() != books {
                return Err(AppError::Artifact(format!(
                    "text matrix has {} rows for {books} books",
                    text_index.rows()
                )));
            }
        }

        Ok(Self {
            catalog,
            features,
            scaler,
            neighbor_index,
            text_index,
        })
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    pub fn book(&self, row: RowIndex) -> Option<&BookRecord> {
        self.catalog.get(row.get())
    }

    /// Catalog rows in order, with their positions.
    pub fn books(&self) -> impl Iterator<Item = (RowIndex, &BookRecord)> {
        self.catalog
            .iter()
            .enumerate()
            .map(|(position, book)| (RowIndex::new(position), book))
    }

    pub const fn features(&self) -> Option<&FeatureTable> {
        self.features.as_ref()
    }

    pub const fn scaler(&self) -> &FeatureScaler {
        &self.scaler
    }

    pub const fn neighbor_index(&self) -> &NeighborIndex {
        &self.neighbor_index
    }

    pub const fn text_index(&self) -> Option<&TextIndex> {
        self.text_index.as_ref()
    }
}

/// On-disk shape of an artifact. Every key is optional here so that a missing
/// component is reported as such rather than as a decoding failure.
#[derive(Debug, Deserialize)]
struct RawArtifact {
    knn_model: Option<NeighborIndex>,
    scaler: Option<FeatureScaler>,
    books_data: Option<Vec<BookRecord>>,
    features: Option<Vec<Vec<f64>>>,
    tfidf: Option<TextVectorizer>,
    tfidf_matrix: Option<SparseMatrix>,
}

impl RawArtifact {
    fn into_bundle(self) -> Result<ModelBundle, AppError> {
        let missing: Vec<&str> = [
            ("knn_model", self.knn_model.is_none()),
            ("scaler", self.scaler.is_none()),
            ("books_data", self.books_data.is_none()),
        ]
        .into_iter()
        .filter_map(|(key, absent)| absent.then_some(key))
        .collect();

        let (Some(neighbor_index), Some(scaler), Some(catalog)) =
            (self.knn_model, self.scaler, self.books_data)
        else {
            return Err(AppError::Artifact(format!(
                "missing required components: {}",
                missing.join(", ")
            )));
        };

        let features = self.features.map(FeatureTable::new).transpose()?;
        let text_index = match (self.tfidf, self.tfidf_matrix) {
            (Some(vectorizer), Some(matrix)) => Some(TextIndex::new(vectorizer, matrix)?),
            _ => None,
        };

        ModelBundle::new(catalog, features, scaler, neighbor_index, text_index)
    }
}

fn read_artifact(path: &Path) -> Result<RawArtifact, AppError> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Tries each candidate location in order and returns the first artifact that
/// decodes and validates. Candidates that do not exist are skipped silently.
pub fn load_bundle<P: AsRef<Path>>(candidates: &[P]) -> Result<ModelBundle, AppError> {
    for candidate in candidates {
        let path = candidate.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "Model artifact not present");
            continue;
        }

        match read_artifact(path) {
            Ok(raw) => match raw.into_bundle() {
                Ok(bundle) => {
                    info!(
                        path = %path.display(),
                        books = bundle.len(),
                        text_search = bundle.text_index().is_some(),
                        "Model loaded"
                    );
                    return Ok(bundle);
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Model artifact is structurally invalid");
                }
            },
            Err(err) => {
                error!(path = %path.display(), error = %err, "Could not load model artifact");
            }
        }
    }

    error!("No valid model found");
    Err(AppError::Configuration(
        "no valid model artifact found".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_artifact_json, sample_bundle};
    use serde_json::json;

    fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).expect("write artifact");
        path
    }

    #[test]
    fn book_record_coerces_float_counts() {
        let book: BookRecord = serde_json::from_value(json!({
            "title": "Dune",
            "authors": "Frank Herbert",
            "language_code": "en",
            "average_rating": 4.25,
            "ratings_count": 2500.0
        }))
        .expect("book json");
        assert_eq!(book.ratings_count, 2500);

        let negative = serde_json::from_value::<BookRecord>(json!({
            "title": "Dune",
            "authors": "Frank Herbert",
            "average_rating": 4.25,
            "ratings_count": -3.0
        }));
        assert!(negative.is_err());
    }

    #[test]
    fn missing_counts_read_as_zero() {
        let books: Vec<BookRecord> = serde_json::from_value(json!([
            {"title": "Dune", "authors": "Frank Herbert", "average_rating": 4.25, "ratings_count": null},
            {"title": "Emma", "authors": "Jane Austen", "average_rating": 4.0}
        ]))
        .expect("catalog with gaps");
        assert!(books.iter().all(|book| book.ratings_count == 0));
    }

    #[test]
    fn catalog_with_a_null_count_still_loads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut artifact = sample_artifact_json(false);
        artifact["books_data"][9]["ratings_count"] = serde_json::Value::Null;
        let path = write(dir.path(), "model.json", &artifact.to_string());

        let bundle = load_bundle(&[path]).expect("bundle loads");
        assert_eq!(bundle.book(RowIndex::new(9)).expect("row").ratings_count, 0);
    }

    #[test]
    fn bundle_rejects_misaligned_tables() {
        let bundle = sample_bundle(false);
        let mut catalog: Vec<BookRecord> = bundle.books().map(|(_, b)| b.clone()).collect();
        catalog.pop();

        let err = ModelBundle::new(
            catalog,
            None,
            bundle.scaler().clone(),
            bundle.neighbor_index().clone(),
            None,
        )
        .expect_err("misaligned");
        assert!(matches!(err, AppError::Artifact(_)));
    }

    #[test]
    fn loads_first_valid_candidate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("absent.json");
        let garbage = write(dir.path(), "garbage.json", "not json at all");
        let incomplete = write(
            dir.path(),
            "incomplete.json",
            &json!({ "books_data": [], "scaler": {"kind": "standard", "mean": [], "scale": []} })
                .to_string(),
        );
        let valid = write(dir.path(), "valid.json", &sample_artifact_json(true).to_string());

        let bundle =
            load_bundle(&[missing, garbage, incomplete, valid]).expect("valid bundle found");
        assert_eq!(bundle.len(), sample_bundle(true).len());
        assert!(bundle.text_index().is_some());
    }

    #[test]
    fn text_keys_are_only_used_as_a_pair() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut artifact = sample_artifact_json(true);
        artifact
            .as_object_mut()
            .expect("artifact object")
            .remove("tfidf_matrix");
        let path = write(dir.path(), "model.json", &artifact.to_string());

        let bundle = load_bundle(&[path]).expect("bundle");
        assert!(bundle.text_index().is_none());
    }

    #[test]
    fn misaligned_artifact_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut artifact = sample_artifact_json(false);
        artifact["features"]
            .as_array_mut()
            .expect("features array")
            .pop();
        let path = write(dir.path(), "model.json", &artifact.to_string());

        let err = load_bundle(&[path]).expect_err("misaligned artifact");
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn no_candidates_is_a_configuration_error() {
        let err = load_bundle::<&str>(&[]).expect_err("nothing to load");
        assert!(matches!(err, AppError::Configuration(_)));
    }
}
