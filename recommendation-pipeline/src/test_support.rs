//! Synthetic catalog and model components for tests in this and downstream crates.

use std::collections::{BTreeSet, HashMap};

use serde_json::{json, Value};

use crate::artifact::{
    BookRecord, DistanceMetric, FeatureScaler, FeatureTable, ModelBundle, NeighborIndex,
    SparseMatrix, TextIndex, TextVectorizer,
};

/// `(title, authors, language_code, average_rating, ratings_count)`
const BOOKS: &[(&str, &str, &str, f64, u64)] = &[
    ("Harry Potter and the Philosopher's Stone", "J.K. Rowling", "en", 4.47, 6267),
    ("Harry Potter and the Chamber of Secrets", "J.K. Rowling", "en", 4.41, 5000),
    ("Harry Potter et la Coupe de Feu", "J.K. Rowling", "fr", 4.56, 900),
    ("The Hobbit", "J.R.R. Tolkien", "en", 4.27, 4000),
    ("The Fellowship of the Ring", "J.R.R. Tolkien", "en", 4.36, 3500),
    ("Le Petit Prince", "Antoine de Saint-Exupéry", "fr", 4.31, 1200),
    ("Les Misérables", "Victor Hugo", "fr", 4.17, 800),
    ("Percy Jackson and the Lightning Thief", "Rick Riordan", "en", 4.25, 3000),
    ("Harry Potter and the Chamber of Secrets", "J.K. Rowling", "eng", 4.41, 5000),
    ("Dune", "Frank Herbert", "en", 3.95, 2500),
];

pub const STOP_WORDS: &[&str] = &["the", "and", "of"];

pub fn sample_catalog() -> Vec<BookRecord> {
    BOOKS
        .iter()
        .map(|(title, authors, language, rating, count)| BookRecord {
            title: (*title).to_string(),
            authors: (*authors).to_string(),
            language_code: (*language).to_string(),
            average_rating: *rating,
            ratings_count: *count,
        })
        .collect()
}

/// Raw features: average rating and ratings count in thousands.
#[allow(clippy::cast_precision_loss)]
pub fn sample_features() -> Vec<Vec<f64>> {
    BOOKS
        .iter()
        .map(|(_, _, _, rating, count)| vec![*rating, *count as f64 / 1000.0])
        .collect()
}

pub fn sample_scaler() -> FeatureScaler {
    FeatureScaler::Standard {
        mean: vec![4.3, 3.0],
        scale: vec![0.1, 2.0],
    }
}

/// Neighbor index fitted on the scaled sample features.
pub fn sample_neighbor_index() -> NeighborIndex {
    let scaler = sample_scaler();
    let samples = sample_features()
        .iter()
        .map(|row| scaler.transform(row).unwrap_or_default())
        .collect();
    NeighborIndex::new(DistanceMetric::Euclidean, samples)
}

/// Fits a smoothed-idf, L2-normalized text index over `title + authors`.
pub fn sample_text_parts() -> (TextVectorizer, SparseMatrix) {
    let documents: Vec<String> = sample_catalog()
        .iter()
        .map(|book| format!("{} {}", book.title, book.authors))
        .collect();

    let analyzer =
        TextVectorizer::new(HashMap::new(), Vec::new()).with_stop_words(STOP_WORDS.iter().copied());
    let analyzed: Vec<BTreeSet<String>> = documents
        .iter()
        .map(|doc| analyzer.analyze(doc).into_iter().collect())
        .collect();

    let terms: BTreeSet<&String> = analyzed.iter().flatten().collect();
    let vocabulary: HashMap<String, usize> = terms
        .iter()
        .enumerate()
        .map(|(column, term)| ((*term).clone(), column))
        .collect();

    #[allow(clippy::cast_precision_loss)]
    let n_docs = documents.len() as f64;
    let idf = terms
        .iter()
        .map(|term| {
            #[allow(clippy::cast_precision_loss)]
            let df = analyzed.iter().filter(|doc| doc.contains(*term)).count() as f64;
            ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0
        })
        .collect::<Vec<_>>();
    let columns = idf.len();

    let vectorizer =
        TextVectorizer::new(vocabulary, idf).with_stop_words(STOP_WORDS.iter().copied());
    let rows: Vec<_> = documents
        .iter()
        .map(|doc| vectorizer.transform(doc).unwrap_or_default())
        .collect();

    (vectorizer, SparseMatrix::from_rows(columns, &rows))
}

/// The sample bundle, with or without the fitted text index.
pub fn sample_bundle(with_text_index: bool) -> ModelBundle {
    let text_index = with_text_index.then(|| {
        let (vectorizer, matrix) = sample_text_parts();
        TextIndex::new(vectorizer, matrix).ok()
    });

    ModelBundle::new(
        sample_catalog(),
        FeatureTable::new(sample_features()).ok(),
        sample_scaler(),
        sample_neighbor_index(),
        text_index.flatten(),
    )
    .unwrap_or_else(|err| unreachable!("sample bundle is consistent: {err}"))
}

/// The sample bundle in its on-disk JSON form.
pub fn sample_artifact_json(with_text_index: bool) -> Value {
    let mut artifact = json!({
        "knn_model": sample_neighbor_index(),
        "scaler": sample_scaler(),
        "books_data": sample_catalog(),
        "features": sample_features(),
    });
    if with_text_index {
        let (vectorizer, matrix) = sample_text_parts();
        artifact["tfidf"] = json!(vectorizer);
        artifact["tfidf_matrix"] = json!(matrix);
    }
    artifact
}
