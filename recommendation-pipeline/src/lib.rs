pub mod artifact;
pub mod expansion;
pub mod filter;
pub mod pipeline;
pub mod search;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

use std::sync::Arc;

use common::error::AppError;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, instrument};

use artifact::{BookRecord, ModelBundle, RowIndex};
use filter::CandidateFilter;

pub use pipeline::{PipelineStageTimings, RecommendationTuning, StageKind};

/// Result of a stage that produces candidate rows. Failures are kept apart
/// from genuine empty results so callers can log them before moving on.
#[derive(Debug)]
pub enum StageOutcome {
    Found(Vec<RowIndex>),
    Empty,
    Failed(AppError),
}

impl StageOutcome {
    pub fn from_rows(rows: Vec<RowIndex>) -> Self {
        if rows.is_empty() {
            Self::Empty
        } else {
            Self::Found(rows)
        }
    }

    pub fn from_result(result: Result<Vec<RowIndex>, AppError>) -> Self {
        match result {
            Ok(rows) => Self::from_rows(rows),
            Err(err) => Self::Failed(err),
        }
    }

    /// The rows found; failures read as an empty candidate set.
    pub fn into_rows(self) -> Vec<RowIndex> {
        match self {
            Self::Found(rows) => rows,
            Self::Empty | Self::Failed(_) => Vec::new(),
        }
    }
}

/// Output-shaped projection of a catalog row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub authors: String,
    pub average_rating: f64,
    pub ratings_count: u64,
}

impl From<&BookRecord> for Recommendation {
    fn from(book: &BookRecord) -> Self {
        Self {
            title: book.title.clone(),
            authors: book.authors.clone(),
            average_rating: round_to_tenth(book.average_rating),
            ratings_count: book.ratings_count,
        }
    }
}

/// Rounds to one decimal the way the decimal representation would: ties go
/// to the even digit and `4.35` (stored as 4.3499..) rounds down.
fn round_to_tenth(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{value:.1}").parse().unwrap_or(value)
}

/// Inbound recommendation request, shared by the form and JSON surfaces.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RecommendationRequest {
    #[serde(default)]
    pub book_title: String,
    #[serde(default)]
    pub language: Option<String>,
    /// Kept as text; JSON clients may also send a number.
    #[serde(default, deserialize_with = "rating_text")]
    pub min_rating: Option<String>,
}

fn rating_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RatingInput {
        Text(String),
        Number(f64),
    }

    Ok(
        Option::<RatingInput>::deserialize(deserializer)?.map(|input| match input {
            RatingInput::Text(text) => text,
            RatingInput::Number(value) => value.to_string(),
        }),
    )
}

impl RecommendationRequest {
    pub fn new(book_title: impl Into<String>) -> Self {
        Self {
            book_title: book_title.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    #[must_use]
    pub fn with_min_rating(mut self, min_rating: impl Into<String>) -> Self {
        self.min_rating = Some(min_rating.into());
        self
    }
}

/// Entry point for recommendations. Holds the bundle loaded at startup, if
/// any; without one every request is rejected as a configuration problem.
#[derive(Debug, Clone)]
pub struct Recommender {
    bundle: Option<Arc<ModelBundle>>,
    tuning: RecommendationTuning,
}

impl Recommender {
    pub fn new(bundle: Option<Arc<ModelBundle>>, tuning: RecommendationTuning) -> Self {
        Self { bundle, tuning }
    }

    pub fn with_bundle(bundle: ModelBundle) -> Self {
        Self::new(Some(Arc::new(bundle)), RecommendationTuning::default())
    }

    pub fn unloaded() -> Self {
        Self::new(None, RecommendationTuning::default())
    }

    pub fn bundle(&self) -> Option<&ModelBundle> {
        self.bundle.as_deref()
    }

    pub fn is_ready(&self) -> bool {
        self.bundle.is_some()
    }

    #[instrument(skip_all)]
    pub fn recommend(
        &self,
        request: &RecommendationRequest,
    ) -> Result<Vec<Recommendation>, AppError> {
        let Some(bundle) = self.bundle.as_deref() else {
            return Err(AppError::Configuration(
                "model bundle is not loaded".to_string(),
            ));
        };

        let query = request.book_title.trim();
        if query.is_empty() {
            return Err(AppError::Validation(
                "Please enter a book title or author name.".to_string(),
            ));
        }

        let filter = CandidateFilter::new(request.language.as_deref(), request.min_rating.as_deref());
        info!(
            query_chars = query.chars().count(),
            language = filter.language(),
            min_rating = filter.min_rating(),
            "Starting recommendation pipeline"
        );

        let run = pipeline::run_pipeline(bundle, query, filter, &self.tuning)?;
        Ok(run.recommendations)
    }

    /// Runs [`Recommender::recommend`] on the blocking pool. A panic inside the
    /// pipeline surfaces as [`AppError::Join`].
    pub async fn recommend_async(
        self: Arc<Self>,
        request: RecommendationRequest,
    ) -> Result<Vec<Recommendation>, AppError> {
        tokio::task::spawn_blocking(move || self.recommend(&request)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_bundle;
    use common::error::EmptyStage;

    fn has_one_decimal(value: f64) -> bool {
        ((value * 10.0).round() - value * 10.0).abs() < 1e-9
    }

    #[test]
    fn harry_potter_without_filters() {
        for with_text in [false, true] {
            let recommender = Recommender::with_bundle(sample_bundle(with_text));
            let recs = recommender
                .recommend(&RecommendationRequest::new("Harry Potter"))
                .expect("recommendations");

            assert!(!recs.is_empty());
            assert!(recs.len() <= 8);
            for rec in &recs {
                assert!(has_one_decimal(rec.average_rating), "{}", rec.average_rating);
            }
            let first = &recs[0];
            assert!(first.title.contains("Harry Potter"));
        }
    }

    #[test]
    fn ratings_are_rounded_to_one_decimal() {
        let recommender = Recommender::with_bundle(sample_bundle(false));
        let recs = recommender
            .recommend(&RecommendationRequest::new("Philosopher"))
            .expect("recommendations");
        assert_eq!(recs[0].title, "Harry Potter and the Philosopher's Stone");
        assert!((recs[0].average_rating - 4.5).abs() < f64::EPSILON);
        assert_eq!(recs[0].ratings_count, 6267);
    }

    #[test]
    fn rounding_follows_the_decimal_value() {
        for (raw, expected) in [(4.35, 4.3), (4.25, 4.2), (3.65, 3.6), (4.15, 4.2), (4.47, 4.5)] {
            let rounded = round_to_tenth(raw);
            assert!((rounded - expected).abs() < 1e-12, "{raw} -> {rounded}, expected {expected}");
        }
        assert!(round_to_tenth(f64::NAN).is_nan());
    }

    #[test]
    fn blank_query_is_rejected() {
        let recommender = Recommender::with_bundle(sample_bundle(false));
        for query in ["", "   "] {
            let err = recommender
                .recommend(&RecommendationRequest::new(query))
                .expect_err("validation");
            assert!(matches!(err, AppError::Validation(_)));
            assert_eq!(err.user_message(), "Please enter a book title or author name.");
        }
    }

    #[test]
    fn language_mismatch_is_rejected_at_the_filter() {
        for with_text in [false, true] {
            let recommender = Recommender::with_bundle(sample_bundle(with_text));
            let err = recommender
                .recommend(&RecommendationRequest::new("Petit Prince").with_language("en"))
                .expect_err("no english match");
            assert!(matches!(err, AppError::NoResults(EmptyStage::Filter)));
            assert!(err.user_message().contains("No books match your criteria"));
        }
    }

    #[test]
    fn missing_bundle_is_a_configuration_error() {
        let recommender = Recommender::unloaded();
        assert!(!recommender.is_ready());
        let err = recommender
            .recommend(&RecommendationRequest::new("Harry Potter"))
            .expect_err("configuration");
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn unparseable_rating_is_ignored() {
        let recommender = Recommender::with_bundle(sample_bundle(false));
        let unfiltered = recommender
            .recommend(&RecommendationRequest::new("Harry Potter"))
            .expect("recommendations");
        let ignored = recommender
            .recommend(&RecommendationRequest::new("Harry Potter").with_min_rating("high"))
            .expect("recommendations");
        assert_eq!(unfiltered, ignored);
    }

    #[test]
    fn min_rating_accepts_text_or_number() {
        let text: RecommendationRequest =
            serde_json::from_str(r#"{"book_title":"Dune","min_rating":"4.2"}"#).expect("text");
        assert_eq!(text.min_rating.as_deref(), Some("4.2"));

        let number: RecommendationRequest =
            serde_json::from_str(r#"{"book_title":"Dune","min_rating":4.5}"#).expect("number");
        assert_eq!(number.min_rating.as_deref(), Some("4.5"));

        let absent: RecommendationRequest =
            serde_json::from_str(r#"{"book_title":"Dune"}"#).expect("absent");
        assert!(absent.min_rating.is_none());
    }

    #[tokio::test]
    async fn recommend_async_runs_on_the_blocking_pool() {
        let recommender = Arc::new(Recommender::with_bundle(sample_bundle(true)));
        let recs = recommender
            .recommend_async(RecommendationRequest::new("tolkien"))
            .await
            .expect("recommendations");
        assert!(recs.iter().any(|rec| rec.title == "The Hobbit"));
    }
}
