use common::error::AppError;
use tracing::warn;

use crate::artifact::{BookRecord, ModelBundle, RowIndex};

/// Request-level predicates. Both are optional and combine as AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateFilter {
    language: Option<String>,
    min_rating: Option<String>,
}

impl CandidateFilter {
    /// Empty strings mean "not set", matching how the form submits blank fields.
    pub fn new(language: Option<&str>, min_rating: Option<&str>) -> Self {
        let non_empty = |value: Option<&str>| value.filter(|v| !v.is_empty()).map(str::to_owned);
        Self {
            language: non_empty(language),
            min_rating: non_empty(min_rating),
        }
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn min_rating(&self) -> Option<&str> {
        self.min_rating.as_deref()
    }

    pub const fn is_empty(&self) -> bool {
        self.language.is_none() && self.min_rating.is_none()
    }

    /// Keeps the rows whose book satisfies every predicate, in input order.
    ///
    /// A minimum rating that does not parse as a number disables filtering for
    /// this call: the input comes back unchanged.
    pub fn apply(&self, bundle: &ModelBundle, rows: &[RowIndex]) -> Vec<RowIndex> {
        match self.try_apply(bundle, rows) {
            Ok(kept) => kept,
            Err(err) => {
                warn!(error = %err, "Filter skipped; returning candidates unfiltered");
                rows.to_vec()
            }
        }
    }

    fn try_apply(&self, bundle: &ModelBundle, rows: &[RowIndex]) -> Result<Vec<RowIndex>, AppError> {
        let threshold = self.min_rating.as_deref().map(parse_min_rating).transpose()?;

        Ok(rows
            .iter()
            .copied()
            .filter(|row| {
                bundle
                    .book(*row)
                    .is_some_and(|book| self.matches(book, threshold))
            })
            .collect())
    }

    fn matches(&self, book: &BookRecord, threshold: Option<f64>) -> bool {
        let language_ok = self
            .language
            .as_deref()
            .map_or(true, |language| book.language_code == language);
        let rating_ok = threshold.map_or(true, |minimum| book.average_rating >= minimum);
        language_ok && rating_ok
    }
}

pub fn parse_min_rating(raw: &str) -> Result<f64, AppError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|err| AppError::Validation(format!("invalid minimum rating '{raw}': {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_bundle;

    fn all_rows(bundle: &ModelBundle) -> Vec<RowIndex> {
        bundle.books().map(|(row, _)| row).collect()
    }

    #[test]
    fn blank_fields_are_unset() {
        let filter = CandidateFilter::new(Some(""), Some(""));
        assert!(filter.is_empty());
        assert_eq!(filter, CandidateFilter::default());
    }

    #[test]
    fn language_is_an_exact_match() {
        let bundle = sample_bundle(false);
        let rows = all_rows(&bundle);

        let kept = CandidateFilter::new(Some("en"), None).apply(&bundle, &rows);
        assert!(!kept.is_empty());
        for row in &kept {
            assert_eq!(bundle.book(*row).expect("row").language_code, "en");
        }
        // "eng" and "EN" are different codes
        assert!(!kept.contains(&RowIndex::new(8)));
        assert!(CandidateFilter::new(Some("EN"), None)
            .apply(&bundle, &rows)
            .is_empty());
    }

    #[test]
    fn minimum_rating_is_inclusive() {
        let bundle = sample_bundle(false);
        let rows = all_rows(&bundle);

        let kept = CandidateFilter::new(None, Some("4.41")).apply(&bundle, &rows);
        let positions: Vec<usize> = kept.iter().map(|row| row.get()).collect();
        assert_eq!(positions, vec![0, 1, 2, 8]);

        let kept = CandidateFilter::new(None, Some(" 4.0 ")).apply(&bundle, &rows);
        assert!(!kept.contains(&RowIndex::new(9)));
        assert_eq!(kept.len(), rows.len() - 1);
    }

    #[test]
    fn predicates_combine_as_and() {
        let bundle = sample_bundle(false);
        let rows = all_rows(&bundle);

        let kept = CandidateFilter::new(Some("fr"), Some("4.3")).apply(&bundle, &rows);
        let positions: Vec<usize> = kept.iter().map(|row| row.get()).collect();
        assert_eq!(positions, vec![2, 5]);
    }

    #[test]
    fn unparseable_rating_returns_input_unchanged() {
        let bundle = sample_bundle(false);
        let rows = vec![RowIndex::new(5), RowIndex::new(0), RowIndex::new(9)];

        let filter = CandidateFilter::new(Some("en"), Some("four stars"));
        assert_eq!(filter.apply(&bundle, &rows), rows);
        // idempotent on bad input
        let again = filter.apply(&bundle, &filter.apply(&bundle, &rows));
        assert_eq!(again, rows);
    }

    #[test]
    fn input_is_not_mutated() {
        let bundle = sample_bundle(false);
        let rows = all_rows(&bundle);
        let snapshot = rows.clone();

        let _ = CandidateFilter::new(Some("fr"), None).apply(&bundle, &rows);
        assert_eq!(rows, snapshot);
    }

    #[test]
    fn parse_min_rating_reports_validation_errors() {
        assert!((parse_min_rating("3.5").expect("number") - 3.5).abs() < f64::EPSILON);
        assert!(matches!(
            parse_min_rating("abc"),
            Err(AppError::Validation(_))
        ));
    }
}
