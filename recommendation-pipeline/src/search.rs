use common::error::AppError;

use crate::{
    artifact::{ModelBundle, RowIndex, TextIndex},
    StageOutcome,
};

/// A catalog row with its text similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredRow {
    pub row: RowIndex,
    pub score: f64,
}

/// Finds up to `top_k` catalog rows for `query`.
///
/// Ranks by text similarity when the bundle carries a fitted text index and
/// falls back to substring matching on title and authors otherwise.
pub fn search_books(bundle: &ModelBundle, query: &str, top_k: usize) -> StageOutcome {
    let result = match bundle.text_index() {
        Some(index) => rank_by_similarity(index, query, top_k)
            .map(|scored| scored.into_iter().map(|hit| hit.row).collect()),
        None => Ok(substring_matches(bundle, query, top_k)),
    };
    StageOutcome::from_result(result)
}

/// Rows with positive similarity, best first. Equal scores keep catalog order.
pub fn rank_by_similarity(
    index: &TextIndex,
    query: &str,
    top_k: usize,
) -> Result<Vec<ScoredRow>, AppError> {
    let mut scored: Vec<ScoredRow> = index
        .similarities(query)?
        .into_iter()
        .enumerate()
        .filter(|(_, score)| *score > 0.0)
        .map(|(position, score)| ScoredRow {
            row: RowIndex::new(position),
            score,
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_k);
    Ok(scored)
}

/// Case-insensitive substring match against title or authors, in catalog order.
pub fn substring_matches(bundle: &ModelBundle, query: &str, top_k: usize) -> Vec<RowIndex> {
    let needle = query.to_lowercase();
    bundle
        .books()
        .filter(|(_, book)| {
            book.title.to_lowercase().contains(&needle)
                || book.authors.to_lowercase().contains(&needle)
        })
        .map(|(row, _)| row)
        .take(top_k)
        .collect()
}
