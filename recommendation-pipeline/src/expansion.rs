use common::error::AppError;

use crate::{
    artifact::{ModelBundle, RowIndex},
    StageOutcome,
};

/// Finds up to `top_k` rows whose scaled features sit closest to `row`,
/// nearest first, never including `row` itself.
pub fn expand_neighbors(bundle: &ModelBundle, row: RowIndex, top_k: usize) -> StageOutcome {
    StageOutcome::from_result(nearest_rows(bundle, row, top_k))
}

fn nearest_rows(
    bundle: &ModelBundle,
    row: RowIndex,
    top_k: usize,
) -> Result<Vec<RowIndex>, AppError> {
    let features = bundle
        .features()
        .ok_or_else(|| AppError::Computation("bundle has no feature table".to_string()))?;
    let vector = features
        .row(row)
        .ok_or_else(|| AppError::Computation(format!("no feature row for {row}")))?;

    let scaled = bundle.scaler().transform(vector)?;
    // The query row is normally its own nearest neighbor, so ask for one extra.
    let neighbors = bundle
        .neighbor_index()
        .kneighbors(&scaled, top_k.saturating_add(1))?;

    Ok(neighbors
        .into_iter()
        .map(|neighbor| neighbor.row)
        .filter(|candidate| *candidate != row)
        .take(top_k)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        artifact::{FeatureTable, ModelBundle},
        test_support::{sample_bundle, sample_catalog, sample_neighbor_index, sample_scaler},
    };

    fn rows(indices: &[usize]) -> Vec<RowIndex> {
        indices.iter().copied().map(RowIndex::new).collect()
    }

    #[test]
    fn returns_nearest_rows_without_the_query_row() {
        let bundle = sample_bundle(false);
        let neighbors = expand_neighbors(&bundle, RowIndex::new(0), 5).into_rows();
        assert_eq!(neighbors, rows(&[1, 8, 4, 3, 7]));
    }

    #[test]
    fn never_exceeds_top_k_or_includes_the_query() {
        let bundle = sample_bundle(false);
        for position in 0..bundle.len() {
            let row = RowIndex::new(position);
            for top_k in [0, 1, 3, 20] {
                let neighbors = expand_neighbors(&bundle, row, top_k).into_rows();
                assert!(neighbors.len() <= top_k);
                assert!(!neighbors.contains(&row));
            }
        }
    }

    #[test]
    fn missing_features_fail_softly() {
        let bundle = ModelBundle::new(
            sample_catalog(),
            None,
            sample_scaler(),
            sample_neighbor_index(),
            None,
        )
        .expect("bundle without features");

        let outcome = expand_neighbors(&bundle, RowIndex::new(0), 5);
        assert!(matches!(outcome, StageOutcome::Failed(AppError::Computation(_))));
        assert!(outcome.into_rows().is_empty());
    }

    #[test]
    fn out_of_range_row_fails_softly() {
        let bundle = sample_bundle(false);
        let outcome = expand_neighbors(&bundle, RowIndex::new(999), 5);
        assert!(matches!(outcome, StageOutcome::Failed(_)));
    }

    #[test]
    fn feature_width_mismatch_fails_softly() {
        let narrow = sample_catalog().iter().map(|_| vec![1.0]).collect();
        let bundle = ModelBundle::new(
            sample_catalog(),
            Some(FeatureTable::new(narrow).expect("uniform rows")),
            sample_scaler(),
            sample_neighbor_index(),
            None,
        )
        .expect("bundle");

        let outcome = expand_neighbors(&bundle, RowIndex::new(0), 5);
        assert!(matches!(outcome, StageOutcome::Failed(_)));
    }
}
