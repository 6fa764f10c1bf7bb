use std::collections::HashSet;

use common::error::{AppError, EmptyStage};
use tracing::{debug, warn};

use crate::{
    artifact::{ModelBundle, RowIndex},
    expansion::expand_neighbors,
    filter::CandidateFilter,
    search::search_books,
    Recommendation, StageOutcome,
};

use super::{PipelineStage, PipelineStageTimings, RecommendationTuning, StageKind};

/// Per-request state threaded through the stages.
pub struct PipelineContext<'a> {
    pub bundle: &'a ModelBundle,
    pub query: String,
    pub filter: CandidateFilter,
    pub tuning: &'a RecommendationTuning,
    pub candidates: Vec<RowIndex>,
    pub filtered: Vec<RowIndex>,
    pub neighbors: Vec<RowIndex>,
    pub combined: Vec<RowIndex>,
    pub final_rows: Vec<RowIndex>,
    pub recommendations: Vec<Recommendation>,
    stage_timings: PipelineStageTimings,
}

impl<'a> PipelineContext<'a> {
    pub fn new(
        bundle: &'a ModelBundle,
        query: String,
        filter: CandidateFilter,
        tuning: &'a RecommendationTuning,
    ) -> Self {
        Self {
            bundle,
            query,
            filter,
            tuning,
            candidates: Vec::new(),
            filtered: Vec::new(),
            neighbors: Vec::new(),
            combined: Vec::new(),
            final_rows: Vec::new(),
            recommendations: Vec::new(),
            stage_timings: PipelineStageTimings::default(),
        }
    }

    pub fn record_stage_duration(&mut self, kind: StageKind, duration: std::time::Duration) {
        self.stage_timings.record(kind, duration);
    }

    pub fn take_stage_timings(&mut self) -> PipelineStageTimings {
        std::mem::take(&mut self.stage_timings)
    }

    pub fn take_recommendations(&mut self) -> Vec<Recommendation> {
        std::mem::take(&mut self.recommendations)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SearchStage;

impl PipelineStage for SearchStage {
    fn kind(&self) -> StageKind {
        StageKind::Search
    }

    fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), AppError> {
        let outcome = search_books(ctx.bundle, &ctx.query, ctx.tuning.search_top_k);
        if let StageOutcome::Failed(err) = &outcome {
            warn!(error = %err, "Text search failed; treating as no matches");
        }

        ctx.candidates = outcome.into_rows();
        debug!(candidates = ctx.candidates.len(), "Search stage complete");
        if ctx.candidates.is_empty() {
            return Err(AppError::NoResults(EmptyStage::Search {
                query: ctx.query.clone(),
            }));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FilterStage;

impl PipelineStage for FilterStage {
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }

    fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), AppError> {
        ctx.filtered = ctx.filter.apply(ctx.bundle, &ctx.candidates);
        debug!(
            before = ctx.candidates.len(),
            after = ctx.filtered.len(),
            "Filter stage complete"
        );
        if ctx.filtered.is_empty() {
            return Err(AppError::NoResults(EmptyStage::Filter));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExpandStage;

impl PipelineStage for ExpandStage {
    fn kind(&self) -> StageKind {
        StageKind::Expand
    }

    fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), AppError> {
        let best = ctx.filtered.first().copied().ok_or_else(|| {
            AppError::InternalError("expansion requires at least one filtered candidate".into())
        })?;

        let outcome = expand_neighbors(ctx.bundle, best, ctx.tuning.neighbor_top_k);
        if let StageOutcome::Failed(err) = &outcome {
            warn!(error = %err, %best, "Neighbor expansion failed; continuing without neighbors");
        }
        ctx.neighbors = outcome.into_rows();
        debug!(%best, neighbors = ctx.neighbors.len(), "Expand stage complete");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CombineStage;

impl PipelineStage for CombineStage {
    fn kind(&self) -> StageKind {
        StageKind::Combine
    }

    fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), AppError> {
        let merged: Vec<RowIndex> = ctx
            .filtered
            .iter()
            .take(ctx.tuning.head_take)
            .chain(&ctx.neighbors)
            .copied()
            .collect();
        ctx.combined = dedupe_by_title(ctx.bundle, &merged);
        Ok(())
    }
}

/// Neighbor rows never went through the first filter, so the combined list is
/// filtered again with the same predicates.
#[derive(Debug, Clone, Copy)]
pub struct RefilterStage;

impl PipelineStage for RefilterStage {
    fn kind(&self) -> StageKind {
        StageKind::Refilter
    }

    fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), AppError> {
        ctx.final_rows = ctx.filter.apply(ctx.bundle, &ctx.combined);
        if ctx.final_rows.is_empty() {
            return Err(AppError::NoResults(EmptyStage::Combination));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AssembleStage;

impl PipelineStage for AssembleStage {
    fn kind(&self) -> StageKind {
        StageKind::Assemble
    }

    fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), AppError> {
        ctx.recommendations = ctx
            .final_rows
            .iter()
            .take(ctx.tuning.max_recommendations)
            .filter_map(|row| ctx.bundle.book(*row))
            .map(Recommendation::from)
            .collect();
        if ctx.recommendations.is_empty() {
            return Err(AppError::NoResults(EmptyStage::Combination));
        }
        Ok(())
    }
}

/// Keeps the first row for each title, preserving order.
pub fn dedupe_by_title(bundle: &ModelBundle, rows: &[RowIndex]) -> Vec<RowIndex> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(rows.len());
    rows.iter()
        .copied()
        .filter(|row| {
            bundle
                .book(*row)
                .is_some_and(|book| seen.insert(book.title.as_str()))
        })
        .collect()
}
