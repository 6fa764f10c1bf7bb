mod config;
mod stages;

pub use config::RecommendationTuning;
pub use stages::{dedupe_by_title, PipelineContext};

use std::time::{Duration, Instant};

use common::error::AppError;
use tracing::debug;

use crate::{artifact::ModelBundle, filter::CandidateFilter, Recommendation};

use stages::{AssembleStage, CombineStage, ExpandStage, FilterStage, RefilterStage, SearchStage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Search,
    Filter,
    Expand,
    Combine,
    Refilter,
    Assemble,
}

/// One step of the recommendation pipeline. Returning an error ends the run.
pub trait PipelineStage: Send + Sync {
    fn kind(&self) -> StageKind;
    fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), AppError>;
}

pub type BoxedStage = Box<dyn PipelineStage>;

#[derive(Debug, Default, Clone)]
pub struct PipelineStageTimings {
    timings: Vec<(StageKind, Duration)>,
}

impl PipelineStageTimings {
    pub fn record(&mut self, kind: StageKind, duration: Duration) {
        self.timings.push((kind, duration));
    }

    pub fn into_vec(self) -> Vec<(StageKind, Duration)> {
        self.timings
    }

    pub fn get(&self, kind: StageKind) -> Option<Duration> {
        self.timings
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, d)| *d)
    }

    pub fn total(&self) -> Duration {
        self.timings.iter().map(|(_, d)| *d).sum()
    }
}

pub struct PipelineRunOutput {
    pub recommendations: Vec<Recommendation>,
    pub stage_timings: PipelineStageTimings,
}

/// search -> filter -> expand -> combine -> refilter -> assemble
pub fn default_stages() -> Vec<BoxedStage> {
    vec![
        Box::new(SearchStage),
        Box::new(FilterStage),
        Box::new(ExpandStage),
        Box::new(CombineStage),
        Box::new(RefilterStage),
        Box::new(AssembleStage),
    ]
}

/// Runs every stage in order against `bundle` for an already validated query.
pub fn run_pipeline(
    bundle: &ModelBundle,
    query: &str,
    filter: CandidateFilter,
    tuning: &RecommendationTuning,
) -> Result<PipelineRunOutput, AppError> {
    let mut ctx = PipelineContext::new(bundle, query.to_owned(), filter, tuning);

    for stage in default_stages() {
        let start = Instant::now();
        stage.execute(&mut ctx)?;
        ctx.record_stage_duration(stage.kind(), start.elapsed());
    }

    let stage_timings = ctx.take_stage_timings();
    debug!(
        total_us = stage_timings.total().as_micros(),
        stages = ?stage_timings,
        "Recommendation pipeline finished"
    );

    Ok(PipelineRunOutput {
        recommendations: ctx.take_recommendations(),
        stage_timings,
    })
}
