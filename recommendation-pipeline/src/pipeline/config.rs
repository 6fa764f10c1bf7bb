use common::utils::config::AppConfig;
use serde::{Deserialize, Serialize};

/// Sizes that govern each recommendation stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationTuning {
    /// Candidates taken from text search.
    pub search_top_k: usize,
    /// Filtered search hits carried into the combined list ahead of neighbors.
    pub head_take: usize,
    /// Feature-space neighbors added for the best match.
    pub neighbor_top_k: usize,
    /// Recommendations returned to the caller.
    pub max_recommendations: usize,
}

impl Default for RecommendationTuning {
    fn default() -> Self {
        Self {
            search_top_k: 20,
            head_take: 3,
            neighbor_top_k: 5,
            max_recommendations: 8,
        }
    }
}

impl RecommendationTuning {
    /// Defaults, overridden by whichever sizes the configuration sets.
    pub fn from_config(config: &AppConfig) -> Self {
        let defaults = Self::default();
        Self {
            search_top_k: config.search_top_k.unwrap_or(defaults.search_top_k),
            head_take: config.head_take.unwrap_or(defaults.head_take),
            neighbor_top_k: config.neighbor_top_k.unwrap_or(defaults.neighbor_top_k),
            max_recommendations: config
                .max_recommendations
                .unwrap_or(defaults.max_recommendations),
        }
    }
}
