use std::sync::Arc;

use axum::{extract::State, Json};
use recommendation_pipeline::{Recommendation, RecommendationRequest};
use serde::Serialize;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub recommendations: Vec<Recommendation>,
}

pub async fn recommend(
    State(state): State<ApiState>,
    Json(request): Json<RecommendationRequest>,
) -> Result<Json<RecommendResponse>, ApiError> {
    let recommendations = Arc::clone(&state.recommender)
        .recommend_async(request)
        .await?;

    Ok(Json(RecommendResponse { recommendations }))
}
