use std::sync::Arc;

use axum::{extract::State, Form};
use axum_htmx::HxRequest;
use recommendation_pipeline::{Recommendation, RecommendationRequest};
use serde::Serialize;
use tracing::info;

use crate::{
    html_state::HtmlState,
    middlewares::response_middleware::{HtmlError, TemplateResponse, PAGE_TEMPLATE, RESULTS_BLOCK},
};

/// Form values are echoed back so the page keeps what was submitted.
#[derive(Serialize)]
pub struct RecommendPageData {
    book_title: String,
    language: Option<String>,
    min_rating: Option<String>,
    model_ready: bool,
    recommendations: Vec<Recommendation>,
    error_message: Option<String>,
}

pub async fn recommend_handler(
    State(state): State<HtmlState>,
    HxRequest(is_htmx): HxRequest,
    Form(request): Form<RecommendationRequest>,
) -> Result<TemplateResponse, HtmlError> {
    let outcome = Arc::clone(&state.recommender)
        .recommend_async(request.clone())
        .await;

    let (recommendations, error_message) = match outcome {
        Ok(recommendations) => {
            info!(count = recommendations.len(), "Rendering recommendations");
            (recommendations, None)
        }
        Err(err) if err.is_rejection() => {
            info!(reason = %err, "Recommendation request rejected");
            (Vec::new(), Some(err.user_message()))
        }
        Err(err) => return Err(HtmlError::from(err)),
    };

    let data = RecommendPageData {
        book_title: request.book_title,
        language: request.language,
        min_rating: request.min_rating,
        model_ready: state.recommender.is_ready(),
        recommendations,
        error_message,
    };

    if is_htmx {
        Ok(TemplateResponse::new_partial(
            PAGE_TEMPLATE,
            RESULTS_BLOCK,
            data,
        ))
    } else {
        Ok(TemplateResponse::new_template(PAGE_TEMPLATE, data))
    }
}
