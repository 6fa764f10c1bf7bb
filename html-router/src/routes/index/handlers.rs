use axum::{extract::State, response::IntoResponse};
use serde::Serialize;

use crate::{
    html_state::HtmlState,
    middlewares::response_middleware::{TemplateResponse, PAGE_TEMPLATE},
};

#[derive(Serialize)]
pub struct IndexPageData {
    model_ready: bool,
}

pub async fn index_handler(State(state): State<HtmlState>) -> impl IntoResponse {
    TemplateResponse::new_template(
        PAGE_TEMPLATE,
        IndexPageData {
            model_ready: state.recommender.is_ready(),
        },
    )
}
