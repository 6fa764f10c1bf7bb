pub mod index;
pub mod recommend;

use axum::response::IntoResponse;

use crate::middlewares::response_middleware::TemplateResponse;

pub async fn not_found() -> impl IntoResponse {
    TemplateResponse::not_found()
}
