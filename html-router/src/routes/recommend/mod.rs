mod handlers;

use axum::{extract::FromRef, routing::post, Router};
pub use handlers::{recommend_handler, RecommendPageData};

use crate::html_state::HtmlState;

pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    HtmlState: FromRef<S>,
{
    Router::new().route("/recommend", post(recommend_handler))
}
