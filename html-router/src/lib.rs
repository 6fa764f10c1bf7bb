pub mod html_state;
pub mod middlewares;
pub mod router_factory;
pub mod routes;

use axum::{extract::FromRef, Router};
use html_state::HtmlState;
use router_factory::RouterFactory;

/// Html routes
pub fn html_routes<S>(app_state: &HtmlState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    HtmlState: FromRef<S>,
{
    RouterFactory::new(app_state)
        .add_public_routes(routes::index::public_router())
        .add_public_routes(routes::recommend::router())
        .with_public_assets("/assets", "assets/")
        .with_fallback(routes::not_found)
        .with_compression()
        .build()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use recommendation_pipeline::{test_support::sample_bundle, Recommender};
    use tower::ServiceExt;

    use super::*;

    fn app(recommender: Recommender) -> Router {
        let state = HtmlState::new(Arc::new(recommender));
        html_routes::<HtmlState>(&state).with_state(state)
    }

    fn loaded_app() -> Router {
        app(Recommender::with_bundle(sample_bundle(true)))
    }

    fn form_post(body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/recommend")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn index_renders_the_form() {
        let request = Request::builder().uri("/").body(Body::empty()).expect("request");
        let (status, body) = send(loaded_app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<form"));
        assert!(!body.contains("unavailable until a model is loaded"));
    }

    #[tokio::test]
    async fn index_flags_a_missing_model() {
        let request = Request::builder().uri("/").body(Body::empty()).expect("request");
        let (status, body) = send(app(Recommender::unloaded()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("unavailable until a model is loaded"));
    }

    #[tokio::test]
    async fn recommend_lists_results() {
        let (status, body) = send(loaded_app(), form_post("book_title=Harry+Potter")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Harry Potter and the Chamber of Secrets"));
        assert!(body.contains("The Hobbit"));
        assert!(!body.contains("class=\"error\""));
    }

    #[tokio::test]
    async fn empty_title_shows_validation_message() {
        let (status, body) =
            send(loaded_app(), form_post("book_title=&language=&min_rating=")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Please enter a book title or author name."));
    }

    #[tokio::test]
    async fn unloaded_model_is_reported_in_the_page() {
        let (status, body) = send(
            app(Recommender::unloaded()),
            form_post("book_title=Harry+Potter"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Model not loaded. Please check the server configuration."));
    }

    #[tokio::test]
    async fn htmx_requests_get_only_the_results_block() {
        let mut request = form_post("book_title=tolkien");
        request
            .headers_mut()
            .insert("HX-Request", header::HeaderValue::from_static("true"));
        let (status, body) = send(loaded_app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("id=\"results\""));
        assert!(body.contains("The Hobbit"));
        assert!(!body.contains("<form"));
    }

    #[tokio::test]
    async fn unknown_paths_render_not_found() {
        let request = Request::builder()
            .uri("/no-such-page")
            .body(Body::empty())
            .expect("request");
        let (status, body) = send(loaded_app(), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("Page not found."));
    }

    #[tokio::test]
    async fn stylesheet_is_served() {
        let request = Request::builder()
            .uri("/assets/style.css")
            .body(Body::empty())
            .expect("request");
        let (status, body) = send(loaded_app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(".recommendations"));
    }
}
