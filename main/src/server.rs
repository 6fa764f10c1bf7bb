use std::sync::Arc;

use api_router::{api_routes_v1, api_state::ApiState};
use axum::{extract::FromRef, Router};
use common::utils::config::get_config;
use html_router::{html_routes, html_state::HtmlState};
use recommendation_pipeline::{artifact::load_bundle, RecommendationTuning, Recommender};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config
    let config = get_config()?;

    // A missing model is not fatal; requests are rejected until restart
    let bundle = match load_bundle(&config.model_candidates()) {
        Ok(bundle) => {
            info!(books = bundle.len(), "Model bundle ready");
            Some(Arc::new(bundle))
        }
        Err(err) => {
            warn!(error = %err, "Starting without a model bundle");
            None
        }
    };

    let tuning = RecommendationTuning::from_config(&config);
    let recommender = Arc::new(Recommender::new(bundle, tuning));

    let app = build_app(recommender);

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_app(recommender: Arc<Recommender>) -> Router {
    let html_state = HtmlState::new(Arc::clone(&recommender));
    let api_state = ApiState::new(recommender);

    Router::new()
        .nest("/api/v1", api_routes_v1(&api_state))
        .merge(html_routes(&html_state))
        .with_state(AppState {
            api_state,
            html_state,
        })
}

#[derive(Clone, FromRef)]
struct AppState {
    api_state: ApiState,
    html_state: HtmlState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use recommendation_pipeline::test_support::sample_bundle;
    use tower::ServiceExt;

    async fn status_and_body(app: Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).expect("request")
    }

    #[tokio::test]
    async fn unloaded_server_still_answers() {
        let app = build_app(Arc::new(Recommender::unloaded()));

        let (status, body) = status_and_body(app.clone(), get("/api/v1/live")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("ok"));

        let (status, _) = status_and_body(app.clone(), get("/api/v1/ready")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, body) = status_and_body(app, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<form"));
    }

    #[tokio::test]
    async fn both_surfaces_share_one_recommender() {
        let app = build_app(Arc::new(Recommender::with_bundle(sample_bundle(true))));

        let api_request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/recommend")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"book_title":"tolkien"}"#))
            .expect("request");
        let (status, body) = status_and_body(app.clone(), api_request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("The Hobbit"));

        let form_request = Request::builder()
            .method(Method::POST)
            .uri("/recommend")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("book_title=tolkien"))
            .expect("request");
        let (status, body) = status_and_body(app, form_request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("The Hobbit"));
    }
}
