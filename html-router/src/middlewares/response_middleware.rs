use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Html, IntoResponse, Response},
    Extension,
};
use common::{
    error::AppError,
    utils::template_engine::{ProvidesTemplateEngine, Value},
};
use minijinja::context;
use serde::Serialize;
use tracing::error;

/// Page every handler renders into.
pub const PAGE_TEMPLATE: &str = "index.html";
/// Block holding the recommendation results, swapped in by htmx.
pub const RESULTS_BLOCK: &str = "results";

#[derive(Clone, Debug)]
pub enum TemplateKind {
    Full(String),
    Partial(String, String),
}

/// Handler output rendered by [`with_template_response`] once the handler returns.
#[derive(Clone)]
pub struct TemplateResponse {
    template_kind: TemplateKind,
    context: Value,
    status: StatusCode,
}

impl TemplateResponse {
    pub fn new_template<T: Serialize>(name: impl Into<String>, context: T) -> Self {
        Self {
            template_kind: TemplateKind::Full(name.into()),
            context: Value::from_serialize(&context),
            status: StatusCode::OK,
        }
    }

    pub fn new_partial<T: Serialize>(
        template: impl Into<String>,
        block: impl Into<String>,
        context: T,
    ) -> Self {
        Self {
            template_kind: TemplateKind::Partial(template.into(), block.into()),
            context: Value::from_serialize(&context),
            status: StatusCode::OK,
        }
    }

    /// The regular page showing `message` in place of results.
    pub fn error(status: StatusCode, message: &str) -> Self {
        Self {
            template_kind: TemplateKind::Full(PAGE_TEMPLATE.to_string()),
            context: context! { error_message => message },
            status,
        }
    }

    pub fn not_found() -> Self {
        Self::error(StatusCode::NOT_FOUND, "Page not found.")
    }

    pub fn server_error() -> Self {
        Self::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error. Please try again.",
        )
    }
}

impl IntoResponse for TemplateResponse {
    fn into_response(self) -> Response {
        Extension(self).into_response()
    }
}

pub async fn with_template_response<S>(State(state): State<S>, req: Request, next: Next) -> Response
where
    S: ProvidesTemplateEngine + Clone + Send + Sync + 'static,
{
    let response = next.run(req).await;

    let Some(template_response) = response.extensions().get::<TemplateResponse>().cloned() else {
        return response;
    };

    let template_engine = state.template_engine();
    let rendered = match &template_response.template_kind {
        TemplateKind::Full(name) => template_engine.render(name, &template_response.context),
        TemplateKind::Partial(template, block) => {
            template_engine.render_block(template, block, &template_response.context)
        }
    };

    match rendered {
        Ok(html) => (template_response.status, Html(html)).into_response(),
        Err(e) => {
            error!(
                "Failed to render {:?}: {:?}",
                template_response.template_kind, e
            );
            (StatusCode::INTERNAL_SERVER_ERROR, Html(fallback_error())).into_response()
        }
    }
}

#[derive(Debug)]
pub enum HtmlError {
    AppError(AppError),
    TemplateError(String),
}

impl From<AppError> for HtmlError {
    fn from(err: AppError) -> Self {
        Self::AppError(err)
    }
}

impl From<minijinja::Error> for HtmlError {
    fn from(err: minijinja::Error) -> Self {
        Self::TemplateError(err.to_string())
    }
}

impl IntoResponse for HtmlError {
    fn into_response(self) -> Response {
        match self {
            Self::AppError(err) => {
                let status = match &err {
                    AppError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
                    AppError::Validation(_) => StatusCode::BAD_REQUEST,
                    AppError::NoResults(_) => StatusCode::NOT_FOUND,
                    _ => {
                        error!("Internal error: {:?}", err);
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                TemplateResponse::error(status, &err.user_message()).into_response()
            }
            Self::TemplateError(err) => {
                error!("Template error: {}", err);
                TemplateResponse::server_error().into_response()
            }
        }
    }
}

fn fallback_error() -> String {
    r#"
    <html>
        <body>
            <main class="container">
                <h1>Error</h1>
                <p>Internal server error. Please try again.</p>
            </main>
        </body>
    </html>
    "#
    .to_string()
}
