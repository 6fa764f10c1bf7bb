use std::fmt;

use thiserror::Error;
use tokio::task::JoinError;

/// Pipeline step that came back empty, used to pick the rejection message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmptyStage {
    /// Text search found nothing for the query.
    Search { query: String },
    /// Every search candidate was removed by the request filters.
    Filter,
    /// Nothing survived the second filter pass over the combined set.
    Combination,
}

impl fmt::Display for EmptyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Search { query } => write!(
                f,
                "No books found matching \"{query}\". Try a different search term."
            ),
            Self::Filter => f.write_str("No books match your criteria. Try adjusting your filters."),
            Self::Combination => f.write_str("No recommendations found matching your criteria."),
        }
    }
}

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("No results: {0}")]
    NoResults(EmptyStage),
    #[error("Artifact error: {0}")]
    Artifact(String),
    #[error("Computation error: {0}")]
    Computation(String),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Message shown to the person who submitted the request.
    ///
    /// Request-scoped rejections carry their own wording; anything else is
    /// reported as a generic processing failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::Configuration(_) => {
                "Model not loaded. Please check the server configuration.".to_string()
            }
            Self::Validation(msg) => msg.clone(),
            Self::NoResults(stage) => stage.to_string(),
            other => format!("An error occurred while processing your request: {other}"),
        }
    }

    /// True for rejections that are an expected outcome of a request rather than a fault.
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::Validation(_) | Self::NoResults(_)
        )
    }
}
