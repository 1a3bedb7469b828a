//! Error types for the recommendation engine

/// Result type for recommendation operations
pub type Result<T> = std::result::Result<T, RecommendationError>;

/// Error types for recommendation operations
#[derive(thiserror::Error, Debug)]
pub enum RecommendationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Upstream video provider error: {0}")]
    Upstream(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl RecommendationError {
    /// Upstream failures are the only errors that reach the caller of a refresh
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_) | Self::Http(_))
    }
}
