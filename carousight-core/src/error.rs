//! Error types for carousight-core

use thiserror::Error;

/// Main error type for the carousight-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Scraping provider error
    #[error("scraper error: {0}")]
    Scraper(String),

    /// LLM error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Post not found
    #[error("post not found: {0}")]
    PostNotFound(String),

    /// Recommendation not found
    #[error("recommendation not found: {0}")]
    RecommendationNotFound(i64),

    /// Recommendation is not pending and cannot change status
    #[error("recommendation {id} is already {status}")]
    InvalidTransition { id: i64, status: String },
}

/// Result type alias for carousight-core
pub type Result<T> = std::result::Result<T, Error>;
