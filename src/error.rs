//! Error types for each subsystem.
//! The translation pipeline itself never returns these to its caller; they
//! surface only from store access, the LLM boundary, feedback and review.

use thiserror::Error;

/// Persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },
}

/// Failures at the LLM call boundary.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
    #[error("LLM call timed out")]
    Timeout,
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("LLM not configured: {0}")]
    NotConfigured(String),
}

/// Feedback submission failures.
#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("translation history {0} not found")]
    HistoryNotFound(i64),
    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),
    #[error("status CORRECTED requires corrected text")]
    MissingCorrection,
    #[error("feedback status PENDING cannot be submitted")]
    PendingStatus,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Candidate review failures.
#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("candidate {0} not found")]
    NotFound(i64),
    #[error("candidate {id} is {status}, only PENDING candidates can be reviewed")]
    InvalidState { id: i64, status: String },
    #[error("invalid review action: {0}")]
    InvalidAction(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}
