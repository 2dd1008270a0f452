use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    HttpRequestError(#[from] reqwest::Error),

    #[error("TMDB API error: HTTP {status} body={body}")]
    Api { status: u16, body: String },

    #[error("TMDB rate limit still active after {attempts} attempts (last retry-after {retry_after:?})")]
    RateLimited {
        attempts: u32,
        retry_after: Option<Duration>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Invalid SQL identifier: '{0}'")]
    InvalidIdentifier(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Whether the TMDB client should retry the request that produced this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::HttpRequestError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::Api { status, .. } => is_retryable_status(*status),
            Error::RateLimited { .. } => true,
            _ => false,
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}
