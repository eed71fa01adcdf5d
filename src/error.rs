//! Error types of the resolution pipeline.
//!
//! None of these reach a phrase stream: callers log them and fall back to a
//! displayable value.

use thiserror::Error;

/// Failures of the translation cache.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Translation cache query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Cached translation payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Cached expiry timestamp is invalid: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

/// Failures of a batched lookup request.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Failed to send translation lookup request: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Translation lookup error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Malformed translation lookup response: {0}")]
    Malformed(#[from] serde_json::Error),
}
