//! Validation and decoding errors for domain payloads.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid or missing type: {0}")]
    InvalidCategory(String),

    #[error("Invalid count: {0}")]
    InvalidCount(i64),

    #[error("Invalid coordinates: ({latitude}, {longitude})")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("{field} too long ({len} > {max} characters)")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Comment needs content or media")]
    EmptyComment,

    #[error("Missing {0}")]
    MissingField(&'static str),

    #[error("Unknown event kind: {0}")]
    UnknownEventKind(String),

    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
