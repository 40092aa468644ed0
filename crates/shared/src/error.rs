//! Codec errors

use thiserror::Error;

/// Failure to turn a text frame into an [`Envelope`](crate::Envelope) or back.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Frame is not a JSON object")]
    NotAnObject,

    #[error("Frame has no string `type` field")]
    MissingType,
}
