//! Errors raised while parsing inbound frames.

use thiserror::Error;

/// Reasons an inbound frame could not be turned into an [`Event`](crate::Event).
#[derive(Debug, Error)]
pub enum ParseError {
    /// The frame was not valid JSON.
    #[error("malformed JSON frame: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame was valid JSON but not an object.
    #[error("frame is not a JSON object")]
    NotAnObject,

    /// The frame has no string `event_type` field.
    #[error("frame is missing event_type")]
    MissingEventType,

    /// The `event_type` is outside the known enumeration.
    #[error("unknown event_type: {0}")]
    UnknownEventType(String),

    /// A task identifier given as text is blank.
    #[error("invalid task_id: {0}")]
    InvalidTaskId(String),
}
