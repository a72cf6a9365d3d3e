//! Error types for event handling.

use thiserror::Error;

/// Errors that can occur when handling events.
#[derive(Debug, Error, Clone)]
pub enum EventError {
    /// The message carried a topic this consumer does not handle.
    #[error("unexpected topic: expected {expected:?}, got {actual:?}")]
    UnexpectedTopic {
        expected: &'static str,
        actual: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        EventError::Serialization(err.to_string())
    }
}
