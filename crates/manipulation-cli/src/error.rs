//! Error types for the goal client.

use thiserror::Error;

/// Errors that can occur when talking to the goal server.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server refused the goal.
    #[error("goal rejected: {0}")]
    Rejected(String),

    /// Goal not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success response.
    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}
