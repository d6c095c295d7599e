//! Client error types.

use remodel_model::ModelError;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while talking to the server.
///
/// Resource operations never return these to the caller; they end up in the
/// record's failure flags and in a fetch-failure event. They surface directly
/// only from setup calls and from [`crate::Transport`] implementations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The client or a resource was set up inconsistently.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The schema requires authorization but no token was available.
    #[error("no credentials available for `{0}`")]
    MissingCredentials(String),

    /// The server answered outside the 2xx range.
    #[error("server answered with status {status}")]
    Status { status: u16, body: Option<Value> },

    /// No answer arrived before the deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// A custom transport failed to deliver the request.
    #[error("transport failed: {0}")]
    Transport(String),

    /// reqwest failed to send or read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response could not be applied to the record.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// HTTP status, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Response body of a non-success answer.
    pub fn body(&self) -> Option<&Value> {
        match self {
            ClientError::Status { body, .. } => body.as_ref(),
            _ => None,
        }
    }

    /// Returns true if the request was abandoned at its deadline.
    pub fn is_timeout(&self) -> bool {
        match self {
            ClientError::Timeout(_) => true,
            ClientError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}
