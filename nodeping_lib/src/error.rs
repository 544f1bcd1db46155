//! Error types for NodePing API client.

use serde_json::Value;
use thiserror::Error;

/// Result type alias for NodePing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Base error type for NodePing operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Malformed response: {0}")]
    MalformedResponse(#[from] MalformedResponseError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Message reported by the service, if this is a [`ServiceError`].
    pub fn service_message(&self) -> Option<&str> {
        match self {
            Error::Service(e) => Some(e.message.as_str()),
            _ => None,
        }
    }
}

/// Raised when no usable response came back: connection failure, timeout,
/// or an HTTP error status without an `error` payload.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    pub status_code: Option<u16>,
    #[source]
    pub source: Option<reqwest::Error>,
}

impl TransportError {
    pub fn new(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self {
            message: message.into(),
            status_code,
            source: None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        // request URLs carry the token in their query string
        let err = err.without_url();
        let message = if err.is_timeout() {
            "Request to NodePing timed out".to_string()
        } else if err.is_connect() {
            "Connection to NodePing failed".to_string()
        } else {
            err.to_string()
        };
        Self {
            message,
            status_code: err.status().map(|s| s.as_u16()),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.into())
    }
}

/// Raised when the decoded response carries a top-level `error` field.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ServiceError {
    pub message: String,
    pub status_code: Option<u16>,
}

impl ServiceError {
    pub fn new(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self {
            message: message.into(),
            status_code,
        }
    }
}

/// Raised when the response cannot be mapped: not JSON, wrong shape,
/// or a required field is missing.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct MalformedResponseError {
    pub message: String,
    pub response_data: Option<Value>,
}

impl MalformedResponseError {
    pub fn new(message: impl Into<String>, response_data: Option<Value>) -> Self {
        Self {
            message: message.into(),
            response_data,
        }
    }
}
