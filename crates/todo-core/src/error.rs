//! Error types for todo-core

use crate::response::StatusCode;
use thiserror::Error;

/// Result type alias for todo operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the todo API
#[derive(Debug, Error)]
pub enum Error {
    /// Todo body missing or empty
    #[error("{0}")]
    Validation(String),

    /// Request body could not be decoded
    #[error("malformed request body: {0}")]
    MalformedBody(String),

    /// Identifier in the path is not in the store's format
    #[error("invalid todo id: {0}")]
    InvalidIdentifier(String),

    /// Well-formed identifier with no matching todo
    #[error("todo not found: {0}")]
    NotFound(String),

    /// Route not found
    #[error("route not found: {method} {path}")]
    RouteNotFound { method: String, path: String },

    /// Path exists, method does not
    #[error("method {method} not allowed for {path}")]
    MethodNotAllowed {
        method: String,
        path: String,
        allowed: Vec<String>,
    },

    /// Invalid HTTP method
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// Body too large
    #[error("request body exceeds limit of {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// Backing store unreachable or failed
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Bad or missing configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status this error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_)
            | Error::MalformedBody(_)
            | Error::InvalidIdentifier(_)
            | Error::InvalidMethod(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) | Error::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            Error::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::StoreUnavailable(_)
            | Error::Config(_)
            | Error::Io(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to API clients
    ///
    /// Server-side failures are collapsed into a generic message; the
    /// detail only goes to the log.
    pub fn public_message(&self) -> String {
        if self.status_code().is_server_error() {
            "internal server error".to_string()
        } else {
            self.to_string()
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::MalformedBody(err.to_string())
    }
}

#[cfg(feature = "mongodb")]
impl From<mongodb::error::Error> for Error {
    fn from(err: mongodb::error::Error) -> Self {
        Error::StoreUnavailable(err.to_string())
    }
}
