//! Error types for the search client
//!
//! These never reach the presentation layer directly: the controller folds
//! every failure into a `Failed` state. They exist so the backend seam and the
//! HTTP client can report what went wrong with enough detail to classify it.

/// Errors produced by the HTTP client and search backends.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The request could not be sent or the response could not be read.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The service answered with a non-2xx status.
    #[error("server returned status {status}")]
    Status { status: u16, body: String },

    /// A 2xx response whose body is not JSON.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl SearchError {
    /// Whether this error came from the remote service rather than the transport
    pub fn is_server_error(&self) -> bool {
        matches!(self, SearchError::Status { .. })
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        SearchError::Http(err.to_string())
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, SearchError>;
