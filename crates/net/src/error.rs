//! API error types

/// API result type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from calls to the catalog API
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The presented credential or token was rejected by the server
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The server understood the request and refused it
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The server could not be reached (connect failure, timeout)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response body could not be interpreted
    #[error("Protocol error: {0}")]
    Protocol(String),
}

// Every reqwest failure is transport-class here: the client reads bodies
// as text and classifies statuses itself, so only connection-level
// problems surface as reqwest errors.
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

impl Error {
    /// Authorization-class failures invalidate the session.
    /// Transport failures never do.
    pub fn is_authorization(&self) -> bool {
        matches!(self, Error::Unauthorized(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}
