//! Error types surfaced over HTTP.

use thiserror::Error;

/// Result type alias using the shared error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Request-level errors, each mapped to one HTTP status.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Rejected query parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Upstream answered, but with something unusable
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Upstream is down or throttling; retrying later may succeed
    #[error("Upstream unavailable: {0}")]
    Unavailable(String),

    /// Upstream did not answer in time
    #[error("Upstream timed out after {0} seconds")]
    Timeout(u64),
}

impl Error {
    /// Get HTTP status code for this error.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::Upstream(_) => 502,
            Self::Unavailable(_) => 503,
            Self::Timeout(_) => 504,
        }
    }
}
