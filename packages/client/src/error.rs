//! Client error types.

use thiserror::Error;

/// Client-specific errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server rejected the token; reconnecting cannot help
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The connection could not be established
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// An established connection ended unexpectedly
    #[error("Connection lost (close code {code:?})")]
    ConnectionLost { code: Option<u16> },
}

impl ClientError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ClientError::AuthenticationFailed(_))
    }
}
