//! Client error types

use shared::store::{TransportError, TransportErrorCode};
use thiserror::Error;

/// Client error type
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    /// Listener failure reported by the store
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Snapshot did not match the expected document schema
    #[error("Decode error: {0}")]
    Decode(String),

    /// Enabling or disabling the store network failed
    #[error("Network error: {0}")]
    Network(String),

    /// Remote mutation failed
    #[error("Remote error: {0}")]
    Remote(String),
}

impl ClientError {
    /// Whether an automatic retry can help
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            Self::Network(_) => true,
            Self::Decode(_) | Self::Remote(_) => false,
        }
    }

    /// HTTP-like status shown to users: 403 for permission problems, 500 otherwise
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Transport(e) if e.code == TransportErrorCode::PermissionDenied => 403,
            _ => 500,
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability() {
        assert!(ClientError::from(TransportError::unavailable("offline")).is_retryable());
        let denied = ClientError::from(TransportError::permission_denied("rules"));
        assert!(!denied.is_retryable());
        assert_eq!(denied.status_code(), 403);
        assert!(!ClientError::Decode("bad".into()).is_retryable());
    }
}
