//! Error types for websess.

use thiserror::Error;

/// Main error type for session operations.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Session with the given ID was not found, or its record is unreadable.
    #[error("session not found: {0}")]
    NotFound(String),

    /// A new session was saved under an ID that is already live.
    #[error("session id collision: {0}")]
    IdCollision(String),

    /// Storage medium failure (disk, permissions, network).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding or decoding of a session record failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Backend or configuration is unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Serialization(err.to_string())
    }
}

impl From<redis::RedisError> for SessionError {
    fn from(err: redis::RedisError) -> Self {
        SessionError::Io(std::io::Error::other(err.to_string()))
    }
}

impl SessionError {
    /// Whether this error means "no usable session under that id".
    pub fn is_not_found(&self) -> bool {
        matches!(self, SessionError::NotFound(_))
    }
}

/// Convenience Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
