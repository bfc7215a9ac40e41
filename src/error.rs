//! Session error types

use std::fmt;

/// Errors that can occur during session operations
#[derive(Debug)]
pub enum SessionError {
    /// The store has no record for the key, or the record expired.
    ///
    /// This is an expected outcome, not a failure: the manager answers it
    /// with a fresh session.
    NotFound,
    /// Error from the session store (eligible for retry)
    Store(String),
    /// A value could not be encoded or decoded
    Encoding(String),
    /// Signed cookie value is malformed or its digest does not verify
    InvalidSignature,
    /// Operation requires a session issued by a [`Manager`](crate::Manager)
    Misuse(&'static str),
    /// Redis error (when redis-store feature is enabled)
    #[cfg(feature = "redis-store")]
    Redis(redis::RedisError),
}

impl SessionError {
    /// Whether a retry may succeed where this attempt failed
    pub fn is_retryable(&self) -> bool {
        match self {
            SessionError::Store(_) => true,
            #[cfg(feature = "redis-store")]
            SessionError::Redis(_) => true,
            _ => false,
        }
    }

    /// Whether this is the store's "no such record" signal
    pub fn is_not_found(&self) -> bool {
        matches!(self, SessionError::NotFound)
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NotFound => write!(f, "Session not found"),
            SessionError::Store(msg) => write!(f, "Session store error: {}", msg),
            SessionError::Encoding(msg) => write!(f, "Encoding error: {}", msg),
            SessionError::InvalidSignature => write!(f, "Invalid cookie signature"),
            SessionError::Misuse(op) => {
                write!(f, "{} called on a session not issued by a manager", op)
            }
            #[cfg(feature = "redis-store")]
            SessionError::Redis(e) => write!(f, "Redis error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

#[cfg(feature = "redis-store")]
impl From<redis::RedisError> for SessionError {
    fn from(err: redis::RedisError) -> Self {
        SessionError::Redis(err)
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Encoding(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(SessionError::Store("timeout".into()).is_retryable());
        assert!(!SessionError::NotFound.is_retryable());
        assert!(!SessionError::Encoding("bad".into()).is_retryable());
        assert!(!SessionError::Misuse("regenerate").is_retryable());
    }

    #[test]
    fn test_display() {
        assert_eq!(SessionError::NotFound.to_string(), "Session not found");
        assert_eq!(
            SessionError::Misuse("destroy").to_string(),
            "destroy called on a session not issued by a manager"
        );
    }
}
