//! Session store trait

use async_trait::async_trait;
use std::time::Duration;

use crate::error::SessionError;
use crate::session::SessionData;

/// Per-call expiry settings, computed by the manager from its configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreOption {
    /// Time to live; zero means the record never expires
    pub ttl: Duration,
    /// On `get`, push the expiry of a hit `ttl` into the future
    pub rolling: bool,
}

impl StoreOption {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, rolling: false }
    }

    pub fn with_rolling(mut self, rolling: bool) -> Self {
        self.rolling = rolling;
        self
    }

    /// Whether the record should expire at all
    pub fn expires(&self) -> bool {
        !self.ttl.is_zero()
    }
}

/// Trait for session storage backends
///
/// Keys are the hashed session identifiers produced by the manager.
/// Implementations must be safe to share between concurrent requests.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Get a session by key
    ///
    /// Must return [`SessionError::NotFound`] for unknown or expired keys,
    /// and only for those: the manager answers it with a fresh session,
    /// while any other error aborts the request.
    async fn get(&self, key: &str, opt: StoreOption) -> Result<SessionData, SessionError>;

    /// Set/update a session
    async fn set(&self, key: &str, data: &SessionData, opt: StoreOption) -> Result<(), SessionError>;

    /// Delete a session; deleting an unknown key succeeds
    async fn del(&self, key: &str) -> Result<(), SessionError>;
}
