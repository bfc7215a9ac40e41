//! Redis session store
//!
//! - Key: `prefix + session key` (default prefix: "sess:")
//! - Value: codec-encoded session data (JSON by default)
//! - TTL: Redis expiry from the store option; no expiry when zero

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Arc;

use super::{SessionStore, StoreOption};
use crate::codec::{Codec, JsonCodec};
use crate::error::SessionError;
use crate::session::SessionData;

/// Redis session store
///
/// # Example
///
/// ```rust,ignore
/// use salvo_session_manager::RedisStore;
///
/// let client = redis::Client::open("redis://127.0.0.1/")?;
/// let store = RedisStore::new(client).await?;
/// ```
pub struct RedisStore {
    conn: Arc<ConnectionManager>,
    prefix: String,
    codec: Arc<dyn Codec>,
}

impl RedisStore {
    /// Create a new Redis store with the "sess:" prefix
    pub async fn new(client: redis::Client) -> Result<Self, SessionError> {
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::from_connection_manager(conn))
    }

    /// Create a new Redis store from a connection string
    pub async fn from_url(url: &str) -> Result<Self, SessionError> {
        let client = redis::Client::open(url)
            .map_err(|e| SessionError::Store(format!("Failed to create Redis client: {}", e)))?;
        Self::new(client).await
    }

    /// Create a new Redis store from an existing connection manager
    pub fn from_connection_manager(conn: ConnectionManager) -> Self {
        Self {
            conn: Arc::new(conn),
            prefix: "sess:".to_string(),
            codec: Arc::new(JsonCodec),
        }
    }

    /// Build with custom prefix
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    /// Build with custom codec
    pub fn with_codec<C: Codec>(mut self, codec: C) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Make a storage key from session key
    fn make_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

impl Clone for RedisStore {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            prefix: self.prefix.clone(),
            codec: Arc::clone(&self.codec),
        }
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn get(&self, key: &str, opt: StoreOption) -> Result<SessionData, SessionError> {
        let key = self.make_key(key);
        let mut conn = (*self.conn).clone();

        let bytes: Option<Vec<u8>> = conn.get(&key).await?;
        let bytes = bytes.ok_or(SessionError::NotFound)?;

        if opt.rolling && opt.expires() {
            // the key may have expired between GET and EXPIRE; the data is
            // still returned, the next save writes it back
            let _: bool = conn.expire(&key, opt.ttl.as_secs().max(1) as i64).await?;
        }

        self.codec.decode(&bytes)
    }

    async fn set(&self, key: &str, data: &SessionData, opt: StoreOption) -> Result<(), SessionError> {
        let key = self.make_key(key);
        let bytes = self.codec.encode(data)?;
        let mut conn = (*self.conn).clone();

        if opt.expires() {
            // Set with expiration (EX = seconds)
            conn.set_ex::<_, _, ()>(&key, bytes, opt.ttl.as_secs().max(1)).await?;
        } else {
            conn.set::<_, _, ()>(&key, bytes).await?;
        }

        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), SessionError> {
        let key = self.make_key(key);
        let mut conn = (*self.conn).clone();

        conn.del::<_, ()>(&key).await?;
        Ok(())
    }
}
