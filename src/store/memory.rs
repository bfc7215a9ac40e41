//! In-memory session store
//!
//! This is primarily for development and testing.
//! For production, use RedisStore or another persistent store.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::{SessionStore, StoreOption};
use crate::codec::{Codec, JsonCodec};
use crate::error::SessionError;
use crate::session::SessionData;

struct StoredSession {
    bytes: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredSession {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(exp) if exp <= now)
    }
}

type Entries = RwLock<HashMap<String, StoredSession>>;

/// Background expiry task
struct Sweeper {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// In-memory session store
///
/// Expired entries are invisible to `get` immediately, but only leave
/// memory when swept: call [`sweep`](Self::sweep) yourself or run
/// [`start_sweeper`](Self::start_sweeper).
///
/// Warning: This store is not suitable for production use because:
/// - Sessions are lost on server restart
/// - Sessions are not shared across multiple server instances
pub struct MemoryStore {
    sessions: Arc<Entries>,
    codec: Arc<dyn Codec>,
    sweeper: Arc<Mutex<Option<Sweeper>>>,
}

impl MemoryStore {
    /// Create a new memory store using the JSON codec
    pub fn new() -> Self {
        Self::with_codec(JsonCodec)
    }

    /// Create a new memory store with a custom codec
    pub fn with_codec<C: Codec>(codec: C) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            codec: Arc::new(codec),
            sweeper: Arc::new(Mutex::new(None)),
        }
    }

    /// Remove expired entries, returning how many were dropped
    pub fn sweep(&self) -> usize {
        sweep_entries(&self.sessions)
    }

    /// Number of entries held, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start sweeping expired entries every `interval`.
    ///
    /// Must be called from within a tokio runtime. Does nothing if a sweeper
    /// is already running. The task also ends by itself once every handle
    /// to the store is dropped.
    pub fn start_sweeper(&self, interval: Duration) {
        if interval.is_zero() {
            tracing::warn!("Ignoring zero sweep interval for memory store");
            return;
        }

        let mut slot = self.sweeper.lock();
        if slot.is_some() {
            return;
        }

        let (stop, mut stopped) = oneshot::channel();
        let entries = Arc::downgrade(&self.sessions);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = ticker.tick() => {
                        let Some(entries) = entries.upgrade() else {
                            break;
                        };
                        let removed = sweep_entries(&entries);
                        if removed > 0 {
                            tracing::debug!("Swept {} expired sessions", removed);
                        }
                    }
                }
            }
        });

        tracing::info!("Memory store sweeper started ({:?} interval)", interval);
        *slot = Some(Sweeper { stop, handle });
    }

    /// Stop the sweeper and wait for it to finish
    pub async fn stop_sweeper(&self) {
        let sweeper = self.sweeper.lock().take();
        if let Some(sweeper) = sweeper {
            // the task may already have exited on its own
            let _ = sweeper.stop.send(());
            if let Err(e) = sweeper.handle.await {
                tracing::error!("Memory store sweeper failed: {}", e);
            }
            tracing::info!("Memory store sweeper stopped");
        }
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeper.lock().is_some()
    }
}

fn sweep_entries(entries: &Entries) -> usize {
    let mut sessions = entries.write();
    let before = sessions.len();
    let now = Instant::now();
    sessions.retain(|_, stored| !stored.is_expired(now));
    before - sessions.len()
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
            codec: Arc::clone(&self.codec),
            sweeper: Arc::clone(&self.sweeper),
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, key: &str, opt: StoreOption) -> Result<SessionData, SessionError> {
        let now = Instant::now();
        let bytes = if opt.rolling && opt.expires() {
            let mut sessions = self.sessions.write();
            let stored = sessions
                .get_mut(key)
                .filter(|stored| !stored.is_expired(now))
                .ok_or(SessionError::NotFound)?;
            stored.expires_at = Some(now + opt.ttl);
            stored.bytes.clone()
        } else {
            let sessions = self.sessions.read();
            let stored = sessions
                .get(key)
                .filter(|stored| !stored.is_expired(now))
                .ok_or(SessionError::NotFound)?;
            stored.bytes.clone()
        };

        self.codec.decode(&bytes)
    }

    async fn set(&self, key: &str, data: &SessionData, opt: StoreOption) -> Result<(), SessionError> {
        let stored = StoredSession {
            bytes: self.codec.encode(data)?,
            expires_at: opt.expires().then(|| Instant::now() + opt.ttl),
        };

        self.sessions.write().insert(key.to_string(), stored);
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), SessionError> {
        self.sessions.write().remove(key);
        Ok(())
    }
}
