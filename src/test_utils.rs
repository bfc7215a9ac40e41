//! Shared helpers for unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::SessionError;
use crate::session::SessionData;
use crate::store::{SessionStore, StoreOption};

#[derive(Default)]
struct Recorded {
    records: HashMap<String, SessionData>,
    failures: usize,
    gets: Vec<String>,
    sets: Vec<(String, SessionData, StoreOption)>,
    dels: Vec<String>,
}

/// Store that remembers every call and can be told to fail
///
/// Records never expire; TTLs are only recorded.
#[derive(Clone, Default)]
pub(crate) struct RecordingStore {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` calls, whatever the operation
    pub(crate) fn fail_next(&self, n: usize) {
        self.inner.lock().failures = n;
    }

    pub(crate) fn insert(&self, key: &str, data: SessionData) {
        self.inner.lock().records.insert(key.to_string(), data);
    }

    pub(crate) fn record(&self, key: &str) -> Option<SessionData> {
        self.inner.lock().records.get(key).cloned()
    }

    pub(crate) fn get_calls(&self) -> Vec<String> {
        self.inner.lock().gets.clone()
    }

    pub(crate) fn set_calls(&self) -> Vec<(String, SessionData, StoreOption)> {
        self.inner.lock().sets.clone()
    }

    pub(crate) fn del_calls(&self) -> Vec<String> {
        self.inner.lock().dels.clone()
    }

    fn check_failure(state: &mut Recorded) -> Result<(), SessionError> {
        if state.failures > 0 {
            state.failures -= 1;
            return Err(SessionError::Store("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for RecordingStore {
    async fn get(&self, key: &str, _opt: StoreOption) -> Result<SessionData, SessionError> {
        let mut state = self.inner.lock();
        state.gets.push(key.to_string());
        Self::check_failure(&mut state)?;
        state.records.get(key).cloned().ok_or(SessionError::NotFound)
    }

    async fn set(&self, key: &str, data: &SessionData, opt: StoreOption) -> Result<(), SessionError> {
        let mut state = self.inner.lock();
        state.sets.push((key.to_string(), data.clone(), opt));
        Self::check_failure(&mut state)?;
        state.records.insert(key.to_string(), data.clone());
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), SessionError> {
        let mut state = self.inner.lock();
        state.dels.push(key.to_string());
        Self::check_failure(&mut state)?;
        state.records.remove(key);
        Ok(())
    }
}
