//! Retrying store decorator

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use super::{SessionStore, StoreOption};
use crate::error::SessionError;
use crate::session::SessionData;

const DEFAULT_MAX_ATTEMPTS: usize = 3;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(100);

/// Wraps a store and retries transient failures with a fixed backoff
///
/// `NotFound` ends the loop at once, as do errors that are not
/// [retryable](SessionError::is_retryable). When every attempt fails the
/// last error is returned.
pub struct RetryStore<S: SessionStore> {
    inner: S,
    max_attempts: usize,
    backoff: Duration,
}

impl<S: SessionStore> RetryStore<S> {
    /// Wrap `inner` with 3 attempts and a 100ms backoff
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Set the attempt limit; zero falls back to the default
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = if max_attempts == 0 {
            DEFAULT_MAX_ATTEMPTS
        } else {
            max_attempts
        };
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn retry<T, F, Fut>(&self, op: &'static str, mut f: F) -> Result<T, SessionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SessionError>>,
    {
        let mut attempt = 1;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() || attempt >= self.max_attempts => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        "Session store {} failed (attempt {}/{}): {}",
                        op,
                        attempt,
                        self.max_attempts,
                        e
                    );
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl<S: SessionStore> SessionStore for RetryStore<S> {
    async fn get(&self, key: &str, opt: StoreOption) -> Result<SessionData, SessionError> {
        self.retry("get", move || self.inner.get(key, opt)).await
    }

    async fn set(&self, key: &str, data: &SessionData, opt: StoreOption) -> Result<(), SessionError> {
        self.retry("set", move || self.inner.set(key, data, opt)).await
    }

    async fn del(&self, key: &str) -> Result<(), SessionError> {
        self.retry("del", move || self.inner.del(key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingStore;

    fn retrying(store: RecordingStore) -> RetryStore<RecordingStore> {
        RetryStore::new(store).with_backoff(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let store = RecordingStore::new();
        store.fail_next(2);
        let retry = retrying(store.clone());

        let data = SessionData::new();
        retry.set("k", &data, StoreOption::default()).await.unwrap();
        assert_eq!(store.set_calls().len(), 3);
    }

    #[tokio::test]
    async fn test_surfaces_last_error_after_max_attempts() {
        let store = RecordingStore::new();
        store.fail_next(10);
        let retry = retrying(store.clone()).with_max_attempts(4);

        let err = retry.del("k").await.unwrap_err();
        assert!(matches!(err, SessionError::Store(_)));
        assert_eq!(store.del_calls().len(), 4);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let store = RecordingStore::new();
        let retry = retrying(store.clone());

        let err = retry.get("missing", StoreOption::default()).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.get_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_get_retries_transient_errors() {
        let store = RecordingStore::new();
        let mut data = SessionData::new();
        data.set("a", 1).unwrap();
        store.insert("k", data);
        store.fail_next(1);

        let retry = retrying(store.clone());
        let found = retry.get("k", StoreOption::default()).await.unwrap();
        assert_eq!(found.get::<i32>("a"), Some(1));
        assert_eq!(store.get_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_zero_attempts_uses_default() {
        let store = RecordingStore::new();
        store.fail_next(10);
        let retry = retrying(store.clone()).with_max_attempts(0);

        assert!(retry.del("k").await.is_err());
        assert_eq!(store.del_calls().len(), 3);
    }
}
