//! Session data and the request-scoped session view

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::SessionError;
use crate::flash::Flash;
use crate::manager::Manager;

/// Unix seconds of the last store write
pub(crate) const TIMESTAMP_KEY: &str = "_sess.ts";
/// Unix milliseconds at which a rotated-away record was retired
pub(crate) const DESTROYED_KEY: &str = "_sess.destroyed";
/// Encoded flash values
pub(crate) const FLASH_KEY: &str = "_sess.flash";

/// Session values keyed by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionData {
    values: HashMap<String, Value>,
}

impl SessionData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value from session data
    ///
    /// Returns None for a missing key or a value of another type.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Set a value in session data
    ///
    /// Values that cannot be serialized leave the data unchanged.
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), SessionError> {
        let value = serde_json::to_value(value)?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    pub fn insert_value(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    /// Remove a value from session data
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Check if a key exists
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Clear all session data
    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn get_i64(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(Value::as_i64)
    }
}

/// Bookkeeping for an identifier rotation within one request
#[derive(Debug, Clone)]
pub(crate) struct Rotation {
    /// Store key of the superseded record; None when it was never stored
    pub(crate) old_id: Option<String>,
    /// Data as it was before rotation
    pub(crate) old_data: SessionData,
}

/// One visitor's session for the duration of a request
///
/// Obtained from [`Manager::get`] and handed back to [`Manager::save`].
/// A session built with [`Session::default`] is detached: it works as a
/// plain map, but rotation and destruction fail with
/// [`SessionError::Misuse`].
#[derive(Default)]
pub struct Session {
    pub(crate) id: String,
    pub(crate) raw_id: String,
    pub(crate) name: String,
    pub(crate) secure: bool,
    pub(crate) data: SessionData,
    pub(crate) flash: Option<Flash>,
    pub(crate) is_new: bool,
    pub(crate) changed: bool,
    pub(crate) rotation: Option<Rotation>,
    pub(crate) destroyed: bool,
    /// The record was already removed by [`Manager::destroy`]
    pub(crate) deleted: bool,
    pub(crate) manager: Option<Manager>,
}

impl Session {
    /// Store key of the session (the hashed identifier unless hashing is
    /// disabled); never the raw cookie identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Cookie name this session was read from
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True until the session is backed by a stored record
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Whether data or flash were modified during this request
    pub fn changed(&self) -> bool {
        self.changed || self.flash.as_ref().is_some_and(Flash::changed)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Whether this identifier was rotated away longer ago than the hijack
    /// window allows
    ///
    /// Only records retained with `delete_old_session = false` carry the
    /// marker this checks.
    pub fn hijacked(&self) -> bool {
        let (Some(manager), Some(destroyed_at)) =
            (self.manager.as_ref(), self.data.get_i64(DESTROYED_KEY))
        else {
            return false;
        };
        let window = i64::try_from(manager.config().hijack_window.as_millis()).unwrap_or(i64::MAX);
        Utc::now().timestamp_millis().saturating_sub(destroyed_at) > window
    }

    /// Get a value from the session
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data.get(key)
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.data.get_value(key)
    }

    /// Set a value in the session
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), SessionError> {
        self.data.set(key, value)?;
        self.changed = true;
        Ok(())
    }

    /// Remove a value; only a present key counts as a change
    pub fn del(&mut self, key: &str) {
        if self.data.remove(key).is_some() {
            self.changed = true;
        }
    }

    /// Remove a value and return it
    pub fn pop_value(&mut self, key: &str) -> Option<Value> {
        let value = self.data.remove(key)?;
        self.changed = true;
        Some(value)
    }

    /// Typed [`pop_value`](Self::pop_value)
    pub fn pop<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        self.pop_value(key)
            .and_then(|v| serde_json::from_value(v).ok())
    }

    /// Check if a key exists in the session
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains(key)
    }

    /// Clear all session data
    pub fn clear(&mut self) {
        if !self.data.is_empty() {
            self.data.clear();
            self.changed = true;
        }
    }

    /// Check if the session is empty (no user data)
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &SessionData {
        &self.data
    }

    /// Data as it was when the identifier was rotated in this request
    pub fn previous_data(&self) -> Option<&SessionData> {
        self.rotation.as_ref().map(|r| &r.old_data)
    }

    /// Flash values of this session, decoded on first access
    pub fn flash(&mut self) -> &mut Flash {
        let data = &self.data;
        self.flash.get_or_insert_with(|| {
            let encoded = data
                .get_value(FLASH_KEY)
                .and_then(Value::as_str)
                .unwrap_or_default();
            Flash::decode(encoded).unwrap_or_else(|e| {
                tracing::debug!("Discarding undecodable flash: {}", e);
                Flash::default()
            })
        })
    }

    /// Rotate the identifier, keeping the data
    ///
    /// Only the first call in a request rotates; later calls are no-ops.
    pub fn regenerate(&mut self) -> Result<(), SessionError> {
        let manager = self.manager.clone().ok_or(SessionError::Misuse("regenerate"))?;
        manager.regenerate(self)
    }

    /// Drop all data and rotate the identifier
    pub fn renew(&mut self) -> Result<(), SessionError> {
        let manager = self.manager.clone().ok_or(SessionError::Misuse("renew"))?;
        manager.renew(self)
    }

    /// Mark the session for destruction at save time
    pub fn destroy(&mut self) -> Result<(), SessionError> {
        if self.manager.is_none() {
            return Err(SessionError::Misuse("destroy"));
        }
        self.destroyed = true;
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("data", &self.data)
            .field("changed", &self.changed())
            .field("is_new", &self.is_new)
            .field("rotated", &self.rotation.is_some())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::store::MemoryStore;
    use std::collections::BTreeMap;
    use std::time::Duration;

    #[test]
    fn test_session_operation() {
        let mut s = Session::default();
        assert_eq!(s.get::<i32>("a"), None);
        assert_eq!(s.pop::<i32>("a"), None);

        s.del("a");
        assert!(!s.changed());

        s.set("a", 1).unwrap();
        assert_eq!(s.get::<i32>("a"), Some(1));
        assert!(s.changed());

        s.del("a");
        assert_eq!(s.get::<i32>("a"), None);

        s.set("b", 1).unwrap();
        assert_eq!(s.pop::<i32>("b"), Some(1));
        assert_eq!(s.get::<i32>("b"), None);
    }

    #[test]
    fn test_delete_absent_key_is_not_a_change() {
        let mut s = Session::default();
        s.data.insert_value("a", Value::from(1));

        s.del("missing");
        assert!(s.pop_value("missing").is_none());
        assert!(!s.changed());

        s.del("a");
        assert!(s.changed());
    }

    #[test]
    fn test_changed_is_monotonic() {
        let mut s = Session::default();
        s.set("a", 1).unwrap();
        s.del("a");
        assert!(s.is_empty());
        assert!(s.changed());
    }

    #[test]
    fn test_unencodable_value() {
        let mut s = Session::default();
        let mut bad = BTreeMap::new();
        bad.insert(vec![1u8], 1);

        assert!(matches!(s.set("a", bad), Err(SessionError::Encoding(_))));
        assert!(!s.contains("a"));
        assert!(!s.changed());
    }

    #[test]
    fn test_flash_change_marks_session() {
        let mut s = Session::default();
        s.flash().add("notice", "saved").unwrap();
        assert!(s.changed());
    }

    #[test]
    fn test_flash_decoded_from_data() {
        let mut f = Flash::new();
        f.set("notice", "hi").unwrap();

        let mut s = Session::default();
        s.data
            .insert_value(FLASH_KEY, Value::String(f.encode().unwrap()));
        assert!(!s.changed());
        assert_eq!(s.flash().get::<String>("notice"), Some("hi".to_string()));
        assert!(s.changed());
    }

    #[test]
    fn test_hijack_window_saturates() {
        let bound = |window: Duration| {
            let manager = Manager::new(
                MemoryStore::new(),
                SessionConfig::new("s").with_hijack_window(window),
            );
            let mut s = Session {
                manager: Some(manager),
                ..Default::default()
            };
            s.data.insert_value(DESTROYED_KEY, Value::from(0));
            s
        };

        assert!(bound(Duration::from_millis(10)).hijacked());
        assert!(!bound(Duration::MAX).hijacked());
    }

    #[test]
    fn test_detached_session_rejects_lifecycle_calls() {
        let mut s = Session::default();
        assert!(matches!(s.regenerate(), Err(SessionError::Misuse(_))));
        assert!(matches!(s.renew(), Err(SessionError::Misuse(_))));
        assert!(matches!(s.destroy(), Err(SessionError::Misuse(_))));
        assert!(!s.hijacked());
    }
}
