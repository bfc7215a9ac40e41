//! One-shot flash values
//!
//! A flash maps keys to an ordered list of values and lives inside the
//! session data under a reserved key. Reading a key drains it, so a value
//! set during one request is seen by exactly one later read, typically the
//! request after a redirect.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::SessionError;

/// Flash message store nested inside a session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flash {
    values: HashMap<String, Vec<Value>>,
    changed: bool,
}

impl Flash {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a flash from its encoded form; an empty string is an empty flash
    pub(crate) fn decode(encoded: &str) -> Result<Self, SessionError> {
        if encoded.is_empty() {
            return Ok(Self::default());
        }
        Ok(Self {
            values: serde_json::from_str(encoded)?,
            changed: false,
        })
    }

    pub(crate) fn encode(&self) -> Result<String, SessionError> {
        if self.values.is_empty() {
            return Ok(String::new());
        }
        Ok(serde_json::to_string(&self.values)?)
    }

    /// Append a value to the key
    ///
    /// Nothing is stored if the value cannot be serialized.
    pub fn add<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), SessionError> {
        let value = serde_json::to_value(value)?;
        self.values.entry(key.to_string()).or_default().push(value);
        self.changed = true;
        Ok(())
    }

    /// Replace all values of the key with a single one
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), SessionError> {
        let value = serde_json::to_value(value)?;
        self.values.insert(key.to_string(), vec![value]);
        self.changed = true;
        Ok(())
    }

    /// Take the first value of the key, discarding the rest
    pub fn get_value(&mut self, key: &str) -> Option<Value> {
        let values = self.values.remove(key)?;
        self.changed = true;
        values.into_iter().next()
    }

    /// Typed [`get_value`](Self::get_value); the key is drained even when
    /// the value does not deserialize into `T`
    pub fn get<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        self.get_value(key)
            .and_then(|v| serde_json::from_value(v).ok())
    }

    /// Take every value of the key, in insertion order
    pub fn values(&mut self, key: &str) -> Vec<Value> {
        match self.values.remove(key) {
            Some(values) => {
                self.changed = true;
                values
            }
            None => Vec::new(),
        }
    }

    /// Check for the key without draining it
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn del(&mut self, key: &str) {
        if self.values.remove(key).is_some() {
            self.changed = true;
        }
    }

    /// Drop everything; clearing an empty flash is not a change
    pub fn clear(&mut self) {
        if !self.values.is_empty() {
            self.values.clear();
            self.changed = true;
        }
    }

    /// Number of keys
    pub fn count(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether any mutation happened since the flash was loaded
    pub fn changed(&self) -> bool {
        self.changed
    }
}
