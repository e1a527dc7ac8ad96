//! Synchronous durable key/value storage contracts and adapters.
//!
//! The shape mirrors the browser `localStorage` API: raw strings keyed by string, accessed
//! inline. Callers layer JSON on top with [`load_pref_with`] and [`save_pref_with`].

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::Rc,
};

use serde::{de::DeserializeOwned, Serialize};

/// Host service for durable string values keyed by string.
pub trait PrefsStore {
    /// Loads the raw string stored under `key`.
    fn load_pref(&self, key: &str) -> Result<Option<String>, String>;

    /// Saves `raw` under `key`, replacing any previous value.
    fn save_pref(&self, key: &str, raw: &str) -> Result<(), String>;

    /// Deletes `key`. Deleting a missing key succeeds.
    fn delete_pref(&self, key: &str) -> Result<(), String>;
}

impl<S: PrefsStore + ?Sized> PrefsStore for Rc<S> {
    fn load_pref(&self, key: &str) -> Result<Option<String>, String> {
        (**self).load_pref(key)
    }

    fn save_pref(&self, key: &str, raw: &str) -> Result<(), String> {
        (**self).save_pref(key, raw)
    }

    fn delete_pref(&self, key: &str) -> Result<(), String> {
        (**self).delete_pref(key)
    }
}

#[derive(Debug, Clone, Copy, Default)]
/// No-op store for hosts without durable storage. Loads are always empty.
pub struct NoopPrefsStore;

impl PrefsStore for NoopPrefsStore {
    fn load_pref(&self, _key: &str) -> Result<Option<String>, String> {
        Ok(None)
    }

    fn save_pref(&self, _key: &str, _raw: &str) -> Result<(), String> {
        Ok(())
    }

    fn delete_pref(&self, _key: &str) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryPrefsInner {
    values: RefCell<HashMap<String, String>>,
    writes: Cell<usize>,
    quota_bytes: Cell<Option<usize>>,
}

#[derive(Debug, Clone, Default)]
/// In-memory store keyed by string.
///
/// Clones share the same backing map. An optional byte quota makes oversized writes fail the
/// way a full browser storage area does.
pub struct MemoryPrefsStore {
    inner: Rc<MemoryPrefsInner>,
}

impl MemoryPrefsStore {
    /// Creates a store whose total stored bytes (keys plus values) may not exceed `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        let store = Self::default();
        store.inner.quota_bytes.set(Some(quota_bytes));
        store
    }

    /// Number of successful [`PrefsStore::save_pref`] calls so far.
    pub fn write_count(&self) -> usize {
        self.inner.writes.get()
    }

    /// Returns the raw value for `key` without going through the trait.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner.values.borrow().get(key).cloned()
    }

    fn used_bytes_without(&self, key: &str) -> usize {
        self.inner
            .values
            .borrow()
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl PrefsStore for MemoryPrefsStore {
    fn load_pref(&self, key: &str) -> Result<Option<String>, String> {
        Ok(self.raw(key))
    }

    fn save_pref(&self, key: &str, raw: &str) -> Result<(), String> {
        if let Some(quota) = self.inner.quota_bytes.get() {
            let needed = self.used_bytes_without(key) + key.len() + raw.len();
            if needed > quota {
                return Err(format!(
                    "storage quota exceeded: {needed} bytes requested, {quota} allowed"
                ));
            }
        }
        self.inner
            .values
            .borrow_mut()
            .insert(key.to_string(), raw.to_string());
        self.inner.writes.set(self.inner.writes.get() + 1);
        Ok(())
    }

    fn delete_pref(&self, key: &str) -> Result<(), String> {
        self.inner.values.borrow_mut().remove(key);
        Ok(())
    }
}

/// Loads and deserializes a typed value through a [`PrefsStore`] implementation.
///
/// # Errors
///
/// Returns an error when the store or JSON deserialization fails.
pub fn load_pref_with<S: PrefsStore + ?Sized, T: DeserializeOwned>(
    store: &S,
    key: &str,
) -> Result<Option<T>, String> {
    let Some(raw) = store.load_pref(key)? else {
        return Ok(None);
    };
    let value = serde_json::from_str(&raw).map_err(|e| e.to_string())?;
    Ok(Some(value))
}

/// Serializes and saves a typed value through a [`PrefsStore`] implementation.
///
/// # Errors
///
/// Returns an error when serialization or the store save fails.
pub fn save_pref_with<S: PrefsStore + ?Sized, T: Serialize>(
    store: &S,
    key: &str,
    value: &T,
) -> Result<(), String> {
    let raw = serde_json::to_string(value).map_err(|e| e.to_string())?;
    store.save_pref(key, &raw)
}
