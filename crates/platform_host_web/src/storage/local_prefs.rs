//! `localStorage`-backed durable store implementation.
//!
//! The browser API is synchronous, so this adapter implements [`platform_host::PrefsStore`]
//! directly without buffering.

use platform_host::{load_pref_with, save_pref_with, PrefsStore};
use serde::{de::DeserializeOwned, Serialize};

#[derive(Debug, Clone, Copy, Default)]
/// Durable store backed by `window.localStorage`.
pub struct WebPrefsStore;

impl WebPrefsStore {
    /// Returns `true` when `localStorage` can be reached from the current context.
    pub fn is_available(self) -> bool {
        #[cfg(target_arch = "wasm32")]
        {
            local_storage().is_some()
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            false
        }
    }

    /// Loads and deserializes a typed value, treating unreadable entries as absent.
    pub fn load_typed<T: DeserializeOwned>(self, key: &str) -> Option<T> {
        load_pref_with(&self, key).ok().flatten()
    }

    /// Serializes and saves a typed value.
    ///
    /// # Errors
    ///
    /// Returns an error when serialization or the localStorage write fails.
    pub fn save_typed<T: Serialize>(self, key: &str, value: &T) -> Result<(), String> {
        save_pref_with(&self, key, value)
    }
}

impl PrefsStore for WebPrefsStore {
    fn load_pref(&self, key: &str) -> Result<Option<String>, String> {
        #[cfg(target_arch = "wasm32")]
        {
            let storage = local_storage().ok_or_else(|| "localStorage unavailable".to_string())?;
            storage
                .get_item(key)
                .map_err(|e| format!("localStorage get_item failed: {e:?}"))
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = key;
            Ok(None)
        }
    }

    fn save_pref(&self, key: &str, raw: &str) -> Result<(), String> {
        #[cfg(target_arch = "wasm32")]
        {
            let storage = local_storage().ok_or_else(|| "localStorage unavailable".to_string())?;
            storage
                .set_item(key, raw)
                .map_err(|e| format!("localStorage set_item failed: {e:?}"))
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = (key, raw);
            Ok(())
        }
    }

    fn delete_pref(&self, key: &str) -> Result<(), String> {
        #[cfg(target_arch = "wasm32")]
        {
            let storage = local_storage().ok_or_else(|| "localStorage unavailable".to_string())?;
            storage
                .remove_item(key)
                .map_err(|e| format!("localStorage remove_item failed: {e:?}"))
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = key;
            Ok(())
        }
    }
}

/// Returns the durable store for the current host.
pub fn prefs_store() -> WebPrefsStore {
    WebPrefsStore
}

#[cfg(target_arch = "wasm32")]
fn local_storage() -> Option<web_sys::Storage> {
    web_sys::window()?.local_storage().ok().flatten()
}
