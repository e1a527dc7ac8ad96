//! Hierarchical key/value state with change notification and debounced persistence.
//!
//! Keys are dotted paths (`windows.active`) into a JSON object tree. Every value-changing write
//! notifies subscribers of the exact key, then `*` subscribers, then subscribers of each
//! ancestor path from nearest to farthest. Writes that leave the value unchanged notify nobody
//! and schedule no persistence.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::{Rc, Weak},
};

use leptos::logging;
use platform_host::{unix_time_ms_now, PrefsStore, DAY_MS};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    event_bus::ListenerResult,
    scheduler::{Scheduler, TimerId},
};

/// Storage key the store snapshot is written under.
pub const DEFAULT_STORAGE_KEY: &str = "webdesk-store";
/// Quiet period before an automatic persist runs.
pub const DEFAULT_PERSIST_DEBOUNCE_MS: u64 = 500;
/// Snapshots older than this are discarded by [`Store::restore`].
pub const DEFAULT_MAX_PERSISTED_AGE_MS: u64 = 30 * DAY_MS;
/// Subscription key that receives every change.
pub const WILDCARD_KEY: &str = "*";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Store persistence failures.
pub enum StoreError {
    /// A value could not be converted to or from JSON.
    #[error("store serialization failed: {0}")]
    Serialize(String),
    /// The durable storage host rejected the operation.
    #[error("store storage failed: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, PartialEq)]
/// One change delivered to subscribers. `None` means the key is absent.
pub struct StoreChange {
    pub key: String,
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StoreStats {
    /// Top-level keys.
    pub keys: usize,
    /// Keys at every nesting depth.
    pub total_keys: usize,
    /// Distinct subscribed keys.
    pub subscribers: usize,
    pub auto_persist: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub storage_key: String,
    pub max_age_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            max_age_ms: DEFAULT_MAX_PERSISTED_AGE_MS,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSnapshot {
    state: Map<String, Value>,
    timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

type SubscriberFn = dyn Fn(&StoreChange) -> ListenerResult;

struct SubscriberEntry {
    id: SubscriberId,
    key: String,
    active: Cell<bool>,
    callback: Box<SubscriberFn>,
}

#[derive(Default)]
struct StoreState {
    values: Map<String, Value>,
    subscribers: Vec<Rc<SubscriberEntry>>,
    next_subscriber: u64,
    auto_persist: bool,
    debounce_ms: u64,
    pending_persist: Option<TimerId>,
}

struct StoreInner {
    state: RefCell<StoreState>,
    prefs: Rc<dyn PrefsStore>,
    scheduler: Scheduler,
    settings: StoreSettings,
}

#[derive(Clone)]
/// Cheap clonable handle to one store.
pub struct Store {
    inner: Rc<StoreInner>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("settings", &self.inner.settings)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Handle returned by [`Store::subscribe`].
#[derive(Debug, Clone)]
pub struct StoreSubscription {
    store: Weak<StoreInner>,
    key: String,
    id: SubscriberId,
}

impl StoreSubscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn unsubscribe(&self) -> bool {
        let Some(inner) = self.store.upgrade() else {
            return false;
        };
        Store { inner }.unsubscribe(&self.key, Some(self.id)) > 0
    }
}

impl Store {
    pub fn new(scheduler: Scheduler, prefs: Rc<dyn PrefsStore>) -> Self {
        Self::with_settings(scheduler, prefs, StoreSettings::default())
    }

    pub fn with_settings(
        scheduler: Scheduler,
        prefs: Rc<dyn PrefsStore>,
        settings: StoreSettings,
    ) -> Self {
        logging::log!("store initialized (storage key `{}`)", settings.storage_key);
        Self {
            inner: Rc::new(StoreInner {
                state: RefCell::new(StoreState {
                    next_subscriber: 1,
                    debounce_ms: DEFAULT_PERSIST_DEBOUNCE_MS,
                    ..StoreState::default()
                }),
                prefs,
                scheduler,
                settings,
            }),
        }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.inner.settings
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        read_path(&self.inner.state.borrow().values, key).cloned()
    }

    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    /// Reads and deserializes `key`, treating absent or mismatched values as `None`.
    pub fn get_typed<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    pub fn has(&self, key: &str) -> bool {
        read_path(&self.inner.state.borrow().values, key).is_some()
    }

    /// Writes `value` at the dotted `key`, creating (or replacing non-object) intermediates.
    ///
    /// Returns `false` when the key already held an equal value; nothing is notified then.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        let old_value = self.get(key);
        if old_value.as_ref() == Some(&value) {
            return false;
        }

        write_path(&mut self.inner.state.borrow_mut().values, key, value.clone());
        self.notify(key, Some(value), old_value);
        self.schedule_persist();
        true
    }

    /// Serializes `value` and writes it at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialize`] when `value` cannot be represented as JSON.
    pub fn set_serialized<T: Serialize>(&self, key: &str, value: &T) -> Result<bool, StoreError> {
        let value = serde_json::to_value(value).map_err(|e| StoreError::Serialize(e.to_string()))?;
        Ok(self.set(key, value))
    }

    /// Applies each entry through [`Store::set`].
    pub fn set_multiple<K, V>(&self, values: impl IntoIterator<Item = (K, V)>)
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (key, value) in values {
            self.set(key.as_ref(), value);
        }
    }

    /// Removes `key`. Returns `false` when it was absent.
    pub fn delete(&self, key: &str) -> bool {
        let Some(old_value) = self.get(key) else {
            return false;
        };
        remove_path(&mut self.inner.state.borrow_mut().values, key);
        self.notify(key, None, Some(old_value));
        self.schedule_persist();
        true
    }

    /// Removes every key, notifying each previous top-level key with an absent value.
    ///
    /// With auto-persist enabled the empty state is written immediately.
    pub fn clear(&self) {
        let previous = std::mem::take(&mut self.inner.state.borrow_mut().values);
        for (key, old_value) in previous {
            self.notify(&key, None, Some(old_value));
        }

        let auto_persist = self.inner.state.borrow().auto_persist;
        if auto_persist {
            self.cancel_pending_persist();
            // Failures are logged inside persist.
            let _ = self.persist();
        }
        logging::log!("store cleared");
    }

    /// Deep copy of the whole state tree.
    pub fn all(&self) -> Value {
        Value::Object(self.inner.state.borrow().values.clone())
    }

    pub fn subscribe(
        &self,
        key: &str,
        callback: impl Fn(&StoreChange) -> ListenerResult + 'static,
    ) -> StoreSubscription {
        let mut state = self.inner.state.borrow_mut();
        let id = SubscriberId(state.next_subscriber);
        state.next_subscriber += 1;
        state.subscribers.push(Rc::new(SubscriberEntry {
            id,
            key: key.to_string(),
            active: Cell::new(true),
            callback: Box::new(callback),
        }));
        StoreSubscription {
            store: Rc::downgrade(&self.inner),
            key: key.to_string(),
            id,
        }
    }

    /// Removes subscriber `id` of `key`, or every subscriber of `key` when `id` is `None`.
    pub fn unsubscribe(&self, key: &str, id: Option<SubscriberId>) -> usize {
        let mut state = self.inner.state.borrow_mut();
        let before = state.subscribers.len();
        state.subscribers.retain(|entry| {
            let remove = entry.key == key && id.map_or(true, |id| entry.id == id);
            if remove {
                entry.active.set(false);
            }
            !remove
        });
        before - state.subscribers.len()
    }

    fn subscribers_of(&self, key: &str) -> Vec<Rc<SubscriberEntry>> {
        self.inner
            .state
            .borrow()
            .subscribers
            .iter()
            .filter(|entry| entry.key == key)
            .cloned()
            .collect()
    }

    fn deliver(&self, subscribers: &[Rc<SubscriberEntry>], change: &StoreChange) {
        for entry in subscribers {
            if !entry.active.get() {
                continue;
            }
            if let Err(err) = (entry.callback)(change) {
                logging::error!(
                    "store subscriber `{}` failed for `{}`: {err}",
                    entry.key,
                    change.key
                );
            }
        }
    }

    fn notify(&self, key: &str, new_value: Option<Value>, old_value: Option<Value>) {
        if new_value == old_value {
            return;
        }
        let change = StoreChange {
            key: key.to_string(),
            new_value,
            old_value,
        };

        self.deliver(&self.subscribers_of(key), &change);
        if key != WILDCARD_KEY {
            self.deliver(&self.subscribers_of(WILDCARD_KEY), &change);
        }

        let segments: Vec<&str> = key.split('.').collect();
        for depth in (1..segments.len()).rev() {
            let parent = segments[..depth].join(".");
            let subscribers = self.subscribers_of(&parent);
            if subscribers.is_empty() {
                continue;
            }
            let parent_change = StoreChange {
                new_value: self.get(&parent),
                old_value: None,
                key: parent,
            };
            self.deliver(&subscribers, &parent_change);
        }
    }

    /// Turns on debounced persistence after every mutation.
    pub fn enable_auto_persist(&self, debounce_ms: u64) {
        let mut state = self.inner.state.borrow_mut();
        state.auto_persist = true;
        state.debounce_ms = debounce_ms;
        logging::log!("store auto-persist enabled (debounce {debounce_ms}ms)");
    }

    /// Turns off automatic persistence and cancels a pending write.
    pub fn disable_auto_persist(&self) {
        self.inner.state.borrow_mut().auto_persist = false;
        self.cancel_pending_persist();
        logging::log!("store auto-persist disabled");
    }

    pub fn is_auto_persist(&self) -> bool {
        self.inner.state.borrow().auto_persist
    }

    fn cancel_pending_persist(&self) {
        let pending = self.inner.state.borrow_mut().pending_persist.take();
        if let Some(timer) = pending {
            self.inner.scheduler.clear_timeout(timer);
        }
    }

    fn schedule_persist(&self) {
        let (auto_persist, debounce_ms) = {
            let state = self.inner.state.borrow();
            (state.auto_persist, state.debounce_ms)
        };
        if !auto_persist {
            return;
        }

        self.cancel_pending_persist();
        let weak = Rc::downgrade(&self.inner);
        let timer = self.inner.scheduler.set_timeout(debounce_ms, move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner.state.borrow_mut().pending_persist = None;
            // Failures are logged inside persist.
            let _ = Store { inner }.persist();
        });
        self.inner.state.borrow_mut().pending_persist = Some(timer);
    }

    /// Writes `{state, timestamp}` under the storage key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when serialization or the storage write fails. In-memory state is
    /// never affected.
    pub fn persist(&self) -> Result<(), StoreError> {
        let snapshot = PersistedSnapshot {
            state: self.inner.state.borrow().values.clone(),
            timestamp: unix_time_ms_now(),
        };
        let key = &self.inner.settings.storage_key;
        let result = serde_json::to_string(&snapshot)
            .map_err(|e| StoreError::Serialize(e.to_string()))
            .and_then(|raw| {
                self.inner
                    .prefs
                    .save_pref(key, &raw)
                    .map_err(StoreError::Storage)
            });
        match &result {
            Ok(()) => logging::log!("store persisted under `{key}`"),
            Err(err) => logging::error!("failed to persist store: {err}"),
        }
        result
    }

    /// Replaces the state with the persisted snapshot.
    ///
    /// Returns `false` when nothing is stored, and also when the stored entry is unreadable or
    /// older than the configured maximum age; such entries are removed from storage.
    pub fn restore(&self) -> bool {
        let key = &self.inner.settings.storage_key;
        let raw = match self.inner.prefs.load_pref(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                logging::log!("no persisted store found under `{key}`");
                return false;
            }
            Err(err) => {
                logging::error!("failed to read persisted store: {err}");
                self.discard_persisted();
                return false;
            }
        };

        let snapshot: PersistedSnapshot = match serde_json::from_str(&raw) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                logging::error!("failed to restore store: {err}");
                self.discard_persisted();
                return false;
            }
        };

        let age_ms = unix_time_ms_now().saturating_sub(snapshot.timestamp);
        if age_ms > self.inner.settings.max_age_ms {
            logging::warn!("persisted store is too old ({age_ms}ms), ignoring");
            self.discard_persisted();
            return false;
        }

        self.inner.state.borrow_mut().values = snapshot.state;
        logging::log!("store restored from `{key}`");
        true
    }

    fn discard_persisted(&self) {
        if let Err(err) = self.inner.prefs.delete_pref(&self.inner.settings.storage_key) {
            logging::warn!("failed to remove persisted store: {err}");
        }
    }

    pub fn stats(&self) -> StoreStats {
        let state = self.inner.state.borrow();
        let mut subscribed: Vec<&str> = state.subscribers.iter().map(|e| e.key.as_str()).collect();
        subscribed.sort_unstable();
        subscribed.dedup();
        StoreStats {
            keys: state.values.len(),
            total_keys: count_keys(&state.values),
            subscribers: subscribed.len(),
            auto_persist: state.auto_persist,
        }
    }

    pub fn debug(&self) {
        let stats = self.stats();
        logging::log!(
            "store: {} key(s), {} total, {} subscribed key(s), auto-persist {}",
            stats.keys,
            stats.total_keys,
            stats.subscribers,
            stats.auto_persist
        );
        logging::log!("  state: {}", self.all());
        let state = self.inner.state.borrow();
        for entry in &state.subscribers {
            logging::log!("  subscriber {} on `{}`", entry.id.0, entry.key);
        }
    }
}

fn read_path<'a>(root: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    let mut segments = key.split('.');
    let first = segments.next()?;
    let mut current = root.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn write_path(root: &mut Map<String, Value>, key: &str, value: Value) {
    let segments: Vec<&str> = key.split('.').collect();
    let Some((leaf, parents)) = segments.split_last() else {
        return;
    };

    let mut current = root;
    for segment in parents {
        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(next) = slot else {
            return;
        };
        current = next;
    }
    current.insert(leaf.to_string(), value);
}

fn remove_path(root: &mut Map<String, Value>, key: &str) {
    let segments: Vec<&str> = key.split('.').collect();
    let Some((leaf, parents)) = segments.split_last() else {
        return;
    };

    let mut current = root;
    for segment in parents {
        let Some(Value::Object(next)) = current.get_mut(*segment) else {
            return;
        };
        current = next;
    }
    current.remove(*leaf);
}

fn count_keys(map: &Map<String, Value>) -> usize {
    map.values().map(|value| 1 + count_nested(value)).sum()
}

fn count_nested(value: &Value) -> usize {
    match value {
        Value::Object(map) => count_keys(map),
        Value::Array(items) => items.iter().map(|item| 1 + count_nested(item)).sum(),
        _ => 0,
    }
}
