//! Window layout persistence bridge.
//!
//! Listens to window lifecycle events and mirrors a [`PersistedWindow`] snapshot of every open
//! window into the store; at startup recreates the windows flagged persistent. Window content
//! is not part of the snapshot, so restored windows show a placeholder.

use leptos::logging;
use serde_json::Value;

use crate::{
    event_bus::{topics, EventBus, Subscription},
    model::{PersistedWindow, WindowId},
    store::Store,
    window_manager::{WindowConfig, WindowError, WindowManager},
};

/// Store key holding the window layout snapshot.
pub const PERSISTED_WINDOWS_KEY: &str = "persistence.windows";
/// Content given to windows recreated from a snapshot.
pub const RESTORED_WINDOW_CONTENT: &str =
    "<div style=\"padding: 20px;\">Restored window - content not preserved</div>";
/// Events after which the snapshot is rewritten.
pub const SNAPSHOT_EVENTS: [&str; 8] = [
    topics::WINDOW_CREATED,
    topics::WINDOW_CLOSED,
    topics::WINDOW_FOCUSED,
    topics::WINDOW_MOVED,
    topics::WINDOW_RESIZED,
    topics::WINDOW_MINIMIZED,
    topics::WINDOW_MAXIMIZED,
    topics::WINDOW_RESTORED,
];

#[derive(Debug)]
pub struct StateManager {
    windows: WindowManager,
    store: Option<Store>,
    subscriptions: Vec<Subscription>,
}

impl StateManager {
    /// Subscribes to window events when a bus is given, then replays the stored layout when a
    /// store is given.
    pub fn new(windows: WindowManager, bus: Option<&EventBus>, store: Option<Store>) -> Self {
        logging::log!(
            "state manager initialized (event bus: {}, store: {})",
            bus.is_some(),
            store.is_some()
        );
        let subscriptions = bus
            .map(|bus| subscribe_snapshot_events(bus, &windows, store.as_ref()))
            .unwrap_or_default();
        let manager = Self {
            windows,
            store,
            subscriptions,
        };
        manager.restore_window_state();
        manager
    }

    /// Writes the snapshot now. Returns the number of windows saved.
    pub fn save_window_state(&self) -> usize {
        self.store
            .as_ref()
            .map_or(0, |store| save_snapshot(&self.windows, store))
    }

    /// Recreates every persistent window in the stored snapshot. Returns the number restored.
    ///
    /// Entries are decoded and recreated one at a time; a failing entry is logged and skipped.
    pub fn restore_window_state(&self) -> usize {
        let Some(store) = &self.store else {
            return 0;
        };
        let entries = match store.get(PERSISTED_WINDOWS_KEY) {
            Some(Value::Array(entries)) if !entries.is_empty() => entries,
            Some(Value::Array(_)) | None => {
                logging::log!("no windows to restore");
                return 0;
            }
            Some(other) => {
                logging::warn!("ignoring malformed window snapshot: {other}");
                return 0;
            }
        };

        logging::log!("restoring up to {} window(s)", entries.len());
        let mut restored = 0;
        for entry in entries {
            let persisted: PersistedWindow = match serde_json::from_value(entry) {
                Ok(persisted) => persisted,
                Err(err) => {
                    logging::error!("failed to decode persisted window: {err}");
                    continue;
                }
            };
            if !persisted.persistent {
                continue;
            }
            match self.restore_window(&persisted) {
                Ok(_) => restored += 1,
                Err(err) => logging::error!("failed to restore window {}: {err}", persisted.id),
            }
        }
        restored
    }

    fn restore_window(&self, persisted: &PersistedWindow) -> Result<WindowId, WindowError> {
        let id = self.windows.create_window(
            WindowConfig::new(persisted.title.clone())
                .with_rect(persisted.rect())
                .with_content(RESTORED_WINDOW_CONTENT)
                .persistent(true),
        )?;
        if persisted.maximized {
            self.windows.maximize_window(id);
        } else if persisted.minimized {
            self.windows.minimize_window(id);
        }
        Ok(id)
    }

    /// Deletes the stored snapshot.
    pub fn clear_state(&self) {
        if let Some(store) = &self.store {
            store.delete(PERSISTED_WINDOWS_KEY);
            logging::log!("window state cleared");
        }
    }

    /// Stops listening to window events.
    pub fn detach(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
    }

    pub fn is_attached(&self) -> bool {
        !self.subscriptions.is_empty()
    }
}

fn subscribe_snapshot_events(
    bus: &EventBus,
    windows: &WindowManager,
    store: Option<&Store>,
) -> Vec<Subscription> {
    SNAPSHOT_EVENTS
        .iter()
        .map(|event| {
            let windows = windows.downgrade();
            let store = store.cloned();
            bus.on(event, move |_| {
                if let (Some(windows), Some(store)) = (windows.upgrade(), store.as_ref()) {
                    save_snapshot(&windows, store);
                }
                Ok(())
            })
        })
        .collect()
}

fn save_snapshot(windows: &WindowManager, store: &Store) -> usize {
    let snapshot: Vec<PersistedWindow> = windows
        .windows()
        .iter()
        .filter(|record| !record.closing)
        .map(PersistedWindow::from_record)
        .collect();
    match store.set_serialized(PERSISTED_WINDOWS_KEY, &snapshot) {
        Ok(_) => snapshot.len(),
        Err(err) => {
            logging::error!("failed to save window state: {err}");
            0
        }
    }
}
