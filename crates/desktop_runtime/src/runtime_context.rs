//! Wiring for one desktop shell instance.
//!
//! [`DesktopRuntime`] owns the scheduler, event bus, store, window manager, gesture translator,
//! layout persistence bridge and app launcher, built from a [`ShellConfig`] against an injected
//! [`PrefsStore`]. Startup order matters: the store restores its durable record before the
//! window manager exists, so the layout bridge can replay saved windows.
//!
//! Deferred work stays queued on the [`Scheduler`] until something advances it. A browser runtime
//! attaches host timers for that; other runtimes are advanced by their owner.

use std::rc::Rc;

use leptos::logging;
use platform_host::{NoopPrefsStore, PrefsStore};

use crate::{
    apps::AppLauncher,
    config::{ConfigError, ShellConfig},
    drag_drop::DragDropManager,
    event_bus::{EventBus, EventRecord},
    host_timers,
    monitor::{self, DataSources, SystemStats, WindowRow},
    scheduler::Scheduler,
    state_manager::StateManager,
    store::{Store, StoreError},
    window_manager::WindowManager,
};

#[derive(Debug)]
pub struct DesktopRuntime {
    config: ShellConfig,
    scheduler: Scheduler,
    bus: EventBus,
    store: Store,
    windows: WindowManager,
    drag_drop: DragDropManager,
    state: StateManager,
    apps: AppLauncher,
    host_timers: bool,
}

impl DesktopRuntime {
    /// Builds every component from `config`, restoring the store record and window layout
    /// found in `prefs`.
    pub fn new(config: ShellConfig, prefs: Rc<dyn PrefsStore>) -> Self {
        let scheduler = Scheduler::new();
        let bus = EventBus::with_capacity(scheduler.clone(), config.event_log_capacity);

        let store = Store::with_settings(scheduler.clone(), prefs, config.store_settings());
        store.restore();
        if config.auto_persist {
            store.enable_auto_persist(config.persist_debounce_ms);
        }

        let windows = WindowManager::with_settings(
            scheduler.clone(),
            Some(bus.clone()),
            Some(store.clone()),
            config.window_settings(),
        );
        let state = StateManager::new(windows.clone(), Some(&bus), Some(store.clone()));
        let drag_drop = DragDropManager::with_header_height(windows.clone(), config.header_height);
        let apps = AppLauncher::new(windows.clone());

        logging::log!(
            "desktop runtime ready ({} window(s) restored)",
            windows.stats().total
        );
        Self {
            config,
            scheduler,
            bus,
            store,
            windows,
            drag_drop,
            state,
            apps,
            host_timers: false,
        }
    }

    /// Parses `raw` as a [`ShellConfig`] and builds the runtime from it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the document is malformed or invalid.
    pub fn from_toml_str(raw: &str, prefs: Rc<dyn PrefsStore>) -> Result<Self, ConfigError> {
        Ok(Self::new(ShellConfig::from_toml_str(raw)?, prefs))
    }

    /// Builds the runtime over the browser's durable preference storage, with the scheduler
    /// driven by browser timers when the host has them.
    pub fn browser(config: ShellConfig) -> Self {
        let mut runtime = Self::new(config, Rc::new(platform_host_web::prefs_store()));
        runtime.host_timers = host_timers::attach_browser_timers(&runtime.scheduler);
        runtime
    }

    /// Builds a runtime that keeps nothing across restarts.
    pub fn ephemeral(config: ShellConfig) -> Self {
        Self::new(config, Rc::new(NoopPrefsStore))
    }

    /// Returns `true` when host timers advance the scheduler.
    pub fn has_host_timers(&self) -> bool {
        self.host_timers
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn windows(&self) -> &WindowManager {
        &self.windows
    }

    pub fn drag_drop(&mut self) -> &mut DragDropManager {
        &mut self.drag_drop
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    pub fn apps(&self) -> &AppLauncher {
        &self.apps
    }

    pub fn apps_mut(&mut self) -> &mut AppLauncher {
        &mut self.apps
    }

    pub fn system_stats(&self) -> SystemStats {
        monitor::collect_system_stats(DataSources {
            windows: Some(&self.windows),
            bus: Some(&self.bus),
            store: Some(&self.store),
            apps: Some(&self.apps),
        })
    }

    pub fn window_rows(&self) -> Vec<WindowRow> {
        monitor::window_rows(&self.windows)
    }

    pub fn recent_events(&self, limit: usize) -> Vec<EventRecord> {
        monitor::recent_events(&self.bus, limit)
    }

    /// Runs every pending deferred task, then writes the store record immediately.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the final write fails.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.scheduler.run_until_idle();
        self.store.persist()
    }
}

#[cfg(test)]
mod tests {
    use platform_host::MemoryPrefsStore;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        model::{WindowRect, WINDOW_HEADER_HEIGHT},
        state_manager::PERSISTED_WINDOWS_KEY,
        window_manager::{WindowConfig, WINDOW_COUNT_KEY},
    };

    #[test]
    fn config_flows_into_components() {
        let runtime = DesktopRuntime::from_toml_str(
            "close_animation_ms = 50\nmin_window_width = 200\nstorage_key = \"test-shell\"\n",
            Rc::new(MemoryPrefsStore::default()),
        )
        .expect("runtime");
        assert_eq!(runtime.windows().settings().close_delay_ms, 50);
        assert_eq!(runtime.windows().settings().min_width, 200);
        assert_eq!(runtime.store().settings().storage_key, "test-shell");
        assert!(runtime.store().is_auto_persist());
        assert!(runtime.state().is_attached());
    }

    #[test]
    fn ephemeral_runtime_starts_empty_and_flushes_nowhere() {
        let runtime = DesktopRuntime::ephemeral(ShellConfig::default());
        runtime
            .windows()
            .create_window(WindowConfig::new("A").persistent(true))
            .expect("create");
        runtime.flush().expect("flush");
        assert_eq!(DesktopRuntime::ephemeral(ShellConfig::default()).windows().stats().total, 0);
    }

    #[test]
    fn headless_browser_runtime_leaves_deferred_work_to_its_owner() {
        let runtime = DesktopRuntime::browser(ShellConfig::default());
        assert!(!runtime.has_host_timers());
        assert!(!runtime.scheduler().has_waker());

        let id = runtime
            .windows()
            .create_window(WindowConfig::new("A"))
            .expect("create");
        runtime.windows().close_window(id);
        assert!(runtime.windows().contains(id));

        runtime.scheduler().run_until_idle();
        assert!(!runtime.windows().contains(id));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = DesktopRuntime::from_toml_str(
            "event_log_capacity = 0",
            Rc::new(MemoryPrefsStore::default()),
        )
        .expect_err("invalid");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn flush_writes_layout_without_waiting_for_debounce() {
        let prefs = MemoryPrefsStore::default();
        let runtime = DesktopRuntime::new(ShellConfig::default(), Rc::new(prefs.clone()));
        runtime
            .windows()
            .create_window(
                WindowConfig::new("Notes")
                    .with_rect(WindowRect::new(40, 50, 420, 310))
                    .persistent(true),
            )
            .expect("create");
        runtime.flush().expect("flush");

        let raw = prefs.raw("webdesk-store").expect("stored record");
        let record: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(record["state"]["windows"]["count"], 1);
        assert_eq!(
            record["state"]["persistence"]["windows"][0]["title"],
            "Notes"
        );
        assert!(runtime.store().has(PERSISTED_WINDOWS_KEY));
        assert_eq!(runtime.store().get(WINDOW_COUNT_KEY), Some(1.into()));
    }

    #[test]
    fn stats_cover_every_component() {
        let mut runtime =
            DesktopRuntime::new(ShellConfig::default(), Rc::new(MemoryPrefsStore::default()));
        let id = runtime
            .windows()
            .create_window(WindowConfig::new("A"))
            .expect("create");
        runtime.drag_drop().double_click(crate::model::PointerTarget::Header(id));

        let stats = runtime.system_stats();
        assert_eq!(stats.windows.total, 1);
        assert_eq!(stats.windows.maximized, 1);
        assert_eq!(stats.apps.registered, 0);
        assert_eq!(runtime.window_rows()[0].state, "maximized");
        assert_eq!(runtime.recent_events(1)[0].event, "window:maximized");
        assert_eq!(runtime.config().header_height, WINDOW_HEADER_HEIGHT);
    }
}
