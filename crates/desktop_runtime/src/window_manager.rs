//! Authoritative window registry and lifecycle controller.
//!
//! The manager owns every [`WindowRecord`]; other components refer to windows by [`WindowId`]
//! and read clones through the accessors. Lifecycle transitions are published on the attached
//! [`EventBus`] and the focus/registry summary is mirrored into the attached [`Store`] under
//! `windows.active`, `windows.all` and `windows.count`.

use std::{
    cell::RefCell,
    collections::BTreeMap,
    fmt,
    rc::{Rc, Weak},
};

use leptos::logging;
use serde_json::{json, Value};
use thiserror::Error;

use crate::{
    event_bus::{topics, EventBus},
    model::{
        ResizeEdge, WindowId, WindowMode, WindowRecord, WindowRect, WindowStats,
        MIN_WINDOW_HEIGHT, MIN_WINDOW_WIDTH,
    },
    scheduler::Scheduler,
    store::Store,
};

/// Store key holding the active window id (or `null`).
pub const ACTIVE_WINDOW_KEY: &str = "windows.active";
/// Store key holding every registered window id.
pub const ALL_WINDOWS_KEY: &str = "windows.all";
/// Store key holding the number of registered windows.
pub const WINDOW_COUNT_KEY: &str = "windows.count";
/// Delay between a close request and the window's removal.
pub const DEFAULT_CLOSE_DELAY_MS: u64 = 200;
/// First z-index handed out; every create/focus takes the next value.
pub const DEFAULT_INITIAL_Z_INDEX: u32 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Window creation failures.
pub enum WindowError {
    /// The window title is empty or whitespace.
    #[error("window title must not be empty")]
    EmptyTitle,
    /// The requested size is not positive.
    #[error("window size must be positive, got {width}x{height}")]
    InvalidSize { width: i32, height: i32 },
}

type CreatedCallback = Box<dyn FnOnce(WindowHandle)>;

/// Parameters for [`WindowManager::create_window`].
pub struct WindowConfig {
    pub title: String,
    pub rect: WindowRect,
    pub content: String,
    pub persistent: bool,
    on_created: Option<CreatedCallback>,
}

impl fmt::Debug for WindowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowConfig")
            .field("title", &self.title)
            .field("rect", &self.rect)
            .field("content", &self.content)
            .field("persistent", &self.persistent)
            .field("on_created", &self.on_created.is_some())
            .finish()
    }
}

impl WindowConfig {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            rect: WindowRect::default(),
            content: String::new(),
            persistent: false,
            on_created: None,
        }
    }

    pub fn with_rect(mut self, rect: WindowRect) -> Self {
        self.rect = rect;
        self
    }

    pub fn with_position(mut self, x: i32, y: i32) -> Self {
        self.rect = self.rect.with_origin(x, y);
        self
    }

    pub fn with_size(mut self, width: i32, height: i32) -> Self {
        self.rect.w = width;
        self.rect.h = height;
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Runs `callback` on the scheduler tick after creation completes.
    pub fn on_created(mut self, callback: impl FnOnce(WindowHandle) + 'static) -> Self {
        self.on_created = Some(Box::new(callback));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowManagerSettings {
    pub min_width: i32,
    pub min_height: i32,
    pub initial_z_index: u32,
    pub close_delay_ms: u64,
    /// Geometry applied to maximized windows.
    pub viewport: WindowRect,
}

impl Default for WindowManagerSettings {
    fn default() -> Self {
        Self {
            min_width: MIN_WINDOW_WIDTH,
            min_height: MIN_WINDOW_HEIGHT,
            initial_z_index: DEFAULT_INITIAL_Z_INDEX,
            close_delay_ms: DEFAULT_CLOSE_DELAY_MS,
            viewport: WindowRect::new(0, 0, 1280, 720),
        }
    }
}

#[derive(Debug)]
struct WindowManagerState {
    windows: BTreeMap<WindowId, WindowRecord>,
    active: Option<WindowId>,
    z_index: u32,
    next_id: u64,
    viewport: WindowRect,
}

struct WindowManagerInner {
    state: RefCell<WindowManagerState>,
    settings: WindowManagerSettings,
    scheduler: Scheduler,
    bus: Option<EventBus>,
    store: Option<Store>,
}

#[derive(Clone)]
/// Cheap clonable handle to one window manager.
pub struct WindowManager {
    inner: Rc<WindowManagerInner>,
}

impl fmt::Debug for WindowManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowManager")
            .field("state", &self.inner.state.borrow())
            .finish()
    }
}

#[derive(Clone, Default)]
/// Non-owning handle held by listeners and deferred tasks.
pub struct WeakWindowManager {
    inner: Weak<WindowManagerInner>,
}

impl WeakWindowManager {
    pub fn upgrade(&self) -> Option<WindowManager> {
        self.inner.upgrade().map(|inner| WindowManager { inner })
    }
}

#[derive(Clone)]
/// Handle to one window, passed to creation callbacks.
pub struct WindowHandle {
    id: WindowId,
    manager: WeakWindowManager,
}

impl fmt::Debug for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowHandle").field("id", &self.id).finish()
    }
}

impl WindowHandle {
    pub fn id(&self) -> WindowId {
        self.id
    }

    /// Current record, or `None` once the window or its manager is gone.
    pub fn record(&self) -> Option<WindowRecord> {
        self.manager.upgrade()?.window(self.id)
    }

    pub fn set_content(&self, content: impl Into<String>) -> bool {
        self.manager
            .upgrade()
            .map_or(false, |manager| manager.set_content(self.id, content))
    }

    pub fn focus(&self) -> bool {
        self.manager
            .upgrade()
            .map_or(false, |manager| manager.focus_window(self.id))
    }

    pub fn close(&self) -> bool {
        self.manager
            .upgrade()
            .map_or(false, |manager| manager.close_window(self.id))
    }
}

impl WindowManager {
    pub fn new(scheduler: Scheduler, bus: Option<EventBus>, store: Option<Store>) -> Self {
        Self::with_settings(scheduler, bus, store, WindowManagerSettings::default())
    }

    pub fn with_settings(
        scheduler: Scheduler,
        bus: Option<EventBus>,
        store: Option<Store>,
        settings: WindowManagerSettings,
    ) -> Self {
        logging::log!(
            "window manager initialized (event bus: {}, store: {})",
            bus.is_some(),
            store.is_some()
        );
        Self {
            inner: Rc::new(WindowManagerInner {
                state: RefCell::new(WindowManagerState {
                    windows: BTreeMap::new(),
                    active: None,
                    z_index: settings.initial_z_index,
                    next_id: 1,
                    viewport: settings.viewport,
                }),
                settings,
                scheduler,
                bus,
                store,
            }),
        }
    }

    pub fn downgrade(&self) -> WeakWindowManager {
        WeakWindowManager {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn settings(&self) -> &WindowManagerSettings {
        &self.inner.settings
    }

    pub fn bus(&self) -> Option<&EventBus> {
        self.inner.bus.as_ref()
    }

    pub fn store(&self) -> Option<&Store> {
        self.inner.store.as_ref()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    fn emit(&self, event: &str, data: Value) {
        if let Some(bus) = &self.inner.bus {
            bus.emit(event, data);
        }
    }

    /// Registers a new window, focuses it and emits `window:created`.
    ///
    /// The size is raised to the configured minimum. The optional creation callback runs on the
    /// next scheduler tick.
    ///
    /// # Errors
    ///
    /// Returns [`WindowError`] when the title is empty or the size is not positive.
    pub fn create_window(&self, config: WindowConfig) -> Result<WindowId, WindowError> {
        let WindowConfig {
            title,
            rect,
            content,
            persistent,
            on_created,
        } = config;
        if title.trim().is_empty() {
            return Err(WindowError::EmptyTitle);
        }
        if rect.w <= 0 || rect.h <= 0 {
            return Err(WindowError::InvalidSize {
                width: rect.w,
                height: rect.h,
            });
        }

        let settings = self.inner.settings;
        let rect = rect.clamped_min(settings.min_width, settings.min_height);
        let id = {
            let mut state = self.inner.state.borrow_mut();
            let id = WindowId(state.next_id);
            state.next_id += 1;
            let z_index = state.z_index;
            state.windows.insert(
                id,
                WindowRecord {
                    id,
                    title: title.clone(),
                    rect,
                    content,
                    persistent,
                    mode: WindowMode::Normal,
                    z_index,
                    closing: false,
                },
            );
            id
        };

        self.focus_window(id);
        self.emit(
            topics::WINDOW_CREATED,
            json!({ "windowId": id, "title": title, "x": rect.x, "y": rect.y }),
        );

        if let Some(callback) = on_created {
            let handle = WindowHandle {
                id,
                manager: self.downgrade(),
            };
            self.inner.scheduler.set_timeout(0, move || callback(handle));
        }
        Ok(id)
    }

    /// Raises and activates `id`, restoring it first when minimized.
    ///
    /// Returns `false` for unknown or closing windows.
    pub fn focus_window(&self, id: WindowId) -> bool {
        let was_minimized = {
            let mut state = self.inner.state.borrow_mut();
            let next_z = state.z_index + 1;
            let Some(record) = state.windows.get_mut(&id) else {
                return false;
            };
            if record.closing {
                return false;
            }
            let was_minimized = record.is_minimized();
            if was_minimized {
                record.mode = WindowMode::Normal;
            }
            record.z_index = next_z;
            state.z_index = next_z;
            state.active = Some(id);
            was_minimized
        };

        if was_minimized {
            self.emit(topics::WINDOW_RESTORED, json!({ "windowId": id }));
        }
        self.emit(topics::WINDOW_FOCUSED, json!({ "windowId": id }));
        if let Some(store) = &self.inner.store {
            store.set(ACTIVE_WINDOW_KEY, json!(id));
        }
        self.publish_registry();
        true
    }

    /// Minimizes `id`. A maximized window first returns to its normal geometry.
    ///
    /// Returns `true` only on the transition; minimizing twice is a no-op.
    pub fn minimize_window(&self, id: WindowId) -> bool {
        let was_active = {
            let mut state = self.inner.state.borrow_mut();
            let Some(record) = state.windows.get_mut(&id) else {
                return false;
            };
            if record.closing || record.is_minimized() {
                return false;
            }
            record.rect = record.normal_rect();
            record.mode = WindowMode::Minimized;
            let was_active = state.active == Some(id);
            if was_active {
                state.active = None;
            }
            was_active
        };

        if was_active {
            if let Some(store) = &self.inner.store {
                store.set(ACTIVE_WINDOW_KEY, Value::Null);
            }
        }
        self.emit(topics::WINDOW_MINIMIZED, json!({ "windowId": id }));
        true
    }

    /// Toggles `id` between maximized and normal geometry.
    ///
    /// Maximizing a minimized window also focuses it.
    pub fn maximize_window(&self, id: WindowId) -> bool {
        let settings = self.inner.settings;
        let (maximized, was_minimized) = {
            let mut state = self.inner.state.borrow_mut();
            let viewport = state.viewport;
            let Some(record) = state.windows.get_mut(&id) else {
                return false;
            };
            if record.closing {
                return false;
            }
            match record.mode {
                WindowMode::Maximized { restore_rect } => {
                    record.rect = restore_rect;
                    record.mode = WindowMode::Normal;
                    (false, false)
                }
                mode => {
                    let was_minimized = mode == WindowMode::Minimized;
                    record.mode = WindowMode::Maximized {
                        restore_rect: record.rect,
                    };
                    record.rect = viewport.clamped_min(settings.min_width, settings.min_height);
                    (true, was_minimized)
                }
            }
        };

        if maximized {
            self.emit(topics::WINDOW_MAXIMIZED, json!({ "windowId": id }));
            if was_minimized {
                self.focus_window(id);
            }
        } else {
            self.emit(topics::WINDOW_RESTORED, json!({ "windowId": id }));
        }
        true
    }

    /// Taskbar click: restore a minimized window, minimize the active one, focus any other.
    pub fn toggle_window(&self, id: WindowId) -> bool {
        let (minimized, active) = {
            let state = self.inner.state.borrow();
            let Some(record) = state.windows.get(&id) else {
                return false;
            };
            (record.is_minimized(), state.active == Some(id))
        };

        if minimized {
            self.focus_window(id)
        } else if active {
            self.minimize_window(id)
        } else {
            self.focus_window(id)
        }
    }

    /// Starts closing `id`; the window is removed after the close delay.
    ///
    /// Returns `false` for unknown windows and windows already closing.
    pub fn close_window(&self, id: WindowId) -> bool {
        {
            let mut state = self.inner.state.borrow_mut();
            let Some(record) = state.windows.get_mut(&id) else {
                return false;
            };
            if record.closing {
                return false;
            }
            record.closing = true;
            if state.active == Some(id) {
                state.active = None;
            }
        }

        let weak = self.downgrade();
        self.inner
            .scheduler
            .set_timeout(self.inner.settings.close_delay_ms, move || {
                if let Some(manager) = weak.upgrade() {
                    manager.finish_close(id);
                }
            });
        true
    }

    fn finish_close(&self, id: WindowId) {
        if self.inner.state.borrow_mut().windows.remove(&id).is_none() {
            return;
        }

        self.emit(topics::WINDOW_CLOSED, json!({ "windowId": id }));
        self.publish_registry();
        if let Some(store) = &self.inner.store {
            if store.get(ACTIVE_WINDOW_KEY) == Some(json!(id)) {
                store.set(ACTIVE_WINDOW_KEY, Value::Null);
            }
        }
    }

    fn publish_registry(&self) {
        let Some(store) = &self.inner.store else {
            return;
        };
        let ids = self.window_ids();
        store.set(WINDOW_COUNT_KEY, ids.len());
        store.set(ALL_WINDOWS_KEY, json!(ids));
    }

    /// Moves or resizes a normal or minimized window. Maximized windows keep the viewport.
    pub fn set_window_rect(&self, id: WindowId, rect: WindowRect) -> bool {
        let settings = self.inner.settings;
        let mut state = self.inner.state.borrow_mut();
        let Some(record) = state.windows.get_mut(&id) else {
            return false;
        };
        if record.closing || record.is_maximized() {
            return false;
        }
        record.rect = rect.clamped_min(settings.min_width, settings.min_height);
        true
    }

    pub fn set_title(&self, id: WindowId, title: impl Into<String>) -> bool {
        self.update(id, |record| record.title = title.into())
    }

    pub fn set_content(&self, id: WindowId, content: impl Into<String>) -> bool {
        self.update(id, |record| record.content = content.into())
    }

    fn update(&self, id: WindowId, apply: impl FnOnce(&mut WindowRecord)) -> bool {
        let mut state = self.inner.state.borrow_mut();
        let Some(record) = state.windows.get_mut(&id) else {
            return false;
        };
        apply(record);
        true
    }

    /// Replaces the maximize geometry and refits windows that are currently maximized.
    pub fn set_viewport(&self, viewport: WindowRect) {
        let settings = self.inner.settings;
        let fitted = viewport.clamped_min(settings.min_width, settings.min_height);
        let mut state = self.inner.state.borrow_mut();
        state.viewport = viewport;
        for record in state.windows.values_mut() {
            if record.is_maximized() {
                record.rect = fitted;
            }
        }
    }

    pub fn viewport(&self) -> WindowRect {
        self.inner.state.borrow().viewport
    }

    pub fn window(&self, id: WindowId) -> Option<WindowRecord> {
        self.inner.state.borrow().windows.get(&id).cloned()
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.inner.state.borrow().windows.contains_key(&id)
    }

    /// Snapshot of every registered window, ordered by id.
    pub fn windows(&self) -> Vec<WindowRecord> {
        self.inner.state.borrow().windows.values().cloned().collect()
    }

    pub fn window_ids(&self) -> Vec<WindowId> {
        self.inner.state.borrow().windows.keys().copied().collect()
    }

    pub fn active_window(&self) -> Option<WindowId> {
        self.inner.state.borrow().active
    }

    pub fn stats(&self) -> WindowStats {
        let state = self.inner.state.borrow();
        let mut stats = WindowStats {
            total: state.windows.len(),
            active: state.active,
            z_index: state.z_index,
            ..WindowStats::default()
        };
        for record in state.windows.values() {
            match record.mode {
                WindowMode::Normal => stats.normal += 1,
                WindowMode::Minimized => stats.minimized += 1,
                WindowMode::Maximized { .. } => stats.maximized += 1,
            }
        }
        stats
    }
}

/// Applies a resize delta for the grabbed edge or corner.
///
/// Width and height never drop below the minimums; when a west or north edge hits the minimum
/// the opposite edge stays fixed.
pub fn resize_rect(
    start: WindowRect,
    edge: ResizeEdge,
    dx: i32,
    dy: i32,
    min_w: i32,
    min_h: i32,
) -> WindowRect {
    let mut rect = start;
    if edge.moves_east() {
        rect.w = (start.w + dx).max(min_w);
    }
    if edge.moves_west() {
        rect.w = (start.w - dx).max(min_w);
        rect.x = start.x + start.w - rect.w;
    }
    if edge.moves_south() {
        rect.h = (start.h + dy).max(min_h);
    }
    if edge.moves_north() {
        rect.h = (start.h - dy).max(min_h);
        rect.y = start.y + start.h - rect.h;
    }
    rect
}

#[cfg(test)]
mod tests {
    use platform_host::MemoryPrefsStore;
    use pretty_assertions::assert_eq;

    use super::*;

    struct Fixture {
        scheduler: Scheduler,
        bus: EventBus,
        store: Store,
        windows: WindowManager,
    }

    fn fixture() -> Fixture {
        let scheduler = Scheduler::new();
        let bus = EventBus::new(scheduler.clone());
        let store = Store::new(scheduler.clone(), Rc::new(MemoryPrefsStore::default()));
        let windows = WindowManager::new(scheduler.clone(), Some(bus.clone()), Some(store.clone()));
        Fixture {
            scheduler,
            bus,
            store,
            windows,
        }
    }

    fn open(windows: &WindowManager, title: &str, rect: WindowRect) -> WindowId {
        windows
            .create_window(WindowConfig::new(title).with_rect(rect))
            .expect("create window")
    }

    fn event_names(bus: &EventBus) -> Vec<String> {
        bus.log(100).into_iter().map(|record| record.event).collect()
    }

    #[test]
    fn create_focuses_then_announces_window() {
        let fx = fixture();
        let id = open(&fx.windows, "Notes", WindowRect::new(10, 20, 500, 350));

        assert_eq!(fx.windows.active_window(), Some(id));
        assert_eq!(
            event_names(&fx.bus),
            vec!["window:focused".to_string(), "window:created".to_string()]
        );
        let created = fx.bus.log(1).remove(0);
        assert_eq!(
            created.data,
            json!({ "windowId": 1, "title": "Notes", "x": 10, "y": 20 })
        );
        assert_eq!(fx.store.get(ACTIVE_WINDOW_KEY), Some(json!(1)));
        assert_eq!(fx.store.get(WINDOW_COUNT_KEY), Some(json!(1)));
        assert_eq!(fx.store.get(ALL_WINDOWS_KEY), Some(json!([1])));
    }

    #[test]
    fn each_new_window_stacks_above_the_last() {
        let fx = fixture();
        let first = open(&fx.windows, "A", WindowRect::new(0, 0, 400, 300));
        let second = open(&fx.windows, "B", WindowRect::new(0, 0, 400, 300));
        let z = |id| fx.windows.window(id).expect("window").z_index;
        assert!(z(second) > z(first));
        assert_eq!(fx.windows.windows().len(), 2);
    }

    #[test]
    fn create_rejects_invalid_config_and_clamps_small_sizes() {
        let fx = fixture();
        assert_eq!(
            fx.windows.create_window(WindowConfig::new("  ")),
            Err(WindowError::EmptyTitle)
        );
        assert_eq!(
            fx.windows
                .create_window(WindowConfig::new("Zero").with_size(0, 200)),
            Err(WindowError::InvalidSize {
                width: 0,
                height: 200
            })
        );

        let id = open(&fx.windows, "Tiny", WindowRect::new(0, 0, 50, 40));
        let rect = fx.windows.window(id).expect("window").rect;
        assert_eq!((rect.w, rect.h), (MIN_WINDOW_WIDTH, MIN_WINDOW_HEIGHT));
    }

    #[test]
    fn creation_callback_runs_on_next_tick() {
        let fx = fixture();
        let seen = Rc::new(RefCell::new(None));
        let sink = seen.clone();
        let id = fx
            .windows
            .create_window(WindowConfig::new("Later").on_created(move |handle| {
                handle.set_content("<p>ready</p>");
                *sink.borrow_mut() = handle.record().map(|record| record.content);
            }))
            .expect("create");

        assert_eq!(*seen.borrow(), None);
        fx.scheduler.tick();
        assert_eq!(*seen.borrow(), Some("<p>ready</p>".to_string()));
        assert_eq!(fx.windows.window(id).expect("window").content, "<p>ready</p>");
    }

    #[test]
    fn z_index_strictly_increases_with_each_focus() {
        let fx = fixture();
        let a = open(&fx.windows, "A", WindowRect::new(100, 100, 400, 300));
        let b = open(&fx.windows, "B", WindowRect::new(150, 150, 400, 300));
        let z = |id| fx.windows.window(id).expect("window").z_index;

        assert!(z(b) > z(a));
        fx.windows.focus_window(a);
        assert!(z(a) > z(b));
        assert_eq!(fx.windows.stats().z_index, z(a));
        assert!(!fx.windows.focus_window(WindowId(99)));
    }

    #[test]
    fn minimize_clears_active_and_is_idempotent() {
        let fx = fixture();
        let id = open(&fx.windows, "A", WindowRect::new(0, 0, 400, 300));

        assert!(fx.windows.minimize_window(id));
        assert!(!fx.windows.minimize_window(id));
        assert_eq!(fx.windows.active_window(), None);
        assert_eq!(fx.store.get(ACTIVE_WINDOW_KEY), Some(Value::Null));
        let minimized = event_names(&fx.bus)
            .into_iter()
            .filter(|name| name == topics::WINDOW_MINIMIZED)
            .count();
        assert_eq!(minimized, 1);
    }

    #[test]
    fn maximize_twice_restores_exact_geometry() {
        let fx = fixture();
        let start = WindowRect::new(33, 44, 512, 384);
        let id = open(&fx.windows, "A", start);

        assert!(fx.windows.maximize_window(id));
        let maximized = fx.windows.window(id).expect("window");
        assert_eq!(maximized.rect, fx.windows.viewport());
        assert_eq!(maximized.restore_rect(), Some(start));

        assert!(fx.windows.maximize_window(id));
        let restored = fx.windows.window(id).expect("window");
        assert_eq!(restored.rect, start);
        assert_eq!(restored.mode, WindowMode::Normal);
        assert_eq!(
            event_names(&fx.bus)[2..].to_vec(),
            vec!["window:maximized".to_string(), "window:restored".to_string()]
        );
    }

    #[test]
    fn minimizing_a_maximized_window_restores_geometry_first() {
        let fx = fixture();
        let start = WindowRect::new(10, 10, 420, 320);
        let id = open(&fx.windows, "A", start);
        fx.windows.maximize_window(id);
        fx.windows.minimize_window(id);

        let record = fx.windows.window(id).expect("window");
        assert_eq!(record.mode, WindowMode::Minimized);
        assert_eq!(record.rect, start);
    }

    #[test]
    fn toggle_follows_taskbar_contract() {
        let fx = fixture();
        let a = open(&fx.windows, "A", WindowRect::new(100, 100, 400, 300));
        let b = open(&fx.windows, "B", WindowRect::new(150, 150, 400, 300));

        fx.windows.toggle_window(b);
        assert!(fx.windows.window(b).expect("b").is_minimized());
        assert_eq!(fx.windows.active_window(), None);

        fx.windows.toggle_window(b);
        assert_eq!(fx.windows.active_window(), Some(b));
        assert!(!fx.windows.window(b).expect("b").is_minimized());

        fx.windows.toggle_window(a);
        assert_eq!(fx.windows.active_window(), Some(a));
    }

    #[test]
    fn close_removes_window_after_delay() {
        let fx = fixture();
        let a = open(&fx.windows, "A", WindowRect::new(0, 0, 400, 300));
        let b = open(&fx.windows, "B", WindowRect::new(0, 0, 400, 300));

        assert!(fx.windows.close_window(b));
        assert!(!fx.windows.close_window(b));
        assert!(fx.windows.window(b).expect("closing").closing);
        assert_eq!(fx.windows.active_window(), None);
        assert!(!fx.windows.focus_window(b));

        fx.scheduler.advance(DEFAULT_CLOSE_DELAY_MS - 1);
        assert!(fx.windows.contains(b));
        fx.scheduler.advance(1);
        assert!(!fx.windows.contains(b));

        assert_eq!(fx.store.get(ALL_WINDOWS_KEY), Some(json!([a.0])));
        assert_eq!(fx.store.get(WINDOW_COUNT_KEY), Some(json!(1)));
        assert_eq!(fx.store.get(ACTIVE_WINDOW_KEY), Some(Value::Null));
        assert_eq!(fx.bus.log(1)[0].event, topics::WINDOW_CLOSED);
    }

    #[test]
    fn closing_an_inactive_window_keeps_active_key() {
        let fx = fixture();
        let a = open(&fx.windows, "A", WindowRect::new(0, 0, 400, 300));
        let b = open(&fx.windows, "B", WindowRect::new(0, 0, 400, 300));
        fx.windows.close_window(a);
        fx.scheduler.run_until_idle();
        assert_eq!(fx.store.get(ACTIVE_WINDOW_KEY), Some(json!(b.0)));
    }

    #[test]
    fn set_window_rect_is_refused_while_maximized() {
        let fx = fixture();
        let id = open(&fx.windows, "A", WindowRect::new(0, 0, 400, 300));
        fx.windows.maximize_window(id);
        assert!(!fx.windows.set_window_rect(id, WindowRect::new(5, 5, 500, 500)));

        fx.windows.maximize_window(id);
        assert!(fx.windows.set_window_rect(id, WindowRect::new(5, 5, 10, 10)));
        assert_eq!(
            fx.windows.window(id).expect("window").rect,
            WindowRect::new(5, 5, MIN_WINDOW_WIDTH, MIN_WINDOW_HEIGHT)
        );
    }

    #[test]
    fn viewport_change_refits_maximized_windows() {
        let fx = fixture();
        let id = open(&fx.windows, "A", WindowRect::new(0, 0, 400, 300));
        fx.windows.maximize_window(id);
        fx.windows.set_viewport(WindowRect::new(0, 0, 1920, 1040));
        assert_eq!(
            fx.windows.window(id).expect("window").rect,
            WindowRect::new(0, 0, 1920, 1040)
        );
    }

    #[test]
    fn stats_count_display_modes() {
        let fx = fixture();
        let a = open(&fx.windows, "A", WindowRect::new(0, 0, 400, 300));
        let b = open(&fx.windows, "B", WindowRect::new(0, 0, 400, 300));
        open(&fx.windows, "C", WindowRect::new(0, 0, 400, 300));
        fx.windows.minimize_window(a);
        fx.windows.maximize_window(b);

        let stats = fx.windows.stats();
        assert_eq!(
            (stats.total, stats.minimized, stats.maximized, stats.normal),
            (3, 1, 1, 1)
        );
    }

    #[test]
    fn works_without_bus_or_store() {
        let windows = WindowManager::new(Scheduler::new(), None, None);
        let id = open(&windows, "Solo", WindowRect::new(0, 0, 400, 300));
        assert!(windows.toggle_window(id));
        assert_eq!(windows.active_window(), None);
    }

    #[test]
    fn resize_west_and_north_keep_opposite_edges_fixed() {
        let start = WindowRect::new(100, 100, 500, 400);

        let grown = resize_rect(start, ResizeEdge::NorthWest, -20, -10, 400, 300);
        assert_eq!(grown, WindowRect::new(80, 90, 520, 410));

        let clamped = resize_rect(start, ResizeEdge::NorthWest, 300, 300, 400, 300);
        assert_eq!(clamped, WindowRect::new(200, 200, 400, 300));

        let south_east = resize_rect(start, ResizeEdge::SouthEast, -500, 25, 400, 300);
        assert_eq!(south_east, WindowRect::new(100, 100, 400, 425));
    }
}
