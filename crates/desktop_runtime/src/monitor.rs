//! Read-only snapshots for the process monitor.

use platform_host::unix_time_ms_now;
use serde::Serialize;

use crate::{
    apps::{AppLauncher, AppStats},
    event_bus::{EventBus, EventBusStats, EventRecord},
    model::{WindowId, WindowRect, WindowStats},
    store::{Store, StoreStats},
    window_manager::WindowManager,
};

/// Components a snapshot is collected from. Missing components report empty stats.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataSources<'a> {
    pub windows: Option<&'a WindowManager>,
    pub bus: Option<&'a EventBus>,
    pub store: Option<&'a Store>,
    pub apps: Option<&'a AppLauncher>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemStats {
    pub windows: WindowStats,
    pub apps: AppStats,
    pub events: EventBusStats,
    pub store: StoreStats,
    pub timestamp_unix_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowRow {
    pub id: WindowId,
    pub title: String,
    pub state: &'static str,
    pub z_index: u32,
    pub active: bool,
    pub persistent: bool,
    pub rect: WindowRect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppRow {
    pub id: String,
    pub name: String,
    pub windows: usize,
}

pub fn collect_system_stats(sources: DataSources<'_>) -> SystemStats {
    SystemStats {
        windows: sources.windows.map(WindowManager::stats).unwrap_or_default(),
        apps: sources.apps.map(AppLauncher::stats).unwrap_or_default(),
        events: sources.bus.map(EventBus::stats).unwrap_or_default(),
        store: sources.store.map(Store::stats).unwrap_or_default(),
        timestamp_unix_ms: unix_time_ms_now(),
    }
}

/// Window table, topmost first.
pub fn window_rows(windows: &WindowManager) -> Vec<WindowRow> {
    let active = windows.active_window();
    let mut rows: Vec<WindowRow> = windows
        .windows()
        .into_iter()
        .map(|record| WindowRow {
            id: record.id,
            state: record.state_label(),
            z_index: record.z_index,
            active: active == Some(record.id),
            persistent: record.persistent,
            rect: record.rect,
            title: record.title,
        })
        .collect();
    rows.sort_by(|a, b| b.z_index.cmp(&a.z_index));
    rows
}

pub fn running_app_rows(apps: &AppLauncher) -> Vec<AppRow> {
    apps.running_apps()
        .into_iter()
        .map(|id| AppRow {
            name: apps
                .registry()
                .get(&id)
                .map_or_else(|| id.clone(), |manifest| manifest.name.clone()),
            windows: apps.app_windows(&id).len(),
            id,
        })
        .collect()
}

pub fn recent_events(bus: &EventBus, limit: usize) -> Vec<EventRecord> {
    bus.log(limit)
}
