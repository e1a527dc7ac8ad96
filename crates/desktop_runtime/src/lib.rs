//! Headless core of the browser desktop shell.
//!
//! Components are single-threaded cheap-clone handles that talk through the [`EventBus`] and
//! the [`Store`]. [`DesktopRuntime`] wires one instance of each from a [`ShellConfig`].

pub mod apps;
pub mod config;
pub mod drag_drop;
pub mod event_bus;
pub mod host_timers;
pub mod model;
pub mod monitor;
pub mod runtime_context;
pub mod scheduler;
pub mod state_manager;
pub mod store;
pub mod window_manager;

pub use apps::{
    AppContext, AppError, AppFactory, AppInstance, AppLauncher, AppRegistry, AppStats,
    LaunchOutcome,
};
pub use config::{ConfigError, ShellConfig};
pub use drag_drop::DragDropManager;
pub use event_bus::{
    topics, EventBus, EventBusStats, EventPattern, EventRecord, ListenerId, ListenerResult,
    Subscription,
};
pub use model::*;
pub use monitor::{collect_system_stats, DataSources, SystemStats};
pub use runtime_context::DesktopRuntime;
pub use scheduler::{Scheduler, TimerId, WeakScheduler};
pub use state_manager::StateManager;
pub use store::{Store, StoreChange, StoreError, StoreStats, StoreSubscription};
pub use window_manager::{
    WindowConfig, WindowError, WindowHandle, WindowManager, WindowManagerSettings,
};
