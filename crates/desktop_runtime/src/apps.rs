//! Application registry and launcher.
//!
//! Apps are described by [`AppManifest`]s and built by [`AppFactory`] implementations keyed by
//! app id. An app id runs at most once; launching a running app focuses its window instead.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
    rc::Rc,
};

use desktop_app_contract::{AppManifest, ManifestError};
use leptos::logging;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::{
    event_bus::{topics, EventBus},
    model::{WindowId, WindowRect},
    store::Store,
    window_manager::{WindowConfig, WindowError, WindowManager},
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("application `{0}` is already registered")]
    AlreadyRegistered(String),
    #[error("application not found: {0}")]
    NotFound(String),
    #[error("no factory registered for application `{0}`")]
    NoFactory(String),
    #[error("failed to launch application `{id}`: {message}")]
    Launch { id: String, message: String },
    #[error("failed to close application `{id}`: {message}")]
    Close { id: String, message: String },
}

/// A running application.
pub trait AppInstance {
    /// Windows currently owned by the app.
    fn window_ids(&self) -> Vec<WindowId>;

    /// Called once after the instance is built.
    fn open(&mut self) -> Result<(), String> {
        Ok(())
    }

    /// Called when the launcher closes the app. An `Err` keeps the app running.
    fn close(&mut self) -> Result<(), String> {
        Ok(())
    }
}

/// Builds app instances for one app id.
pub trait AppFactory {
    fn create(&self, context: AppContext) -> Result<Box<dyn AppInstance>, String>;
}

impl<F> AppFactory for F
where
    F: Fn(AppContext) -> Result<Box<dyn AppInstance>, String>,
{
    fn create(&self, context: AppContext) -> Result<Box<dyn AppInstance>, String> {
        self(context)
    }
}

#[derive(Debug, Clone)]
/// Services handed to an app when it is built.
pub struct AppContext {
    pub manifest: AppManifest,
    pub windows: WindowManager,
    pub bus: Option<EventBus>,
    pub store: Option<Store>,
}

impl AppContext {
    /// Opens a window titled with the app name using the manifest's default size.
    ///
    /// # Errors
    ///
    /// Returns [`WindowError`] when the window manager rejects the window.
    pub fn open_window(&self, content: impl Into<String>) -> Result<WindowId, WindowError> {
        let defaults = self.manifest.window;
        self.windows.create_window(
            WindowConfig::new(self.manifest.name.clone())
                .with_size(defaults.default_width, defaults.default_height)
                .with_content(content),
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppRegistry {
    apps: BTreeMap<String, AppManifest>,
}

impl AppRegistry {
    /// Validates and adds `manifest`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Manifest`] for invalid manifests and [`AppError::AlreadyRegistered`]
    /// when the id is taken.
    pub fn register(&mut self, manifest: AppManifest) -> Result<(), AppError> {
        manifest.validate()?;
        if self.apps.contains_key(&manifest.id) {
            return Err(AppError::AlreadyRegistered(manifest.id));
        }
        logging::log!("registered application `{}` ({})", manifest.id, manifest.version);
        self.apps.insert(manifest.id.clone(), manifest);
        Ok(())
    }

    pub fn unregister(&mut self, id: &str) -> Option<AppManifest> {
        self.apps.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&AppManifest> {
        self.apps.get(id)
    }

    pub fn has(&self, id: &str) -> bool {
        self.apps.contains_key(id)
    }

    /// Every manifest, ordered by id.
    pub fn all(&self) -> Vec<&AppManifest> {
        self.apps.values().collect()
    }

    pub fn by_category(&self, category: &str) -> Vec<&AppManifest> {
        self.apps
            .values()
            .filter(|manifest| manifest.category() == category)
            .collect()
    }

    pub fn categories(&self) -> Vec<String> {
        self.apps
            .values()
            .map(|manifest| manifest.category().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.apps.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    Launched,
    /// The app was running; its first window was focused.
    AlreadyRunning,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AppStats {
    pub registered: usize,
    pub running: usize,
    pub running_apps: Vec<String>,
}

pub struct AppLauncher {
    registry: AppRegistry,
    factories: HashMap<String, Rc<dyn AppFactory>>,
    running: BTreeMap<String, Box<dyn AppInstance>>,
    windows: WindowManager,
    bus: Option<EventBus>,
    store: Option<Store>,
}

impl fmt::Debug for AppLauncher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppLauncher")
            .field("registry", &self.registry)
            .field("running", &self.running_apps())
            .finish()
    }
}

impl AppLauncher {
    pub fn new(windows: WindowManager) -> Self {
        let bus = windows.bus().cloned();
        let store = windows.store().cloned();
        Self {
            registry: AppRegistry::default(),
            factories: HashMap::new(),
            running: BTreeMap::new(),
            windows,
            bus,
            store,
        }
    }

    pub fn registry(&self) -> &AppRegistry {
        &self.registry
    }

    fn emit(&self, event: &str, data: serde_json::Value) {
        if let Some(bus) = &self.bus {
            bus.emit(event, data);
        }
    }

    /// Registers a manifest together with the factory that builds it.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] when the manifest is invalid or the id is already registered.
    pub fn register_app(
        &mut self,
        manifest: AppManifest,
        factory: impl AppFactory + 'static,
    ) -> Result<(), AppError> {
        let id = manifest.id.clone();
        self.registry.register(manifest)?;
        self.factories.insert(id, Rc::new(factory));
        Ok(())
    }

    /// Parses a TOML manifest and registers it with `factory`. Returns the app id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] when parsing, validation or registration fails.
    pub fn register_from_toml(
        &mut self,
        raw: &str,
        factory: impl AppFactory + 'static,
    ) -> Result<String, AppError> {
        let manifest = AppManifest::from_toml_str(raw)?;
        let id = manifest.id.clone();
        self.register_app(manifest, factory)?;
        Ok(id)
    }

    /// Attaches (or replaces) the factory for an app id.
    pub fn register_factory(&mut self, id: impl Into<String>, factory: impl AppFactory + 'static) {
        self.factories.insert(id.into(), Rc::new(factory));
    }

    /// Registers manifests from `(path, toml)` sources. Returns the number registered.
    ///
    /// A manifest that fails to parse, validate or register leaves the app unavailable and
    /// opens a persistent error window describing the problem.
    pub fn discover<P, R>(&mut self, sources: impl IntoIterator<Item = (P, R)>) -> usize
    where
        P: AsRef<str>,
        R: AsRef<str>,
    {
        let mut registered = 0;
        for (path, raw) in sources {
            let path = path.as_ref();
            let result = AppManifest::from_toml_str(raw.as_ref())
                .map_err(AppError::from)
                .and_then(|manifest| self.registry.register(manifest));
            match result {
                Ok(()) => registered += 1,
                Err(err) => {
                    logging::error!("failed to load application manifest {path}: {err}");
                    self.show_manifest_error(path, &err);
                }
            }
        }
        logging::log!("discovered {registered} application(s)");
        registered
    }

    fn show_manifest_error(&self, path: &str, err: &AppError) {
        let app_id = app_id_from_path(path);
        let content = format!(
            "<div style=\"padding: 20px; font-family: monospace;\">\
             <h2>Manifest Error</h2>\
             <p><strong>Application:</strong> {}<br><strong>File:</strong> {}</p>\
             <pre>{}</pre>\
             <p>This app will not be available until the manifest is fixed.</p></div>",
            escape_html(app_id),
            escape_html(path),
            escape_html(&err.to_string()),
        );
        let config = WindowConfig::new(format!("Error: {app_id}"))
            .with_rect(WindowRect::new(200, 150, 600, 400))
            .with_content(content)
            .persistent(true);
        if let Err(err) = self.windows.create_window(config) {
            logging::error!("failed to show manifest error window: {err}");
        }
    }

    /// Launches `id`, or focuses it when it is already running. An instance whose windows were
    /// all closed through the window manager is forgotten first and launched afresh.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] when the app is unknown, has no factory, or fails to build or open.
    pub fn launch(&mut self, id: &str) -> Result<LaunchOutcome, AppError> {
        let Some(manifest) = self.registry.get(id).cloned() else {
            return Err(AppError::NotFound(id.to_string()));
        };
        self.emit(topics::APP_LAUNCHING, json!({ "appId": id }));
        self.forget_if_stale(id);

        if let Some(instance) = self.running.get(id) {
            if let Some(window) = instance.window_ids().first() {
                self.windows.focus_window(*window);
            }
            logging::log!("application `{id}` is already running");
            return Ok(LaunchOutcome::AlreadyRunning);
        }

        let factory = self
            .factories
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NoFactory(id.to_string()))?;
        let context = AppContext {
            manifest: manifest.clone(),
            windows: self.windows.clone(),
            bus: self.bus.clone(),
            store: self.store.clone(),
        };
        let launch_error = |message: String| AppError::Launch {
            id: id.to_string(),
            message,
        };
        let mut instance = factory.create(context).map_err(launch_error)?;
        self.emit(
            topics::APP_LAUNCHED,
            json!({ "appId": id, "name": manifest.name }),
        );

        instance.open().map_err(launch_error)?;
        let windows = instance.window_ids();
        self.running.insert(id.to_string(), instance);
        self.emit(topics::APP_OPENED, json!({ "appId": id, "windows": windows }));
        logging::log!("application `{id}` launched");
        Ok(LaunchOutcome::Launched)
    }

    /// Closes a running app. Returns `Ok(false)` when it was not running.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Close`] when the instance refuses to close; it stays running.
    pub fn close(&mut self, id: &str) -> Result<bool, AppError> {
        let Some(instance) = self.running.get_mut(id) else {
            logging::log!("application `{id}` is not running");
            return Ok(false);
        };
        if let Err(message) = instance.close() {
            logging::error!("failed to close application `{id}`: {message}");
            return Err(AppError::Close {
                id: id.to_string(),
                message,
            });
        }
        self.running.remove(id);
        self.emit(topics::APP_CLOSED, json!({ "appId": id }));
        logging::log!("application `{id}` closed");
        Ok(true)
    }

    /// An app is live while it owns no windows or at least one of its windows is still open.
    /// Windows closed behind the launcher's back leave a stale instance.
    fn is_live(&self, instance: &dyn AppInstance) -> bool {
        let ids = instance.window_ids();
        ids.is_empty()
            || ids.into_iter().any(|id| {
                self.windows
                    .window(id)
                    .is_some_and(|record| !record.closing)
            })
    }

    fn live_instance(&self, id: &str) -> Option<&dyn AppInstance> {
        self.running
            .get(id)
            .map(|instance| &**instance)
            .filter(|instance| self.is_live(*instance))
    }

    fn forget_if_stale(&mut self, id: &str) {
        let stale = self
            .running
            .get(id)
            .is_some_and(|instance| !self.is_live(instance.as_ref()));
        if stale {
            self.running.remove(id);
            self.emit(topics::APP_CLOSED, json!({ "appId": id }));
            logging::log!("application `{id}` lost its windows; forgetting it");
        }
    }

    pub fn running_apps(&self) -> Vec<String> {
        self.running
            .iter()
            .filter(|(_, instance)| self.is_live(instance.as_ref()))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.live_instance(id).is_some()
    }

    /// Windows owned by a running app.
    pub fn app_windows(&self, id: &str) -> Vec<WindowId> {
        self.live_instance(id)
            .map(|instance| instance.window_ids())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> AppStats {
        let running_apps = self.running_apps();
        AppStats {
            registered: self.registry.count(),
            running: running_apps.len(),
            running_apps,
        }
    }
}

fn app_id_from_path(path: &str) -> &str {
    path.split('/')
        .skip_while(|segment| *segment != "apps")
        .nth(1)
        .filter(|segment| !segment.is_empty())
        .unwrap_or("unknown")
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
