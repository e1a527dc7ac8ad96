use std::{cell::RefCell, rc::Rc};

use desktop_runtime::{
    state_manager::{PERSISTED_WINDOWS_KEY, RESTORED_WINDOW_CONTENT},
    window_manager::WINDOW_COUNT_KEY,
    AppContext, AppInstance, DesktopRuntime, EventBus, LaunchOutcome, PointerPosition,
    PointerTarget, Scheduler, ShellConfig, Store, WindowConfig, WindowId, WindowRect,
};
use platform_host::{unix_time_ms_now, MemoryPrefsStore, PrefsStore, DAY_MS};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn runtime_on(prefs: &MemoryPrefsStore) -> DesktopRuntime {
    DesktopRuntime::new(ShellConfig::default(), Rc::new(prefs.clone()))
}

#[test]
fn focus_minimize_and_toggle_keep_z_order_monotonic() {
    let runtime = runtime_on(&MemoryPrefsStore::default());
    let windows = runtime.windows();

    let a = windows
        .create_window(WindowConfig::new("A").with_rect(WindowRect::new(100, 100, 400, 300)))
        .expect("create A");
    let b = windows
        .create_window(WindowConfig::new("B").with_rect(WindowRect::new(150, 150, 400, 300)))
        .expect("create B");
    let z = |id: WindowId| windows.window(id).expect("window").z_index;

    assert_eq!(windows.active_window(), Some(b));
    assert!(z(b) > z(a));

    windows.minimize_window(b);
    assert!(windows.window(b).expect("B").is_minimized());
    assert_eq!(windows.active_window(), None);
    assert_eq!(runtime.store().get("windows.active"), Some(Value::Null));

    let before_toggle = z(b);
    windows.toggle_window(b);
    let record = windows.window(b).expect("B");
    assert!(!record.is_minimized());
    assert_eq!(windows.active_window(), Some(b));
    assert!(record.z_index > before_toggle);
    assert!(record.z_index > z(a));

    let events: Vec<String> = runtime
        .recent_events(2)
        .into_iter()
        .map(|record| record.event)
        .collect();
    assert_eq!(events, vec!["window:restored", "window:focused"]);
}

#[test]
fn store_subscriber_ignores_no_op_writes() {
    let store = Store::new(Scheduler::new(), Rc::new(MemoryPrefsStore::default()));
    store.set("windows.count", 2);

    let calls = Rc::new(RefCell::new(Vec::new()));
    let seen = calls.clone();
    let _subscription = store.subscribe("windows.count", move |change| {
        seen.borrow_mut()
            .push((change.new_value.clone(), change.old_value.clone()));
        Ok(())
    });

    assert!(!store.set("windows.count", 2));
    assert!(calls.borrow().is_empty());

    assert!(store.set("windows.count", 3));
    assert_eq!(*calls.borrow(), vec![(Some(json!(3)), Some(json!(2)))]);
}

#[test]
fn failing_listener_does_not_block_the_next_one() {
    let bus = EventBus::new(Scheduler::new());
    let delivered = Rc::new(RefCell::new(0));
    let errors = Rc::new(RefCell::new(Vec::new()));

    let _failing = bus.on("test:event", |_| Err("boom".to_string()));
    let counter = delivered.clone();
    let _counting = bus.on("test:event", move |_| {
        *counter.borrow_mut() += 1;
        Ok(())
    });
    let sink = errors.clone();
    let _errors = bus.on("error", move |data| {
        sink.borrow_mut().push(data.clone());
        Ok(())
    });

    bus.emit("test:event", json!({ "n": 1 }));

    assert_eq!(*delivered.borrow(), 1);
    assert_eq!(
        *errors.borrow(),
        vec![json!({ "event": "test:event", "error": "boom", "data": { "n": 1 } })]
    );
}

#[test]
fn burst_of_writes_is_persisted_once() {
    let scheduler = Scheduler::new();
    let prefs = MemoryPrefsStore::default();
    let store = Store::new(scheduler.clone(), Rc::new(prefs.clone()));
    store.enable_auto_persist(500);

    for n in 0..10 {
        store.set("counter", n);
        scheduler.advance(10);
    }
    scheduler.advance(489);
    assert_eq!(prefs.write_count(), 0);

    scheduler.advance(1);
    assert_eq!(prefs.write_count(), 1);
    scheduler.run_until_idle();
    assert_eq!(prefs.write_count(), 1);
}

#[test]
fn stale_record_is_discarded_on_startup() {
    let prefs = MemoryPrefsStore::default();
    let stale = json!({
        "state": { "windows": { "count": 4 } },
        "timestamp": unix_time_ms_now() - 31 * DAY_MS,
    });
    prefs
        .save_pref("webdesk-store", &stale.to_string())
        .expect("seed record");

    let store = Store::new(Scheduler::new(), Rc::new(prefs.clone()));
    assert!(!store.restore());
    assert!(!store.has(WINDOW_COUNT_KEY));
    assert_eq!(prefs.raw("webdesk-store"), None);
}

#[test]
fn persistent_windows_survive_a_reload() {
    let prefs = MemoryPrefsStore::default();
    {
        let mut runtime = runtime_on(&prefs);
        let kept = runtime
            .windows()
            .create_window(
                WindowConfig::new("Notes")
                    .with_rect(WindowRect::new(120, 80, 500, 360))
                    .with_content("<textarea>draft</textarea>")
                    .persistent(true),
            )
            .expect("create");
        runtime
            .windows()
            .create_window(WindowConfig::new("Scratch"))
            .expect("create");

        runtime
            .drag_drop()
            .pointer_down(PointerTarget::Header(kept), PointerPosition::new(130, 90));
        runtime.drag_drop().pointer_move(PointerPosition::new(160, 140));
        runtime.drag_drop().pointer_up();
        runtime.scheduler().run_until_idle();
    }
    assert!(prefs.write_count() > 0);

    let runtime = runtime_on(&prefs);
    let restored = runtime.windows().windows();
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].title, "Notes");
    assert_eq!(restored[0].rect, WindowRect::new(150, 130, 500, 360));
    assert_eq!(restored[0].content, RESTORED_WINDOW_CONTENT);

    let snapshot = runtime.store().get(PERSISTED_WINDOWS_KEY).expect("snapshot");
    assert_eq!(snapshot.as_array().map(Vec::len), Some(1));
}

struct Viewer {
    context: AppContext,
    windows: Vec<WindowId>,
}

impl AppInstance for Viewer {
    fn window_ids(&self) -> Vec<WindowId> {
        self.windows.clone()
    }

    fn open(&mut self) -> Result<(), String> {
        let id = self
            .context
            .open_window("<p>viewer</p>")
            .map_err(|e| e.to_string())?;
        self.windows.push(id);
        Ok(())
    }
}

#[test]
fn relaunching_a_running_app_focuses_its_window() {
    let mut runtime = runtime_on(&MemoryPrefsStore::default());
    runtime
        .apps_mut()
        .register_from_toml(
            "id = \"viewer\"\nname = \"Viewer\"\nversion = \"0.1.0\"\nentry_point = \"viewer.js\"\n",
            |context: AppContext| -> Result<Box<dyn AppInstance>, String> {
                Ok(Box::new(Viewer {
                    context,
                    windows: Vec::new(),
                }))
            },
        )
        .expect("register");

    assert_eq!(
        runtime.apps_mut().launch("viewer").expect("launch"),
        LaunchOutcome::Launched
    );
    let viewer_window = runtime.apps().app_windows("viewer")[0];
    runtime
        .windows()
        .create_window(WindowConfig::new("Other"))
        .expect("create");
    assert_ne!(runtime.windows().active_window(), Some(viewer_window));

    assert_eq!(
        runtime.apps_mut().launch("viewer").expect("relaunch"),
        LaunchOutcome::AlreadyRunning
    );
    assert_eq!(runtime.windows().active_window(), Some(viewer_window));
    assert_eq!(runtime.system_stats().apps.running, 1);
}
