//! Publish/subscribe hub connecting window and app lifecycle producers to their consumers.
//!
//! Listener patterns are exact event names (`window:created`), the catch-all `*`, or
//! colon-delimited segment patterns (`window:*`, `app:launch*`). Patterns are compiled once when
//! the listener registers.
//!
//! Delivery is synchronous and re-entrant: no bus borrow is held while a listener runs, so a
//! listener may subscribe, unsubscribe or emit further events.

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    fmt,
    rc::{Rc, Weak},
};

use futures::{channel::oneshot, future::LocalBoxFuture, FutureExt};
use leptos::logging;
use platform_host::unix_time_ms_now;
use serde::Serialize;
use serde_json::{json, Value};

use crate::scheduler::Scheduler;

/// Default number of records kept in the event log.
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 100;
/// Default `limit` used by callers that show "recent" events.
pub const DEFAULT_LOG_LIMIT: usize = 50;

/// Event names published by the shell core.
pub mod topics {
    pub const WINDOW_CREATED: &str = "window:created";
    pub const WINDOW_FOCUSED: &str = "window:focused";
    pub const WINDOW_MINIMIZED: &str = "window:minimized";
    pub const WINDOW_MAXIMIZED: &str = "window:maximized";
    pub const WINDOW_RESTORED: &str = "window:restored";
    pub const WINDOW_CLOSED: &str = "window:closed";
    pub const WINDOW_MOVED: &str = "window:moved";
    pub const WINDOW_RESIZED: &str = "window:resized";
    pub const APP_LAUNCHING: &str = "app:launching";
    pub const APP_LAUNCHED: &str = "app:launched";
    pub const APP_OPENED: &str = "app:opened";
    pub const APP_CLOSED: &str = "app:closed";
    /// Published when a listener fails; carries `{event, error, data}`.
    pub const ERROR: &str = "error";
}

/// Outcome of one listener invocation. `Err` is logged and republished as an `error` event.
pub type ListenerResult = Result<(), String>;

type ListenerFn = dyn Fn(&Value) -> ListenerResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Identifies one registered listener.
pub struct ListenerId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
/// Matcher for one colon-delimited segment of a pattern.
pub enum SegmentMatcher {
    Any,
    Literal(String),
    /// Literal pieces around `*` wildcards inside one segment.
    Glob(Vec<String>),
}

impl SegmentMatcher {
    fn parse(segment: &str) -> Self {
        if segment == "*" {
            Self::Any
        } else if segment.contains('*') {
            Self::Glob(segment.split('*').map(str::to_string).collect())
        } else {
            Self::Literal(segment.to_string())
        }
    }

    fn matches(&self, segment: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Literal(literal) => literal == segment,
            Self::Glob(pieces) => glob_matches(pieces, segment),
        }
    }
}

fn glob_matches(pieces: &[String], text: &str) -> bool {
    let (Some(first), Some(last)) = (pieces.first(), pieces.last()) else {
        return false;
    };
    if pieces.len() == 1 {
        return first == text;
    }
    if text.len() < first.len() + last.len() || !text.starts_with(first.as_str()) {
        return false;
    }
    if !text.ends_with(last.as_str()) {
        return false;
    }

    let mut rest = &text[first.len()..text.len() - last.len()];
    for piece in &pieces[1..pieces.len() - 1] {
        let Some(found) = rest.find(piece.as_str()) else {
            return false;
        };
        rest = &rest[found + piece.len()..];
    }
    true
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Compiled listener pattern.
pub enum EventPattern {
    /// `*`: every event.
    Any,
    /// A name without wildcards.
    Exact(String),
    /// Colon-delimited segment matchers. A trailing `*` segment matches one or more segments.
    Segments(Vec<SegmentMatcher>),
}

impl EventPattern {
    pub fn parse(pattern: &str) -> Self {
        if pattern == "*" {
            Self::Any
        } else if !pattern.contains('*') {
            Self::Exact(pattern.to_string())
        } else {
            Self::Segments(pattern.split(':').map(SegmentMatcher::parse).collect())
        }
    }

    pub fn is_wildcard(&self) -> bool {
        !matches!(self, Self::Exact(_))
    }

    pub fn matches(&self, event: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(name) => name == event,
            Self::Segments(matchers) => {
                let segments: Vec<&str> = event.split(':').collect();
                let trailing_any = matches!(matchers.last(), Some(SegmentMatcher::Any));
                let count_ok = if trailing_any {
                    segments.len() >= matchers.len()
                } else {
                    segments.len() == matchers.len()
                };
                count_ok
                    && matchers
                        .iter()
                        .zip(&segments)
                        .all(|(matcher, segment)| matcher.matches(segment))
            }
        }
    }
}

struct ListenerEntry {
    id: ListenerId,
    pattern: String,
    matcher: EventPattern,
    once: bool,
    active: Cell<bool>,
    fired: Cell<bool>,
    callback: Box<ListenerFn>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
/// One logged emission.
pub struct EventRecord {
    pub event: String,
    pub data: Value,
    pub timestamp_unix_ms: u64,
    /// Number of listeners matched when the event was emitted.
    pub listeners: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct EventBusStats {
    /// Distinct registered patterns.
    pub event_count: usize,
    pub total_listener_count: usize,
    pub log_size: usize,
}

struct EventBusState {
    listeners: Vec<Rc<ListenerEntry>>,
    next_id: u64,
    log: VecDeque<EventRecord>,
    capacity: usize,
}

impl EventBusState {
    fn remove_where(&mut self, mut predicate: impl FnMut(&ListenerEntry) -> bool) -> usize {
        let before = self.listeners.len();
        self.listeners.retain(|entry| {
            let remove = predicate(entry);
            if remove {
                entry.active.set(false);
            }
            !remove
        });
        before - self.listeners.len()
    }
}

#[derive(Clone)]
/// Cheap clonable handle to one event bus.
pub struct EventBus {
    state: Rc<RefCell<EventBusState>>,
    scheduler: Scheduler,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus").field("stats", &self.stats()).finish()
    }
}

/// Handle returned by [`EventBus::on`] and [`EventBus::once`].
///
/// Dropping a subscription leaves the listener registered; call [`Subscription::unsubscribe`]
/// to remove it.
#[derive(Debug, Clone)]
pub struct Subscription {
    bus: Weak<RefCell<EventBusState>>,
    pattern: String,
    id: ListenerId,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Removes the listener. Returns `false` if it was already gone or the bus was dropped.
    pub fn unsubscribe(&self) -> bool {
        let Some(state) = self.bus.upgrade() else {
            return false;
        };
        let id = self.id;
        let removed = state.borrow_mut().remove_where(|entry| entry.id == id);
        removed > 0
    }
}

impl EventBus {
    pub fn new(scheduler: Scheduler) -> Self {
        Self::with_capacity(scheduler, DEFAULT_EVENT_LOG_CAPACITY)
    }

    /// Creates a bus whose log keeps at most `capacity` records (at least one).
    pub fn with_capacity(scheduler: Scheduler, capacity: usize) -> Self {
        logging::log!("event bus initialized (log capacity {capacity})");
        Self {
            state: Rc::new(RefCell::new(EventBusState {
                listeners: Vec::new(),
                next_id: 1,
                log: VecDeque::new(),
                capacity: capacity.max(1),
            })),
            scheduler,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Registers a persistent listener.
    pub fn on(
        &self,
        pattern: &str,
        listener: impl Fn(&Value) -> ListenerResult + 'static,
    ) -> Subscription {
        self.register(pattern, false, Box::new(listener))
    }

    /// Registers a listener that runs for at most one emission.
    pub fn once(
        &self,
        pattern: &str,
        listener: impl Fn(&Value) -> ListenerResult + 'static,
    ) -> Subscription {
        self.register(pattern, true, Box::new(listener))
    }

    fn register(&self, pattern: &str, once: bool, callback: Box<ListenerFn>) -> Subscription {
        let mut state = self.state.borrow_mut();
        let id = ListenerId(state.next_id);
        state.next_id += 1;
        state.listeners.push(Rc::new(ListenerEntry {
            id,
            pattern: pattern.to_string(),
            matcher: EventPattern::parse(pattern),
            once,
            active: Cell::new(true),
            fired: Cell::new(false),
            callback,
        }));
        Subscription {
            bus: Rc::downgrade(&self.state),
            pattern: pattern.to_string(),
            id,
        }
    }

    /// Removes listener `id` registered under `pattern`, or every listener registered under the
    /// exact `pattern` string when `id` is `None`. Returns the number removed.
    pub fn off(&self, pattern: &str, id: Option<ListenerId>) -> usize {
        self.state.borrow_mut().remove_where(|entry| {
            entry.pattern == pattern && id.map_or(true, |id| entry.id == id)
        })
    }

    /// Publishes `event` to every matching listener.
    ///
    /// Exact-name listeners run first, then wildcard listeners, each group in registration
    /// order.
    pub fn emit(&self, event: &str, data: Value) {
        let matched = self.matching(event);
        self.record(event, &data, matched.len());

        for entry in &matched {
            if !entry.active.get() || (entry.once && entry.fired.replace(true)) {
                continue;
            }
            if let Err(err) = (entry.callback)(&data) {
                logging::error!("event listener for `{event}` failed: {err}");
                if event != topics::ERROR {
                    self.emit(
                        topics::ERROR,
                        json!({ "event": event, "error": err, "data": data.clone() }),
                    );
                }
            }
        }

        let finished: Vec<ListenerId> = matched
            .iter()
            .filter(|entry| entry.once && entry.fired.get())
            .map(|entry| entry.id)
            .collect();
        if !finished.is_empty() {
            self.state
                .borrow_mut()
                .remove_where(|entry| finished.contains(&entry.id));
        }
    }

    /// Defers [`EventBus::emit`] to the next scheduler tick. The returned future resolves once
    /// delivery has completed.
    pub fn emit_async(&self, event: &str, data: Value) -> LocalBoxFuture<'static, ()> {
        let (done_tx, done_rx) = oneshot::channel();
        let bus = self.clone();
        let event = event.to_string();
        self.scheduler.set_timeout(0, move || {
            bus.emit(&event, data);
            let _ = done_tx.send(());
        });
        async move {
            let _ = done_rx.await;
        }
        .boxed_local()
    }

    fn matching(&self, event: &str) -> Vec<Rc<ListenerEntry>> {
        let state = self.state.borrow();
        let exact = state
            .listeners
            .iter()
            .filter(|entry| !entry.matcher.is_wildcard() && entry.pattern == event);
        let wildcard = state
            .listeners
            .iter()
            .filter(|entry| entry.matcher.is_wildcard() && entry.matcher.matches(event));
        exact.chain(wildcard).cloned().collect()
    }

    fn record(&self, event: &str, data: &Value, listeners: usize) {
        let mut state = self.state.borrow_mut();
        state.log.push_back(EventRecord {
            event: event.to_string(),
            data: data.clone(),
            timestamp_unix_ms: unix_time_ms_now(),
            listeners,
        });
        while state.log.len() > state.capacity {
            state.log.pop_front();
        }
    }

    /// Removes every listener, or those whose pattern equals or is matched by `pattern`.
    pub fn clear(&self, pattern: Option<&str>) {
        match pattern {
            None => {
                self.state.borrow_mut().remove_where(|_| true);
                logging::log!("event bus cleared all listeners");
            }
            Some(pattern) => {
                let matcher = EventPattern::parse(pattern);
                let removed = self.state.borrow_mut().remove_where(|entry| {
                    entry.pattern == pattern || matcher.matches(&entry.pattern)
                });
                logging::log!("event bus cleared {removed} listener(s) for pattern `{pattern}`");
            }
        }
    }

    /// Number of listeners registered under the exact `pattern` string.
    pub fn listener_count(&self, pattern: &str) -> usize {
        self.state
            .borrow()
            .listeners
            .iter()
            .filter(|entry| entry.pattern == pattern)
            .count()
    }

    pub fn has_listeners(&self, pattern: &str) -> bool {
        self.listener_count(pattern) > 0
    }

    /// Registered patterns in first-registration order.
    pub fn patterns(&self) -> Vec<String> {
        let state = self.state.borrow();
        let mut patterns: Vec<String> = Vec::new();
        for entry in &state.listeners {
            if !patterns.contains(&entry.pattern) {
                patterns.push(entry.pattern.clone());
            }
        }
        patterns
    }

    /// The most recent `limit` records, oldest first.
    pub fn log(&self, limit: usize) -> Vec<EventRecord> {
        let state = self.state.borrow();
        let skip = state.log.len().saturating_sub(limit);
        state.log.iter().skip(skip).cloned().collect()
    }

    pub fn stats(&self) -> EventBusStats {
        let total_listener_count = self.state.borrow().listeners.len();
        EventBusStats {
            event_count: self.patterns().len(),
            total_listener_count,
            log_size: self.state.borrow().log.len(),
        }
    }

    pub fn debug(&self) {
        let stats = self.stats();
        logging::log!(
            "event bus: {} pattern(s), {} listener(s), {} logged event(s)",
            stats.event_count,
            stats.total_listener_count,
            stats.log_size
        );
        for pattern in self.patterns() {
            logging::log!("  {pattern}: {} listener(s)", self.listener_count(&pattern));
        }
        for record in self.log(10) {
            logging::log!(
                "  [{}] {} -> {} listener(s)",
                record.timestamp_unix_ms,
                record.event,
                record.listeners
            );
        }
    }
}
