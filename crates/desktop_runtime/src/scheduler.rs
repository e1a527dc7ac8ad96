//! Cooperative single-threaded timer loop.
//!
//! Every deferred piece of runtime work (window creation callbacks, the close animation delay,
//! debounced persistence, asynchronous bus emission) is queued here instead of on an ambient
//! event loop. A browser host advances the scheduler from its own timer callbacks; tests advance
//! virtual time directly. Tasks never run re-entrantly: each runs to completion before the next
//! one is picked.
//!
//! A host that owns real timers installs a waker with [`Scheduler::set_waker`]; it is called
//! after every [`Scheduler::set_timeout`] so the host can arm a timer for
//! [`Scheduler::next_due_ms`].

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::{Rc, Weak},
};

use leptos::logging;

/// Upper bound on tasks drained by a single [`Scheduler::run_until_idle`] call.
pub const MAX_IDLE_TASKS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Handle returned by [`Scheduler::set_timeout`].
pub struct TimerId(u64);

struct PendingTask {
    id: TimerId,
    due_ms: u64,
    task: Box<dyn FnOnce()>,
}

type Waker = Rc<dyn Fn()>;

#[derive(Default)]
struct SchedulerInner {
    now_ms: Cell<u64>,
    next_id: Cell<u64>,
    queue: RefCell<Vec<PendingTask>>,
    waker: RefCell<Option<Waker>>,
}

#[derive(Clone, Default)]
/// Shared handle to a virtual-time task queue.
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("now_ms", &self.now_ms())
            .field("pending", &self.pending())
            .field("has_waker", &self.has_waker())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
/// Non-owning scheduler handle for host timer callbacks.
pub struct WeakScheduler {
    inner: Weak<SchedulerInner>,
}

impl WeakScheduler {
    pub fn upgrade(&self) -> Option<Scheduler> {
        self.inner.upgrade().map(|inner| Scheduler { inner })
    }
}

impl Scheduler {
    /// Creates an empty scheduler at virtual time zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn downgrade(&self) -> WeakScheduler {
        WeakScheduler {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Installs the callback run after every [`Scheduler::set_timeout`], replacing any previous
    /// one.
    pub fn set_waker(&self, waker: impl Fn() + 'static) {
        let waker: Waker = Rc::new(waker);
        *self.inner.waker.borrow_mut() = Some(waker);
    }

    pub fn clear_waker(&self) {
        self.inner.waker.borrow_mut().take();
    }

    pub fn has_waker(&self) -> bool {
        self.inner.waker.borrow().is_some()
    }

    fn wake(&self) {
        let waker = self.inner.waker.borrow().clone();
        if let Some(waker) = waker {
            waker();
        }
    }

    /// Current virtual time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.inner.now_ms.get()
    }

    /// Queues `task` to run once `delay_ms` of virtual time has elapsed.
    ///
    /// A zero delay defers the task to the next tick; it never runs inside this call.
    pub fn set_timeout(&self, delay_ms: u64, task: impl FnOnce() + 'static) -> TimerId {
        let id = TimerId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        self.inner.queue.borrow_mut().push(PendingTask {
            id,
            due_ms: self.now_ms().saturating_add(delay_ms),
            task: Box::new(task),
        });
        self.wake();
        id
    }

    /// Cancels a queued task. Returns `false` if it already ran or was cancelled.
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        let mut queue = self.inner.queue.borrow_mut();
        let before = queue.len();
        queue.retain(|pending| pending.id != id);
        queue.len() != before
    }

    /// Returns `true` while `id` is still queued.
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.inner.queue.borrow().iter().any(|pending| pending.id == id)
    }

    /// Due time of the earliest queued task.
    pub fn next_due_ms(&self) -> Option<u64> {
        self.inner
            .queue
            .borrow()
            .iter()
            .map(|pending| pending.due_ms)
            .min()
    }

    /// Number of queued tasks.
    pub fn pending(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Runs every task already due at the current time, including zero-delay tasks queued by
    /// those tasks. Returns the number of tasks run.
    pub fn tick(&self) -> usize {
        self.advance(0)
    }

    /// Moves virtual time forward by `ms`, running due tasks in `(due time, queue order)`.
    ///
    /// Tasks scheduled by running tasks also run when they fall due inside the window.
    pub fn advance(&self, ms: u64) -> usize {
        let target = self.now_ms().saturating_add(ms);
        self.advance_to(target)
    }

    /// Moves virtual time forward to `target_ms` (never backwards), running due tasks.
    pub fn advance_to(&self, target_ms: u64) -> usize {
        let target = target_ms.max(self.now_ms());
        let mut ran = 0;
        while let Some(task) = self.pop_due(target) {
            task();
            ran += 1;
        }
        self.inner.now_ms.set(target);
        ran
    }

    /// Runs tasks, jumping virtual time to each next due task, until the queue is empty.
    ///
    /// Stops after [`MAX_IDLE_TASKS`] tasks so a self-rescheduling task cannot hang the caller.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while ran < MAX_IDLE_TASKS {
            let Some(task) = self.pop_due(u64::MAX) else {
                return ran;
            };
            task();
            ran += 1;
        }
        logging::warn!("scheduler stopped after {MAX_IDLE_TASKS} tasks; queue not idle");
        ran
    }

    fn pop_due(&self, limit_ms: u64) -> Option<Box<dyn FnOnce()>> {
        let mut queue = self.inner.queue.borrow_mut();
        let index = queue
            .iter()
            .enumerate()
            .filter(|(_, pending)| pending.due_ms <= limit_ms)
            .min_by_key(|(_, pending)| (pending.due_ms, pending.id))
            .map(|(index, _)| index)?;
        let pending = queue.remove(index);
        drop(queue);
        if pending.due_ms > self.now_ms() {
            self.inner.now_ms.set(pending.due_ms);
        }
        Some(pending.task)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn recorder() -> (Rc<RefCell<Vec<&'static str>>>, Scheduler) {
        (Rc::new(RefCell::new(Vec::new())), Scheduler::new())
    }

    #[test]
    fn zero_delay_tasks_wait_for_the_next_tick() {
        let (log, scheduler) = recorder();
        let sink = log.clone();
        scheduler.set_timeout(0, move || sink.borrow_mut().push("deferred"));

        assert!(log.borrow().is_empty());
        assert_eq!(scheduler.tick(), 1);
        assert_eq!(*log.borrow(), vec!["deferred"]);
    }

    #[test]
    fn tasks_run_in_due_order_then_queue_order() {
        let (log, scheduler) = recorder();
        for (delay, label) in [(20, "late"), (10, "first"), (10, "second")] {
            let sink = log.clone();
            scheduler.set_timeout(delay, move || sink.borrow_mut().push(label));
        }

        scheduler.advance(15);
        assert_eq!(*log.borrow(), vec!["first", "second"]);
        assert_eq!(scheduler.now_ms(), 15);

        scheduler.advance(5);
        assert_eq!(*log.borrow(), vec!["first", "second", "late"]);
    }

    #[test]
    fn cleared_timeouts_never_run() {
        let (log, scheduler) = recorder();
        let sink = log.clone();
        let id = scheduler.set_timeout(5, move || sink.borrow_mut().push("cancelled"));

        assert!(scheduler.is_pending(id));
        assert!(scheduler.clear_timeout(id));
        assert!(!scheduler.clear_timeout(id));
        scheduler.advance(10);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn tasks_may_schedule_follow_up_work() {
        let (log, scheduler) = recorder();
        let sink = log.clone();
        let inner_scheduler = scheduler.clone();
        scheduler.set_timeout(10, move || {
            sink.borrow_mut().push("outer");
            let sink = sink.clone();
            inner_scheduler.set_timeout(10, move || sink.borrow_mut().push("inner"));
        });

        scheduler.advance(15);
        assert_eq!(*log.borrow(), vec!["outer"]);
        assert_eq!(scheduler.run_until_idle(), 1);
        assert_eq!(*log.borrow(), vec!["outer", "inner"]);
        assert_eq!(scheduler.now_ms(), 20);
    }

    #[test]
    fn waker_runs_after_each_timeout_and_sees_the_earliest_due_time() {
        let scheduler = Scheduler::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let weak = scheduler.downgrade();
        scheduler.set_waker(move || {
            let due = weak.upgrade().and_then(|scheduler| scheduler.next_due_ms());
            sink.borrow_mut().push(due);
        });

        scheduler.set_timeout(50, || {});
        scheduler.set_timeout(20, || {});
        assert_eq!(*seen.borrow(), vec![Some(50), Some(20)]);
        assert_eq!(scheduler.next_due_ms(), Some(20));

        scheduler.clear_waker();
        scheduler.set_timeout(5, || {});
        assert_eq!(seen.borrow().len(), 2);
        assert!(!scheduler.has_waker());

        scheduler.run_until_idle();
        assert_eq!(scheduler.next_due_ms(), None);
    }

    #[test]
    fn weak_handle_does_not_keep_the_queue_alive() {
        let scheduler = Scheduler::new();
        let weak = scheduler.downgrade();
        assert!(weak.upgrade().is_some());
        drop(scheduler);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn advance_to_never_moves_backwards() {
        let scheduler = Scheduler::new();
        scheduler.advance(50);
        scheduler.advance_to(10);
        assert_eq!(scheduler.now_ms(), 50);
    }
}
