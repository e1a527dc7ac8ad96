//! Drives a [`Scheduler`] from host timers.
//!
//! Whenever work is queued, one host timer is armed for the earliest due task. When it fires the
//! scheduler advances to that time, running every due task, and the next timer is armed. Virtual
//! time therefore follows wall-clock time only as far as queued work needs it.

use std::{cell::Cell, rc::Rc};

use leptos::logging;

use crate::scheduler::Scheduler;

/// Arms a one-shot host timer; returns `false` when none could be armed.
pub type HostTimerFn = Rc<dyn Fn(u64, Box<dyn FnOnce()>) -> bool>;

/// Drives `scheduler` with browser timers. Returns `false` when the host has none, in which
/// case the scheduler stays manual.
pub fn attach_browser_timers(scheduler: &Scheduler) -> bool {
    if !platform_host_web::host_timers_available() {
        logging::log!("no host timers available; scheduler stays manual");
        return false;
    }
    attach_timers(
        scheduler,
        Rc::new(|delay_ms, task: Box<dyn FnOnce()>| {
            platform_host_web::set_host_timeout(delay_ms, task)
        }),
    );
    true
}

/// Drives `scheduler` with `set_timer`, arming a timer for work already queued.
pub fn attach_timers(scheduler: &Scheduler, set_timer: HostTimerFn) {
    let driver = Rc::new(TimerDriver {
        set_timer,
        armed_for: Cell::new(None),
    });
    let weak = scheduler.downgrade();
    let waker_driver = driver.clone();
    scheduler.set_waker(move || {
        if let Some(scheduler) = weak.upgrade() {
            waker_driver.arm(&scheduler);
        }
    });
    driver.arm(scheduler);
}

struct TimerDriver {
    set_timer: HostTimerFn,
    /// Due time of the armed host timer, if any.
    armed_for: Cell<Option<u64>>,
}

impl TimerDriver {
    fn arm(self: &Rc<Self>, scheduler: &Scheduler) {
        let Some(due) = scheduler.next_due_ms() else {
            return;
        };
        if self.armed_for.get().is_some_and(|armed| armed <= due) {
            return;
        }
        self.armed_for.set(Some(due));

        let delay_ms = due.saturating_sub(scheduler.now_ms());
        let weak = scheduler.downgrade();
        let driver = self.clone();
        let armed = (self.set_timer)(
            delay_ms,
            Box::new(move || {
                let Some(scheduler) = weak.upgrade() else {
                    return;
                };
                if driver.armed_for.get() == Some(due) {
                    driver.armed_for.set(None);
                }
                scheduler.advance_to(due);
                driver.arm(&scheduler);
            }),
        );
        if !armed {
            self.armed_for.set(None);
            logging::warn!("failed to arm host timer for scheduler task due at {due}ms");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use pretty_assertions::assert_eq;

    use super::*;

    type Armed = Rc<RefCell<Vec<(u64, Box<dyn FnOnce()>)>>>;

    fn fake_host() -> (Armed, HostTimerFn) {
        let armed: Armed = Rc::new(RefCell::new(Vec::new()));
        let sink = armed.clone();
        let set_timer: HostTimerFn = Rc::new(move |delay_ms, task| {
            sink.borrow_mut().push((delay_ms, task));
            true
        });
        (armed, set_timer)
    }

    fn fire_next(armed: &Armed) -> u64 {
        let (delay_ms, task) = armed.borrow_mut().remove(0);
        task();
        delay_ms
    }

    #[test]
    fn queued_work_arms_one_timer_for_the_earliest_task() {
        let scheduler = Scheduler::new();
        let (armed, set_timer) = fake_host();
        attach_timers(&scheduler, set_timer);
        assert!(armed.borrow().is_empty());

        let log = Rc::new(RefCell::new(Vec::new()));
        for (delay, label) in [(200, "close"), (500, "persist")] {
            let sink = log.clone();
            scheduler.set_timeout(delay, move || sink.borrow_mut().push(label));
        }
        assert_eq!(armed.borrow().len(), 1);

        assert_eq!(fire_next(&armed), 200);
        assert_eq!(*log.borrow(), vec!["close"]);
        assert_eq!(scheduler.now_ms(), 200);

        assert_eq!(fire_next(&armed), 300);
        assert_eq!(*log.borrow(), vec!["close", "persist"]);
        assert!(armed.borrow().is_empty());
    }

    #[test]
    fn earlier_work_arms_an_earlier_timer_and_stale_timers_are_harmless() {
        let scheduler = Scheduler::new();
        let (armed, set_timer) = fake_host();
        attach_timers(&scheduler, set_timer);

        let ran = Rc::new(Cell::new(0));
        scheduler.set_timeout(500, || {});
        let counter = ran.clone();
        scheduler.set_timeout(0, move || counter.set(counter.get() + 1));
        assert_eq!(armed.borrow().len(), 2);

        assert_eq!(fire_next(&armed), 500);
        assert_eq!(ran.get(), 1, "the 500ms timer also runs earlier due work");
        assert_eq!(fire_next(&armed), 0);
        assert_eq!(ran.get(), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn tasks_queued_before_attaching_are_picked_up() {
        let scheduler = Scheduler::new();
        scheduler.set_timeout(30, || {});
        let (armed, set_timer) = fake_host();
        attach_timers(&scheduler, set_timer);
        assert_eq!(fire_next(&armed), 30);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn native_host_leaves_the_scheduler_manual() {
        let scheduler = Scheduler::new();
        assert!(!attach_browser_timers(&scheduler));
        assert!(!scheduler.has_waker());

        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        scheduler.set_timeout(0, move || flag.set(true));
        assert!(!ran.get());
        assert_eq!(scheduler.tick(), 1);
        assert!(ran.get());
    }
}
