#![forbid(unsafe_code)]

//! Execution contexts for signal delivery.
//!
//! A [`Scheduler`] runs tasks "later, somewhere": as soon as possible, or
//! after a delay. [`RunLoop`] is the single designated main context: a FIFO
//! task queue plus a timer queue ordered by deadline.
//!
//! # Clock modes
//!
//! - [`RunLoop::new`]: wall clock. [`RunLoop::run_for`] drains tasks and
//!   sleeps until the next timer is due.
//! - [`RunLoop::lab`]: manual clock for deterministic tests. Time moves only
//!   through [`RunLoop::advance`] and [`RunLoop::run_until_idle`].
//!
//! # Invariants
//!
//! 1. Tasks run in the order they were scheduled. A task scheduled from
//!    inside a running task runs in the same drain, after those already
//!    queued.
//! 2. Timers fire in deadline order; equal deadlines fire in scheduling order.
//! 3. A cancelled task or timer never runs.
//! 4. Cloned handles share one queue and one clock.
//!
//! # Failure Modes
//!
//! - **Task panics**: not caught. The panicking task is already off the queue,
//!   so a caller that recovers can keep draining.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use tracing::trace;
use web_time::{Duration, Instant};

use crate::disposable::Disposable;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce()>;

/// Somewhere to run tasks.
pub trait Scheduler {
    /// Run `task` as soon as possible. Disposing the handle cancels it if it
    /// has not run yet.
    fn schedule(&self, task: Task) -> Disposable;

    /// Run `task` once `delay` has elapsed on this scheduler's clock.
    fn schedule_after(&self, delay: Duration, task: Task) -> Disposable;

    /// Current time on this scheduler's clock.
    fn now(&self) -> Instant;
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

enum Clock {
    Wall,
    Lab { epoch: Instant, offset: Cell<Duration> },
}

impl Clock {
    fn now(&self) -> Instant {
        match self {
            Self::Wall => Instant::now(),
            Self::Lab { epoch, offset } => *epoch + offset.get(),
        }
    }

    fn is_lab(&self) -> bool {
        matches!(self, Self::Lab { .. })
    }

    /// Move a lab clock forward to `deadline`. No-op for the wall clock and
    /// for deadlines in the past.
    fn jump_to(&self, deadline: Instant) {
        if let Self::Lab { epoch, offset } = self {
            let target = deadline.saturating_duration_since(*epoch);
            if target > offset.get() {
                offset.set(target);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RunLoop
// ---------------------------------------------------------------------------

type TimerKey = (Instant, u64);

struct RunLoopInner {
    clock: Clock,
    tasks: RefCell<VecDeque<(Disposable, Task)>>,
    timers: RefCell<BTreeMap<TimerKey, (Disposable, Task)>>,
    next_seq: Cell<u64>,
}

/// The main delivery context.
#[derive(Clone)]
pub struct RunLoop {
    inner: Rc<RunLoopInner>,
}

impl Default for RunLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl RunLoop {
    /// A run loop on the wall clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Clock::Wall)
    }

    /// A run loop on a manual clock starting at the current instant.
    #[must_use]
    pub fn lab() -> Self {
        Self::with_clock(Clock::Lab {
            epoch: Instant::now(),
            offset: Cell::new(Duration::ZERO),
        })
    }

    fn with_clock(clock: Clock) -> Self {
        Self {
            inner: Rc::new(RunLoopInner {
                clock,
                tasks: RefCell::new(VecDeque::new()),
                timers: RefCell::new(BTreeMap::new()),
                next_seq: Cell::new(0),
            }),
        }
    }

    #[must_use]
    pub fn is_lab(&self) -> bool {
        self.inner.clock.is_lab()
    }

    /// Queued tasks that have not been cancelled.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.inner
            .tasks
            .borrow()
            .iter()
            .filter(|(cancel, _)| !cancel.is_disposed())
            .count()
    }

    /// Armed timers that have not been cancelled.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.inner
            .timers
            .borrow()
            .values()
            .filter(|(cancel, _)| !cancel.is_disposed())
            .count()
    }

    /// Run every queued task, including tasks queued while draining.
    /// Returns the number of tasks that ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.inner.tasks.borrow_mut().pop_front();
            let Some((cancel, task)) = next else {
                break;
            };
            if cancel.is_disposed() {
                continue;
            }
            task();
            ran += 1;
        }
        ran
    }

    /// Alias for [`run_pending`](Self::run_pending).
    pub fn drain(&self) -> usize {
        self.run_pending()
    }

    /// Fire every timer due at or before the current time, draining tasks
    /// after each one. Returns the number of timers fired.
    fn fire_due_timers(&self) -> usize {
        let mut fired = 0;
        loop {
            let now = self.now();
            let due = {
                let mut timers = self.inner.timers.borrow_mut();
                let key = timers
                    .first_key_value()
                    .map(|(&key, _)| key)
                    .filter(|&(deadline, _)| deadline <= now);
                key.and_then(|key| timers.remove_entry(&key))
            };
            let Some(((deadline, seq), (cancel, task))) = due else {
                break;
            };
            if cancel.is_disposed() {
                continue;
            }
            let late_us = now.saturating_duration_since(deadline).as_micros() as u64;
            trace!(seq, late_us, "timer fired");
            task();
            fired += 1;
            self.run_pending();
        }
        fired
    }

    fn next_deadline(&self) -> Option<Instant> {
        let mut timers = self.inner.timers.borrow_mut();
        // Prune cancelled timers at the front so they do not hold the loop.
        while timers
            .first_key_value()
            .is_some_and(|(_, (cancel, _))| cancel.is_disposed())
        {
            timers.pop_first();
        }
        timers.first_key_value().map(|(&(deadline, _), _)| deadline)
    }

    /// Lab clock: move time forward by `delta`, firing due timers in deadline
    /// order with the clock set to each timer's deadline as it fires.
    ///
    /// Wall clock: drain tasks and fire whatever is already due; `delta` is
    /// ignored.
    pub fn advance(&self, delta: Duration) {
        self.run_pending();
        if !self.is_lab() {
            self.fire_due_timers();
            return;
        }
        let target = self.now() + delta;
        while let Some(deadline) = self.next_deadline() {
            if deadline > target {
                break;
            }
            self.inner.clock.jump_to(deadline);
            self.fire_due_timers();
        }
        self.inner.clock.jump_to(target);
        self.run_pending();
    }

    /// Run until no tasks and no timers remain. A lab clock jumps straight to
    /// each deadline; a wall clock sleeps.
    ///
    /// A periodic timer never lets the loop go idle; use
    /// [`run_for`](Self::run_for) or [`advance`](Self::advance) instead.
    pub fn run_until_idle(&self) {
        loop {
            self.run_pending();
            let Some(deadline) = self.next_deadline() else {
                break;
            };
            self.wait_until(deadline);
            self.fire_due_timers();
        }
    }

    /// Run tasks and timers for `duration` of this loop's clock.
    pub fn run_for(&self, duration: Duration) {
        if self.is_lab() {
            self.advance(duration);
            return;
        }
        let end = self.now() + duration;
        loop {
            self.run_pending();
            self.fire_due_timers();
            let wake = self.next_deadline().map_or(end, |deadline| deadline.min(end));
            if self.now() >= end {
                break;
            }
            self.wait_until(wake);
        }
    }

    fn wait_until(&self, deadline: Instant) {
        if self.is_lab() {
            self.inner.clock.jump_to(deadline);
            return;
        }
        let remaining = deadline.saturating_duration_since(self.now());
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
    }
}

impl Scheduler for RunLoop {
    fn schedule(&self, task: Task) -> Disposable {
        let cancel = Disposable::composite();
        self.inner
            .tasks
            .borrow_mut()
            .push_back((cancel.clone(), task));
        cancel
    }

    fn schedule_after(&self, delay: Duration, task: Task) -> Disposable {
        let cancel = Disposable::composite();
        let seq = self.inner.next_seq.get();
        self.inner.next_seq.set(seq + 1);
        let deadline = self.now() + delay;
        trace!(seq, delay_us = delay.as_micros() as u64, "timer armed");
        self.inner
            .timers
            .borrow_mut()
            .insert((deadline, seq), (cancel.clone(), task));
        cancel
    }

    fn now(&self) -> Instant {
        self.inner.clock.now()
    }
}

impl fmt::Debug for RunLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunLoop")
            .field("lab", &self.is_lab())
            .field("tasks", &self.inner.tasks.borrow().len())
            .field("timers", &self.inner.timers.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> (Rc<RefCell<Vec<&'static str>>>, impl Fn(&'static str) -> Task) {
        let entries = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&entries);
        let push = move |label: &'static str| -> Task {
            let sink = Rc::clone(&sink);
            Box::new(move || sink.borrow_mut().push(label))
        };
        (entries, push)
    }

    #[test]
    fn tasks_run_in_fifo_order() {
        let run_loop = RunLoop::lab();
        let (entries, push) = log();
        let _a = run_loop.schedule(push("a"));
        let _b = run_loop.schedule(push("b"));
        assert_eq!(run_loop.pending_tasks(), 2);
        assert_eq!(run_loop.run_pending(), 2);
        assert_eq!(*entries.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn nested_task_runs_in_same_drain() {
        let run_loop = RunLoop::lab();
        let (entries, push) = log();
        let inner_loop = run_loop.clone();
        let nested = push("nested");
        let sink = Rc::clone(&entries);
        let _outer = run_loop.schedule(Box::new(move || {
            sink.borrow_mut().push("outer");
            let _ = inner_loop.schedule(nested);
        }));
        let _after = run_loop.schedule(push("after"));
        run_loop.drain();
        assert_eq!(*entries.borrow(), vec!["outer", "after", "nested"]);
    }

    #[test]
    fn cancelled_task_never_runs() {
        let run_loop = RunLoop::lab();
        let (entries, push) = log();
        let handle = run_loop.schedule(push("cancelled"));
        handle.dispose();
        assert_eq!(run_loop.pending_tasks(), 0);
        assert_eq!(run_loop.run_pending(), 0);
        assert!(entries.borrow().is_empty());
    }

    #[test]
    fn timers_fire_in_deadline_order() {
        let run_loop = RunLoop::lab();
        let (entries, push) = log();
        let _late = run_loop.schedule_after(Duration::from_millis(30), push("late"));
        let _early = run_loop.schedule_after(Duration::from_millis(10), push("early"));
        let _tie = run_loop.schedule_after(Duration::from_millis(10), push("tie"));

        run_loop.advance(Duration::from_millis(5));
        assert!(entries.borrow().is_empty());

        run_loop.advance(Duration::from_millis(5));
        assert_eq!(*entries.borrow(), vec!["early", "tie"]);

        run_loop.advance(Duration::from_millis(100));
        assert_eq!(*entries.borrow(), vec!["early", "tie", "late"]);
        assert_eq!(run_loop.pending_timers(), 0);
    }

    #[test]
    fn lab_clock_reads_deadline_inside_timer() {
        let run_loop = RunLoop::lab();
        let start = run_loop.now();
        let seen = Rc::new(Cell::new(Duration::ZERO));
        let observed = Rc::clone(&seen);
        let clock = run_loop.clone();
        let _timer = run_loop.schedule_after(
            Duration::from_secs(2),
            Box::new(move || observed.set(clock.now() - start)),
        );
        run_loop.advance(Duration::from_secs(5));
        assert_eq!(seen.get(), Duration::from_secs(2));
        assert_eq!(run_loop.now() - start, Duration::from_secs(5));
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let run_loop = RunLoop::lab();
        let (entries, push) = log();
        let handle = run_loop.schedule_after(Duration::from_millis(1), push("x"));
        handle.dispose();
        run_loop.run_until_idle();
        assert!(entries.borrow().is_empty());
    }

    #[test]
    fn run_until_idle_jumps_lab_clock() {
        let run_loop = RunLoop::lab();
        let start = run_loop.now();
        let (entries, push) = log();
        let _timer = run_loop.schedule_after(Duration::from_secs(60), push("minute"));
        run_loop.run_until_idle();
        assert_eq!(*entries.borrow(), vec!["minute"]);
        assert_eq!(run_loop.now() - start, Duration::from_secs(60));
    }

    #[test]
    fn wall_clock_run_for_fires_short_timer() {
        let run_loop = RunLoop::new();
        assert!(!run_loop.is_lab());
        let (entries, push) = log();
        let _timer = run_loop.schedule_after(Duration::from_millis(1), push("tick"));
        run_loop.run_for(Duration::from_millis(20));
        assert_eq!(*entries.borrow(), vec!["tick"]);
    }
}
