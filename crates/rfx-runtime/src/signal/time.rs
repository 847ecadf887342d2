#![forbid(unsafe_code)]

//! Scheduler-aware operators.

use std::cell::RefCell;
use std::rc::Rc;

use web_time::{Duration, Instant};

use super::{Observer, Signal};
use crate::disposable::Disposable;
use crate::scheduler::Scheduler;

impl<T: Clone + 'static> Signal<T> {
    /// Deliver every event through `scheduler`.
    ///
    /// Order is preserved; only the context changes. Events still queued
    /// when the subscription is disposed are dropped on delivery.
    pub fn deliver_on<S: Scheduler + Clone + 'static>(&self, scheduler: S) -> Signal<T> {
        let upstream = self.clone();
        Signal::create(move |observer: Observer<T>| {
            let scheduler = scheduler.clone();
            upstream.observe_with(move |event| {
                let observer = observer.clone();
                // Handle not kept: a closed observer ignores the event.
                let _ = scheduler.schedule(Box::new(move || observer.send(event)));
            })
        })
    }
}

impl Signal<Instant> {
    /// Emit the scheduler's current time once every `period`, forever.
    pub fn interval<S: Scheduler + Clone + 'static>(period: Duration, scheduler: S) -> Self {
        Signal::create(move |observer: Observer<Instant>| {
            let timer: Rc<RefCell<Disposable>> = Rc::new(RefCell::new(Disposable::empty()));
            arm_tick(&scheduler, period, &observer, &timer);
            Disposable::new(move || {
                let current = timer.replace(Disposable::empty());
                current.dispose();
            })
        })
    }
}

fn arm_tick<S: Scheduler + Clone + 'static>(
    scheduler: &S,
    period: Duration,
    observer: &Observer<Instant>,
    timer: &Rc<RefCell<Disposable>>,
) {
    if observer.is_closed() {
        return;
    }
    let tick_scheduler = scheduler.clone();
    let tick_observer = observer.clone();
    let tick_timer = Rc::clone(timer);
    let handle = scheduler.schedule_after(
        period,
        Box::new(move || {
            tick_observer.send_next(tick_scheduler.now());
            arm_tick(&tick_scheduler, period, &tick_observer, &tick_timer);
        }),
    );
    *timer.borrow_mut() = handle;
}
