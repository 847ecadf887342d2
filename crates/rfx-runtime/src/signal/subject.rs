#![forbid(unsafe_code)]

//! Hot, multicast signal source.
//!
//! # Invariants
//!
//! 1. Every subscriber sees events in send order. A send made while the
//!    subject is delivering is queued and delivered after the current event
//!    has reached every subscriber.
//! 2. Nothing is delivered after a terminal event.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use super::{Event, Observer, Signal};
use crate::disposable::Disposable;
use crate::error::SignalError;

struct SubjectInner<T> {
    observers: RefCell<Vec<(u64, Observer<T>)>>,
    next_id: Cell<u64>,
    terminal: RefCell<Option<Event<T>>>,
    /// Values kept for late subscribers; `None` when not replaying.
    history: RefCell<Option<Vec<T>>>,
    pending: RefCell<VecDeque<Event<T>>>,
    delivering: Cell<bool>,
}

/// Clears the delivering flag even if an observer panics.
struct DeliveryGuard<'a>(&'a Cell<bool>);

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// A push source that multicasts to every current subscriber.
///
/// Subscribers that arrive after termination receive the terminal event
/// immediately. A replaying subject additionally delivers every value sent
/// so far.
pub struct Subject<T> {
    inner: Rc<SubjectInner<T>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> Subject<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_history(None)
    }

    #[must_use]
    pub fn replaying() -> Self {
        Self::with_history(Some(Vec::new()))
    }

    fn with_history(history: Option<Vec<T>>) -> Self {
        Self {
            inner: Rc::new(SubjectInner {
                observers: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
                terminal: RefCell::new(None),
                history: RefCell::new(history),
                pending: RefCell::new(VecDeque::new()),
                delivering: Cell::new(false),
            }),
        }
    }

    pub fn send(&self, event: Event<T>) {
        self.inner.pending.borrow_mut().push_back(event);
        if self.inner.delivering.get() {
            return;
        }
        self.inner.delivering.set(true);
        let _guard = DeliveryGuard(&self.inner.delivering);
        loop {
            let next = self.inner.pending.borrow_mut().pop_front();
            let Some(event) = next else {
                break;
            };
            self.deliver(event);
        }
    }

    fn deliver(&self, event: Event<T>) {
        if self.inner.terminal.borrow().is_some() {
            return;
        }
        match &event {
            Event::Next(value) => {
                if let Some(history) = self.inner.history.borrow_mut().as_mut() {
                    history.push(value.clone());
                }
            }
            Event::Failed(_) | Event::Completed => {
                *self.inner.terminal.borrow_mut() = Some(event.clone());
            }
        }
        // Snapshot so observers may subscribe or unsubscribe while we deliver.
        let observers: Vec<Observer<T>> = self
            .inner
            .observers
            .borrow()
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();
        if event.is_terminal() {
            self.inner.observers.borrow_mut().clear();
        }
        for observer in observers {
            observer.send(event.clone());
        }
    }

    pub fn send_next(&self, value: T) {
        self.send(Event::Next(value));
    }

    pub fn send_failed(&self, err: SignalError) {
        self.send(Event::Failed(err));
    }

    pub fn send_completed(&self) {
        self.send(Event::Completed);
    }

    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.inner.terminal.borrow().is_some()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner
            .observers
            .borrow()
            .iter()
            .filter(|(_, observer)| !observer.is_closed())
            .count()
    }

    /// A signal that subscribes to this subject.
    #[must_use]
    pub fn signal(&self) -> Signal<T> {
        let inner = Rc::clone(&self.inner);
        Signal::create(move |observer: Observer<T>| {
            let history = inner.history.borrow().clone();
            for value in history.into_iter().flatten() {
                observer.send_next(value);
            }
            let terminal = inner.terminal.borrow().clone();
            if let Some(event) = terminal {
                observer.send(event);
                return Disposable::empty();
            }
            if observer.is_closed() {
                return Disposable::empty();
            }

            let id = inner.next_id.get();
            inner.next_id.set(id + 1);
            inner.observers.borrow_mut().push((id, observer));

            let weak = Rc::downgrade(&inner);
            Disposable::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.observers.borrow_mut().retain(|(other, _)| *other != id);
                }
            })
        })
    }
}

impl<T> fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subject")
            .field("observers", &self.inner.observers.borrow().len())
            .field("terminated", &self.inner.terminal.borrow().is_some())
            .finish()
    }
}
