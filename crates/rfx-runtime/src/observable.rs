#![forbid(unsafe_code)]

//! Shared, version-tracked mutable value with change notification.
//!
//! [`Observable<T>`] is the state cell behind command flags and widget
//! properties. [`Observable::signal`] turns it into a [`Signal`] that emits
//! the value current at subscription time followed by every change.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per mutation that changes the value.
//! 2. Setting a value equal to the current value is a no-op (no version bump,
//!    no notification).
//! 3. Subscribers are notified in subscription order, after the new value is
//!    stored, so reads from inside a callback see the new value.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::disposable::Disposable;
use crate::signal::{Signal, Subject};

struct ObservableInner<T> {
    value: RefCell<T>,
    version: Cell<u64>,
    changes: Subject<T>,
}

/// A shared value cell. Cloning yields a handle to the same cell.
pub struct Observable<T> {
    inner: Rc<ObservableInner<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(ObservableInner {
                value: RefCell::new(value),
                version: Cell::new(0),
                changes: Subject::new(),
            }),
        }
    }

    /// A clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value without cloning.
    pub fn with<R>(&self, read: impl FnOnce(&T) -> R) -> R {
        read(&self.inner.value.borrow())
    }

    /// Store `value`, notifying subscribers if it differs from the current
    /// one. Returns whether anything changed.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return false;
            }
            *current = value.clone();
        }
        self.inner.version.set(self.inner.version.get() + 1);
        self.inner.changes.send_next(value);
        true
    }

    /// Modify the value in place. Notifies only if the result differs.
    pub fn update(&self, modify: impl FnOnce(&mut T)) -> bool {
        let mut next = self.get();
        modify(&mut next);
        self.set(next)
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Current value on subscribe, then every change.
    ///
    /// A subscriber that joins while a change is still queued for delivery
    /// already sees it as the current value; repeats are dropped.
    #[must_use]
    pub fn signal(&self) -> Signal<T> {
        let inner = Rc::clone(&self.inner);
        let changes = self.inner.changes.signal();
        Signal::create(move |observer| {
            let current = inner.value.borrow().clone();
            observer.send_next(current);
            if observer.is_closed() {
                return Disposable::empty();
            }
            changes.forward_to(observer)
        })
        .skip_repeats()
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("value", &*self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .finish()
    }
}
