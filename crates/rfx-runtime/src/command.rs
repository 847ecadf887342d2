#![forbid(unsafe_code)]

//! Gated, serialized actions.
//!
//! A [`Command`] wraps one or more action factories behind a can-execute
//! predicate signal and publishes its own state as signals: whether it is
//! executing, whether it can execute, the per-invocation result signals, and
//! the failures of those results.
//!
//! # Invariants
//!
//! 1. At most one execution is in flight. `execute` checks the predicate and
//!    the executing flag and sets the flag in one step, before any factory
//!    runs; a reentrant `execute` from inside a factory is rejected.
//! 2. A rejected `execute` invokes no factory and leaves the executing flag
//!    untouched.
//! 3. Every factory runs exactly once per accepted execution; its result is
//!    replayed to any number of subscribers.
//! 4. `executing` returns to `false` once every result signal of the
//!    execution has completed or failed.
//!
//! # Failure Modes
//!
//! - **Result never terminates**: the command stays executing and rejects
//!   every later invocation.
//! - **Predicate signal fails or completes**: its last value stays in effect.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::disposable::Subscription;
use crate::error::{BindingError, Result, SignalError};
use crate::kvc::{KeyValueCoding, ObjectRef, Value, observe_known_key};
use crate::observable::Observable;
use crate::signal::{Event, Signal, Subject, combine_latest};

static NEXT_COMMAND_ID: AtomicU64 = AtomicU64::new(1);

/// Key under which [`Command`] exposes `can_execute()` through key-value coding.
pub const CAN_EXECUTE_KEY: &str = "can_execute";
/// Key under which [`Command`] exposes `is_executing()` through key-value coding.
pub const EXECUTING_KEY: &str = "executing";

type Factory<I, R> = Rc<dyn Fn(I) -> Signal<R>>;

struct Action<I, R> {
    factory: Factory<I, R>,
    results: Subject<Signal<R>>,
}

impl<I, R> Clone for Action<I, R> {
    fn clone(&self) -> Self {
        Self {
            factory: Rc::clone(&self.factory),
            results: self.results.clone(),
        }
    }
}

struct CommandInner<I, R> {
    id: u64,
    predicate: Observable<bool>,
    executing: Observable<bool>,
    actions: RefCell<Vec<Action<I, R>>>,
    errors: Subject<SignalError>,
    _predicate_sub: Subscription,
}

/// An action gated by a predicate, executed at most once at a time.
///
/// Cloning yields a handle to the same command.
pub struct Command<I, R> {
    inner: Rc<CommandInner<I, R>>,
}

impl<I, R> Clone for Command<I, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<I: Clone + 'static, R: Clone + 'static> Command<I, R> {
    /// A command enabled whenever `can_execute` last emitted `true`. Until the
    /// first emission it counts as enabled.
    #[must_use]
    pub fn new(can_execute: &Signal<bool>) -> Self {
        let predicate = Observable::new(true);
        let sink = predicate.clone();
        let predicate_sub = can_execute.subscribe_next(move |allowed| {
            sink.set(allowed);
        });
        Self {
            inner: Rc::new(CommandInner {
                id: NEXT_COMMAND_ID.fetch_add(1, Ordering::Relaxed),
                predicate,
                executing: Observable::new(false),
                actions: RefCell::new(Vec::new()),
                errors: Subject::new(),
                _predicate_sub: predicate_sub,
            }),
        }
    }

    /// A command that is always enabled while idle.
    #[must_use]
    pub fn enabled() -> Self {
        Self::new(&Signal::never())
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Register `factory`. The returned signal emits the result signal of
    /// every accepted execution.
    pub fn add_action(&self, factory: impl Fn(I) -> Signal<R> + 'static) -> Signal<Signal<R>> {
        let results = Subject::new();
        self.inner.actions.borrow_mut().push(Action {
            factory: Rc::new(factory),
            results: results.clone(),
        });
        results.signal()
    }

    /// Run every registered action with `input`.
    ///
    /// Returns the concatenated results. When the predicate is false or an
    /// execution is already in flight, returns a signal that fails with
    /// [`SignalError::NotExecutable`] and runs nothing.
    pub fn execute(&self, input: I) -> Signal<R> {
        let inner = &self.inner;
        if !inner.predicate.get() || inner.executing.get() {
            debug!(
                command = inner.id,
                executing = inner.executing.get(),
                "execution rejected"
            );
            return Signal::fail(SignalError::NotExecutable);
        }
        inner.executing.set(true);

        let actions: Vec<Action<I, R>> = inner.actions.borrow().clone();
        debug!(command = inner.id, actions = actions.len(), "execution accepted");
        if actions.is_empty() {
            inner.executing.set(false);
            return Signal::empty();
        }

        let pending = Rc::new(Cell::new(actions.len()));
        let mut results = Vec::with_capacity(actions.len());
        for action in actions {
            let result = (action.factory)(input.clone()).replay();
            let tracker = Rc::downgrade(inner);
            let remaining = Rc::clone(&pending);
            let _ = result
                .subscribe(move |event| finish_one(&tracker, &remaining, event))
                .detach();
            action.results.send_next(result.clone());
            results.push(result);
        }
        Signal::concat(results)
    }

    /// Snapshot of `predicate && !executing`.
    #[must_use]
    pub fn can_execute(&self) -> bool {
        self.inner.predicate.get() && !self.inner.executing.get()
    }

    #[must_use]
    pub fn is_executing(&self) -> bool {
        self.inner.executing.get()
    }

    /// `predicate && !executing`: current value on subscribe, then changes.
    #[must_use]
    pub fn can_execute_signal(&self) -> Signal<bool> {
        combine_latest((self.inner.predicate.signal(), self.inner.executing.signal()))
            .map(|(allowed, executing)| allowed && !executing)
            .skip_repeats()
    }

    /// Current executing state on subscribe, then changes.
    #[must_use]
    pub fn executing_signal(&self) -> Signal<bool> {
        self.inner.executing.signal()
    }

    /// Failures of execution results.
    #[must_use]
    pub fn errors_signal(&self) -> Signal<SignalError> {
        self.inner.errors.signal()
    }

    /// This command as a key-value coding object exposing
    /// [`CAN_EXECUTE_KEY`] and [`EXECUTING_KEY`].
    #[must_use]
    pub fn as_object(&self) -> ObjectRef {
        Rc::new(self.clone())
    }
}

fn finish_one<I, R>(tracker: &Weak<CommandInner<I, R>>, remaining: &Cell<usize>, event: Event<R>) {
    let failure = match event {
        Event::Next(_) => return,
        Event::Failed(err) => Some(err),
        Event::Completed => None,
    };
    let Some(inner) = tracker.upgrade() else {
        return;
    };
    if let Some(err) = failure {
        debug!(command = inner.id, error = %err, "execution result failed");
        inner.errors.send_next(err);
    }
    remaining.set(remaining.get().saturating_sub(1));
    if remaining.get() == 0 {
        debug!(command = inner.id, "execution finished");
        inner.executing.set(false);
    }
}

impl<I: Clone + 'static, R: Clone + 'static> KeyValueCoding for Command<I, R> {
    fn describe(&self) -> String {
        format!("Command#{}", self.inner.id)
    }

    fn value_for_key(&self, key: &str) -> Option<Value> {
        match key {
            CAN_EXECUTE_KEY => Some(Value::Bool(self.can_execute())),
            EXECUTING_KEY => Some(Value::Bool(self.is_executing())),
            _ => None,
        }
    }

    fn set_value_for_key(&self, key: &str, _value: Value) -> Result<()> {
        if self.value_for_key(key).is_none() {
            return Err(crate::kvc::unknown_key(self, key));
        }
        Err(BindingError::ReadOnlyKey {
            target: self.describe(),
            key: key.to_owned(),
        })
    }

    fn observe_key(&self, key: &str) -> Signal<Value> {
        observe_known_key(self, key, || {
            let flag = if key == CAN_EXECUTE_KEY {
                self.can_execute_signal()
            } else {
                self.executing_signal()
            };
            flag.map(Value::Bool)
        })
    }
}

impl<I, R> fmt::Debug for Command<I, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.inner.id)
            .field("actions", &self.inner.actions.borrow().len())
            .finish_non_exhaustive()
    }
}
