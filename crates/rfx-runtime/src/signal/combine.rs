#![forbid(unsafe_code)]

//! Latest-value combination of several signals.
//!
//! Two entry points share one behavior: once every input has emitted at
//! least once, any emission from any input produces a new combined value
//! built from the latest value of each input.
//!
//! - [`combine_latest`] / [`combine_latest_with`] take a tuple of typed
//!   signals (1 to 6). The compiler checks arity.
//! - [`reduce_latest`] takes a homogeneous `Vec` and a [`Reducer`] that
//!   declares how many arguments it takes. A mismatch is reported as
//!   [`BindingError::ArityMismatch`] before anything is subscribed.
//!
//! The combined signal fails as soon as any input fails and completes once
//! every input has completed.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::{Event, Observer, Signal};
use crate::disposable::Disposable;
use crate::error::{BindingError, Result};

/// A tuple of signals that can be combined by latest value.
pub trait CombineLatest {
    type Output: Clone + 'static;

    fn combine_latest(self) -> Signal<Self::Output>;
}

/// Combine a tuple of signals into a signal of tuples.
pub fn combine_latest<C: CombineLatest>(sources: C) -> Signal<C::Output> {
    sources.combine_latest()
}

/// Combine a tuple of signals and reduce each combined tuple with `reduce`.
pub fn combine_latest_with<C, R>(sources: C, reduce: impl Fn(C::Output) -> R + 'static) -> Signal<R>
where
    C: CombineLatest,
    R: Clone + 'static,
{
    sources.combine_latest().map(reduce)
}

macro_rules! impl_combine_latest {
    ($count:expr; $($T:ident $value:ident $idx:tt),+) => {
        impl<$($T: Clone + 'static),+> CombineLatest for ($(Signal<$T>,)+) {
            type Output = ($($T,)+);

            fn combine_latest(self) -> Signal<Self::Output> {
                let sources = self;
                Signal::create(move |observer: Observer<Self::Output>| {
                    let latest: Rc<RefCell<($(Option<$T>,)+)>> = Rc::new(RefCell::new(Default::default()));
                    let remaining = Rc::new(Cell::new($count));
                    let ready = |slots: &($(Option<$T>,)+)| -> Option<($($T,)+)> {
                        match slots {
                            ($(Some($value),)+) => Some(($($value.clone(),)+)),
                            _ => None,
                        }
                    };
                    let group = Disposable::composite();
                    $(
                        if !observer.is_closed() {
                            let latest = Rc::clone(&latest);
                            let remaining = Rc::clone(&remaining);
                            let observer = observer.clone();
                            group.add(sources.$idx.observe_with(move |event| match event {
                                Event::Next(value) => {
                                    let snapshot = {
                                        let mut slots = latest.borrow_mut();
                                        slots.$idx = Some(value);
                                        ready(&*slots)
                                    };
                                    if let Some(snapshot) = snapshot {
                                        observer.send_next(snapshot);
                                    }
                                }
                                Event::Failed(err) => observer.send_failed(err),
                                Event::Completed => {
                                    remaining.set(remaining.get() - 1);
                                    if remaining.get() == 0 {
                                        observer.send_completed();
                                    }
                                }
                            }));
                        }
                    )+
                    group
                })
            }
        }
    };
}

impl_combine_latest!(1; A a 0);
impl_combine_latest!(2; A a 0, B b 1);
impl_combine_latest!(3; A a 0, B b 1, C c 2);
impl_combine_latest!(4; A a 0, B b 1, C c 2, D d 3);
impl_combine_latest!(5; A a 0, B b 1, C c 2, D d 3, E e 4);
impl_combine_latest!(6; A a 0, B b 1, C c 2, D d 3, E e 4, F f 5);

// ---------------------------------------------------------------------------
// Dynamic arity
// ---------------------------------------------------------------------------

impl<T: Clone + 'static> Signal<T> {
    /// Combine any number of same-typed signals into a signal of `Vec`s.
    ///
    /// With no inputs the result completes immediately.
    pub fn combine_latest_all(signals: Vec<Signal<T>>) -> Signal<Vec<T>> {
        let signals: Rc<[Signal<T>]> = signals.into();
        Signal::create(move |observer: Observer<Vec<T>>| {
            if signals.is_empty() {
                observer.send_completed();
                return Disposable::empty();
            }
            let latest: Rc<RefCell<Vec<Option<T>>>> =
                Rc::new(RefCell::new(vec![None; signals.len()]));
            let remaining = Rc::new(Cell::new(signals.len()));
            let group = Disposable::composite();
            for (index, source) in signals.iter().enumerate() {
                if observer.is_closed() {
                    break;
                }
                let latest = Rc::clone(&latest);
                let remaining = Rc::clone(&remaining);
                let observer = observer.clone();
                group.add(source.observe_with(move |event| match event {
                    Event::Next(value) => {
                        let snapshot = {
                            let mut slots = latest.borrow_mut();
                            slots[index] = Some(value);
                            slots.iter().cloned().collect::<Option<Vec<T>>>()
                        };
                        if let Some(snapshot) = snapshot {
                            observer.send_next(snapshot);
                        }
                    }
                    Event::Failed(err) => observer.send_failed(err),
                    Event::Completed => {
                        remaining.set(remaining.get() - 1);
                        if remaining.get() == 0 {
                            observer.send_completed();
                        }
                    }
                }));
            }
            group
        })
    }
}

/// A reduce function that declares how many arguments it takes.
pub struct Reducer<T, R> {
    arity: usize,
    reduce: Rc<dyn Fn(&[T]) -> R>,
}

impl<T, R> Clone for Reducer<T, R> {
    fn clone(&self) -> Self {
        Self {
            arity: self.arity,
            reduce: Rc::clone(&self.reduce),
        }
    }
}

impl<T, R> fmt::Debug for Reducer<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reducer").field("arity", &self.arity).finish()
    }
}

impl<T: 'static, R: 'static> Reducer<T, R> {
    /// A reducer over a slice of exactly `arity` values.
    pub fn variadic(arity: usize, reduce: impl Fn(&[T]) -> R + 'static) -> Self {
        Self {
            arity,
            reduce: Rc::new(reduce),
        }
    }

    pub fn unary(reduce: impl Fn(&T) -> R + 'static) -> Self {
        Self::variadic(1, move |v| reduce(&v[0]))
    }

    pub fn binary(reduce: impl Fn(&T, &T) -> R + 'static) -> Self {
        Self::variadic(2, move |v| reduce(&v[0], &v[1]))
    }

    pub fn ternary(reduce: impl Fn(&T, &T, &T) -> R + 'static) -> Self {
        Self::variadic(3, move |v| reduce(&v[0], &v[1], &v[2]))
    }

    pub fn quaternary(reduce: impl Fn(&T, &T, &T, &T) -> R + 'static) -> Self {
        Self::variadic(4, move |v| reduce(&v[0], &v[1], &v[2], &v[3]))
    }

    pub fn quinary(reduce: impl Fn(&T, &T, &T, &T, &T) -> R + 'static) -> Self {
        Self::variadic(5, move |v| reduce(&v[0], &v[1], &v[2], &v[3], &v[4]))
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.arity
    }

    fn apply(&self, values: &[T]) -> R {
        (self.reduce)(values)
    }
}

/// Combine `signals` by latest value and reduce each combination.
///
/// # Errors
///
/// [`BindingError::ArityMismatch`] when `reducer` does not take exactly one
/// argument per signal. Nothing is subscribed in that case.
pub fn reduce_latest<T, R>(signals: Vec<Signal<T>>, reducer: Reducer<T, R>) -> Result<Signal<R>>
where
    T: Clone + 'static,
    R: Clone + 'static,
{
    if reducer.arity() != signals.len() {
        return Err(BindingError::ArityMismatch {
            expected: reducer.arity(),
            actual: signals.len(),
        });
    }
    trace!(arity = reducer.arity(), "reduce_latest composed");
    Ok(Signal::combine_latest_all(signals).map(move |values| reducer.apply(&values)))
}
