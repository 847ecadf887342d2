#![forbid(unsafe_code)]

//! Push-based, composable value streams.
//!
//! A [`Signal<T>`] is a cold producer: every subscription runs its own copy
//! of the producer chain, so one signal can feed any number of combinators.
//! Hot sources (UI events, property changes) are built on a [`Subject`].
//!
//! # Event grammar
//!
//! `Next* (Failed | Completed)?`. After a terminal event the observer is
//! closed and drops everything else it is sent.
//!
//! # Invariants
//!
//! 1. Combinators never mutate their receiver; they return a new `Signal`.
//! 2. For one subscriber, values arrive in the order the source produced them.
//! 3. Disposing a subscription synchronously stops delivery to that
//!    subscriber and tears down the upstream chain it created.
//! 4. A terminal event disposes the subscription's upstream chain.
//!
//! # Failure Modes
//!
//! - **Transform fails** (`try_map`): the downstream observer receives
//!   `Failed`, and upstream is unsubscribed.
//! - **Observer panics**: not caught; unwinds through the producer.

mod combine;
mod flatten;
mod subject;
mod time;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::disposable::{Disposable, Subscription};
use crate::error::SignalError;

pub use combine::{CombineLatest, Reducer, combine_latest, combine_latest_with, reduce_latest};
pub use subject::Subject;

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// One notification delivered to an observer.
#[derive(Debug, Clone, PartialEq)]
pub enum Event<T> {
    Next(T),
    Failed(SignalError),
    Completed,
}

impl<T> Event<T> {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Next(_))
    }

    /// Relay a terminal event to an observer of another type. Returns the
    /// value for `Next`.
    fn relay_terminal<U>(self, observer: &Observer<U>) -> Option<T> {
        match self {
            Self::Next(value) => Some(value),
            Self::Failed(err) => {
                observer.send_failed(err);
                None
            }
            Self::Completed => {
                observer.send_completed();
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

struct ObserverInner<T> {
    sink: Box<dyn Fn(Event<T>)>,
    stopped: Cell<bool>,
    lifetime: Disposable,
}

/// Receiving end handed to a signal producer.
///
/// Cloning shares the same closed/open state.
pub struct Observer<T> {
    inner: Rc<ObserverInner<T>>,
}

impl<T> Clone for Observer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Observer<T> {
    fn new(sink: impl Fn(Event<T>) + 'static, lifetime: Disposable) -> Self {
        Self {
            inner: Rc::new(ObserverInner {
                sink: Box::new(sink),
                stopped: Cell::new(false),
                lifetime,
            }),
        }
    }

    pub fn send(&self, event: Event<T>) {
        if self.is_closed() {
            return;
        }
        let terminal = event.is_terminal();
        if terminal {
            self.inner.stopped.set(true);
        }
        (self.inner.sink)(event);
        if terminal {
            self.inner.lifetime.dispose();
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

    /// True once a terminal event was sent or the subscription was disposed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.stopped.get() || self.inner.lifetime.is_disposed()
    }
}

// ---------------------------------------------------------------------------
// Signal
// ---------------------------------------------------------------------------

type Producer<T> = dyn Fn(Observer<T>) -> Disposable;

/// A lazy, push-based sequence of values.
///
/// Cloning is cheap and yields a handle to the same producer.
pub struct Signal<T> {
    producer: Rc<Producer<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            producer: Rc::clone(&self.producer),
        }
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: Clone + 'static> Signal<T> {
    /// Build a signal from a producer. The producer runs once per
    /// subscription and returns the teardown for that subscription.
    pub fn create(producer: impl Fn(Observer<T>) -> Disposable + 'static) -> Self {
        Self {
            producer: Rc::new(producer),
        }
    }

    /// Emits `value` and completes.
    pub fn just(value: T) -> Self {
        Self::create(move |observer| {
            observer.send_next(value.clone());
            observer.send_completed();
            Disposable::empty()
        })
    }

    /// Completes immediately.
    pub fn empty() -> Self {
        Self::create(|observer| {
            observer.send_completed();
            Disposable::empty()
        })
    }

    /// Never emits and never terminates.
    pub fn never() -> Self {
        Self::create(|_| Disposable::empty())
    }

    /// Fails immediately with `err`.
    pub fn fail(err: SignalError) -> Self {
        Self::create(move |observer| {
            observer.send_failed(err.clone());
            Disposable::empty()
        })
    }

    /// Concatenate `signals`, subscribing to each only after the previous
    /// one completes.
    pub fn concat(signals: Vec<Signal<T>>) -> Self {
        signals
            .into_iter()
            .collect::<Signal<Signal<T>>>()
            .sequence_many(|inner| inner)
    }

    /// Subscribe with a raw event sink. The returned handle is not RAII.
    pub(crate) fn observe_with(&self, sink: impl Fn(Event<T>) + 'static) -> Disposable {
        let lifetime = Disposable::composite();
        let observer = Observer::new(sink, lifetime.clone());
        let upstream = (self.producer)(observer);
        lifetime.add(upstream);
        lifetime
    }

    /// Forward every event to an existing observer.
    pub(crate) fn forward_to(&self, observer: Observer<T>) -> Disposable {
        self.observe_with(move |event| observer.send(event))
    }

    // -- terminal operations ------------------------------------------------

    /// Subscribe to every event.
    pub fn subscribe(&self, sink: impl Fn(Event<T>) + 'static) -> Subscription {
        Subscription::new(self.observe_with(sink))
    }

    /// Subscribe to values only. Failures and completion are ignored.
    pub fn subscribe_next(&self, next: impl Fn(T) + 'static) -> Subscription {
        self.subscribe(move |event| {
            if let Event::Next(value) = event {
                next(value);
            }
        })
    }

    /// Subscribe with one callback per event kind.
    pub fn subscribe_with(
        &self,
        next: impl Fn(T) + 'static,
        failed: impl Fn(SignalError) + 'static,
        completed: impl Fn() + 'static,
    ) -> Subscription {
        self.subscribe(move |event| match event {
            Event::Next(value) => next(value),
            Event::Failed(err) => failed(err),
            Event::Completed => completed(),
        })
    }

    // -- combinators --------------------------------------------------------

    pub fn map<U: Clone + 'static>(&self, transform: impl Fn(T) -> U + 'static) -> Signal<U> {
        let upstream = self.clone();
        let transform = Rc::new(transform);
        Signal::create(move |observer: Observer<U>| {
            let transform = Rc::clone(&transform);
            upstream.observe_with(move |event| {
                if let Some(value) = event.relay_terminal(&observer) {
                    observer.send_next(transform(value));
                }
            })
        })
    }

    /// Like [`map`](Self::map), but an `Err` from `transform` terminates the
    /// resulting signal with that failure.
    pub fn try_map<U: Clone + 'static>(
        &self,
        transform: impl Fn(T) -> Result<U, SignalError> + 'static,
    ) -> Signal<U> {
        let upstream = self.clone();
        let transform = Rc::new(transform);
        Signal::create(move |observer: Observer<U>| {
            let transform = Rc::clone(&transform);
            upstream.observe_with(move |event| {
                if let Some(value) = event.relay_terminal(&observer) {
                    match transform(value) {
                        Ok(mapped) => observer.send_next(mapped),
                        Err(err) => observer.send_failed(err),
                    }
                }
            })
        })
    }

    pub fn filter(&self, predicate: impl Fn(&T) -> bool + 'static) -> Signal<T> {
        let upstream = self.clone();
        let predicate = Rc::new(predicate);
        Signal::create(move |observer: Observer<T>| {
            let predicate = Rc::clone(&predicate);
            upstream.observe_with(move |event| {
                if let Some(value) = event.relay_terminal(&observer) {
                    if predicate(&value) {
                        observer.send_next(value);
                    }
                }
            })
        })
    }

    /// Drop values equal to the previous value seen by this subscriber.
    pub fn skip_repeats(&self) -> Signal<T>
    where
        T: PartialEq,
    {
        let upstream = self.clone();
        Signal::create(move |observer: Observer<T>| {
            let last: RefCell<Option<T>> = RefCell::new(None);
            upstream.observe_with(move |event| {
                if let Some(value) = event.relay_terminal(&observer) {
                    let repeat = last.borrow().as_ref() == Some(&value);
                    if !repeat {
                        *last.borrow_mut() = Some(value.clone());
                        observer.send_next(value);
                    }
                }
            })
        })
    }

    /// Emit `initial` to each new subscriber before anything from upstream.
    pub fn start_with(&self, initial: T) -> Signal<T> {
        let upstream = self.clone();
        Signal::create(move |observer: Observer<T>| {
            observer.send_next(initial.clone());
            if observer.is_closed() {
                return Disposable::empty();
            }
            upstream.forward_to(observer)
        })
    }

    /// Running fold. Emits the accumulator after every upstream value; the
    /// seed itself is not emitted.
    pub fn scan_with_start<S: Clone + 'static>(
        &self,
        seed: S,
        combine: impl Fn(S, T) -> S + 'static,
    ) -> Signal<S> {
        let upstream = self.clone();
        let combine = Rc::new(combine);
        Signal::create(move |observer: Observer<S>| {
            let combine = Rc::clone(&combine);
            let running = RefCell::new(seed.clone());
            upstream.observe_with(move |event| {
                if let Some(value) = event.relay_terminal(&observer) {
                    let previous = running.borrow().clone();
                    let next = combine(previous, value);
                    *running.borrow_mut() = next.clone();
                    observer.send_next(next);
                }
            })
        })
    }

    /// Ignore upstream values and emit a clone of `replacement` each time.
    ///
    /// With a signal as the replacement, follow with
    /// [`switch_to_latest`](Signal::switch_to_latest) to re-read that
    /// signal's current value whenever upstream fires.
    pub fn map_replace<U: Clone + 'static>(&self, replacement: U) -> Signal<U> {
        self.map(move |_| replacement.clone())
    }

    /// Forward the first `count` values, then complete.
    pub fn take(&self, count: usize) -> Signal<T> {
        let upstream = self.clone();
        Signal::create(move |observer: Observer<T>| {
            if count == 0 {
                observer.send_completed();
                return Disposable::empty();
            }
            let seen = Cell::new(0usize);
            upstream.observe_with(move |event| {
                if let Some(value) = event.relay_terminal(&observer) {
                    seen.set(seen.get() + 1);
                    observer.send_next(value);
                    if seen.get() >= count {
                        observer.send_completed();
                    }
                }
            })
        })
    }

    /// Forward values until `trigger` emits or completes, then complete.
    /// A failure of `trigger` fails the result.
    pub fn take_until<U: Clone + 'static>(&self, trigger: &Signal<U>) -> Signal<T> {
        let upstream = self.clone();
        let trigger = trigger.clone();
        Signal::create(move |observer: Observer<T>| {
            let group = Disposable::composite();
            let stop = observer.clone();
            group.add(trigger.observe_with(move |event| match event {
                Event::Failed(err) => stop.send_failed(err),
                Event::Next(_) | Event::Completed => stop.send_completed(),
            }));
            if !observer.is_closed() {
                group.add(upstream.forward_to(observer));
            }
            group
        })
    }

    /// Subscribe now and share the results: every subscriber, early or late,
    /// receives all events received so far followed by live ones.
    ///
    /// The upstream subscription ends when upstream terminates, or when the
    /// last subscriber leaves. Subscribers arriving after that receive the
    /// history only.
    pub fn replay(&self) -> Signal<T> {
        let subject = Subject::replaying();
        let sink = subject.clone();
        let upstream = Rc::new(RefCell::new(Some(
            self.observe_with(move |event| sink.send(event)),
        )));
        let subscribers = Rc::new(Cell::new(0usize));
        let shared = subject.signal();
        Signal::create(move |observer: Observer<T>| {
            subscribers.set(subscribers.get() + 1);
            let delivery = shared.forward_to(observer);
            let upstream = Rc::clone(&upstream);
            let subscribers = Rc::clone(&subscribers);
            Disposable::new(move || {
                delivery.dispose();
                subscribers.set(subscribers.get() - 1);
                if subscribers.get() == 0 {
                    let released = upstream.borrow_mut().take();
                    if let Some(handle) = released {
                        handle.dispose();
                    }
                }
            })
        })
    }
}

impl<T: Clone + 'static> FromIterator<T> for Signal<T> {
    /// Emits every item in order, then completes.
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let items: Rc<[T]> = iter.into_iter().collect();
        Signal::create(move |observer| {
            for item in items.iter() {
                if observer.is_closed() {
                    break;
                }
                observer.send_next(item.clone());
            }
            observer.send_completed();
            Disposable::empty()
        })
    }
}

// ---------------------------------------------------------------------------
// Boolean helpers
// ---------------------------------------------------------------------------

impl Signal<bool> {
    pub fn negate(&self) -> Signal<bool> {
        self.map(|truth| !truth)
    }

    /// Map `true` to `if_true` and `false` to `if_false`.
    pub fn flip_flop<U: Clone + 'static>(&self, if_true: U, if_false: U) -> Signal<U> {
        self.map(move |truth| {
            if truth {
                if_true.clone()
            } else {
                if_false.clone()
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Collects every event a signal delivers.
    pub(crate) fn record<T: Clone + 'static>(
        signal: &Signal<T>,
    ) -> (Rc<RefCell<Vec<Event<T>>>>, Subscription) {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        let sub = signal.subscribe(move |event| sink.borrow_mut().push(event));
        (events, sub)
    }

    pub(crate) fn values<T: Clone>(events: &[Event<T>]) -> Vec<T> {
        events
            .iter()
            .filter_map(|e| match e {
                Event::Next(v) => Some(v.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn just_emits_then_completes() {
        let (events, _sub) = record(&Signal::just(7));
        assert_eq!(*events.borrow(), vec![Event::Next(7), Event::Completed]);
    }

    #[test]
    fn map_and_filter_compose() {
        let source: Signal<i32> = (1..=6).collect();
        let evens_doubled = source.filter(|n| n % 2 == 0).map(|n| n * 10);
        let (events, _sub) = record(&evens_doubled);
        assert_eq!(values(&events.borrow()), vec![20, 40, 60]);
        assert_eq!(events.borrow().last(), Some(&Event::Completed));
    }

    #[test]
    fn try_map_failure_is_terminal() {
        let source: Signal<i32> = vec![1, 2, 3].into_iter().collect();
        let mapped = source.try_map(|n| {
            if n == 2 {
                Err(SignalError::upstream("two"))
            } else {
                Ok(n)
            }
        });
        let (events, _sub) = record(&mapped);
        assert_eq!(
            *events.borrow(),
            vec![
                Event::Next(1),
                Event::Failed(SignalError::Upstream("two".into()))
            ]
        );
    }

    #[test]
    fn try_map_failure_unsubscribes_upstream() {
        let subject = Subject::new();
        let mapped = subject
            .signal()
            .try_map(|n: i32| Err::<i32, _>(SignalError::upstream(n.to_string())));
        let (events, _sub) = record(&mapped);
        assert_eq!(subject.observer_count(), 1);
        subject.send_next(1);
        assert_eq!(subject.observer_count(), 0);
        assert_eq!(events.borrow().len(), 1);
    }

    #[test]
    fn start_with_is_first_for_every_subscriber() {
        let subject = Subject::new();
        let signal = subject.signal().start_with(0);

        let (first, _a) = record(&signal);
        subject.send_next(1);
        let (second, _b) = record(&signal);
        subject.send_next(2);

        assert_eq!(values(&first.borrow()), vec![0, 1, 2]);
        assert_eq!(values(&second.borrow()), vec![0, 2]);
    }

    #[test]
    fn scan_emits_running_total() {
        let source: Signal<i32> = vec![1, 2, 3].into_iter().collect();
        let (events, _sub) = record(&source.scan_with_start(10, |acc, n| acc + n));
        assert_eq!(values(&events.borrow()), vec![11, 13, 16]);
    }

    #[test]
    fn scan_state_is_per_subscription() {
        let subject = Subject::new();
        let counts = subject.signal().scan_with_start(0, |acc, _: ()| acc + 1);
        let (a, _a) = record(&counts);
        subject.send_next(());
        let (b, _b) = record(&counts);
        subject.send_next(());
        assert_eq!(values(&a.borrow()), vec![1, 2]);
        assert_eq!(values(&b.borrow()), vec![1]);
    }

    #[test]
    fn take_completes_and_releases_upstream() {
        let subject = Subject::new();
        let (events, _sub) = record(&subject.signal().take(2));
        subject.send_next('a');
        subject.send_next('b');
        subject.send_next('c');
        assert_eq!(
            *events.borrow(),
            vec![Event::Next('a'), Event::Next('b'), Event::Completed]
        );
        assert_eq!(subject.observer_count(), 0);
    }

    #[test]
    fn take_zero_completes_without_subscribing() {
        let subject: Subject<i32> = Subject::new();
        let (events, _sub) = record(&subject.signal().take(0));
        assert_eq!(*events.borrow(), vec![Event::Completed]);
        assert_eq!(subject.observer_count(), 0);
    }

    #[test]
    fn take_until_stops_on_trigger() {
        let source = Subject::new();
        let trigger: Subject<()> = Subject::new();
        let (events, _sub) = record(&source.signal().take_until(&trigger.signal()));
        source.send_next(1);
        trigger.send_next(());
        source.send_next(2);
        assert_eq!(*events.borrow(), vec![Event::Next(1), Event::Completed]);
        assert_eq!(source.observer_count(), 0);
    }

    #[test]
    fn dispose_stops_delivery_only_for_that_subscriber() {
        let subject = Subject::new();
        let (a, sub_a) = record(&subject.signal());
        let (b, _sub_b) = record(&subject.signal());

        subject.send_next(1);
        sub_a.dispose();
        sub_a.dispose();
        subject.send_next(2);

        assert_eq!(values(&a.borrow()), vec![1]);
        assert_eq!(values(&b.borrow()), vec![1, 2]);
    }

    #[test]
    fn skip_repeats_drops_consecutive_duplicates() {
        let source: Signal<i32> = vec![1, 1, 2, 2, 1].into_iter().collect();
        let (events, _sub) = record(&source.skip_repeats());
        assert_eq!(values(&events.borrow()), vec![1, 2, 1]);
    }

    #[test]
    fn map_replace_ignores_content() {
        let source: Signal<i32> = vec![5, 6].into_iter().collect();
        let (events, _sub) = record(&source.map_replace("x"));
        assert_eq!(values(&events.borrow()), vec!["x", "x"]);
    }

    #[test]
    fn flip_flop_and_negate() {
        let source: Signal<bool> = vec![true, false].into_iter().collect();
        let (colors, _a) = record(&source.flip_flop("green", "red"));
        let (negated, _b) = record(&source.negate());
        assert_eq!(values(&colors.borrow()), vec!["green", "red"]);
        assert_eq!(values(&negated.borrow()), vec![false, true]);
    }

    #[test]
    fn replay_runs_producer_once() {
        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        let cold = Signal::create(move |observer| {
            counter.set(counter.get() + 1);
            observer.send_next("done");
            observer.send_completed();
            Disposable::empty()
        });

        let shared = cold.replay();
        let (a, _a) = record(&shared);
        let (b, _b) = record(&shared);

        assert_eq!(runs.get(), 1);
        assert_eq!(*a.borrow(), *b.borrow());
        assert_eq!(*a.borrow(), vec![Event::Next("done"), Event::Completed]);
    }

    #[test]
    fn replay_releases_upstream_after_last_subscriber_leaves() {
        let source: Subject<u8> = Subject::new();
        let shared = source.signal().replay();
        assert_eq!(source.observer_count(), 1);

        let (a, sub_a) = record(&shared);
        let (b, sub_b) = record(&shared);
        source.send_next(1);
        sub_a.dispose();
        assert_eq!(source.observer_count(), 1);
        sub_b.dispose();
        assert_eq!(source.observer_count(), 0);

        source.send_next(2);
        let (late, _late) = record(&shared);
        assert_eq!(values(&a.borrow()), vec![1]);
        assert_eq!(values(&b.borrow()), vec![1]);
        assert_eq!(*late.borrow(), vec![Event::Next(1)]);
    }

    #[test]
    fn concat_runs_in_order() {
        let joined = Signal::concat(vec![
            vec![1, 2].into_iter().collect(),
            Signal::just(3),
            Signal::empty(),
        ]);
        let (events, _sub) = record(&joined);
        assert_eq!(values(&events.borrow()), vec![1, 2, 3]);
        assert_eq!(events.borrow().last(), Some(&Event::Completed));
    }

    #[test]
    fn fail_is_distinct_from_completion() {
        let (events, _sub) = record(&Signal::<i32>::fail(SignalError::NotExecutable));
        assert_eq!(
            *events.borrow(),
            vec![Event::Failed(SignalError::NotExecutable)]
        );
    }
}
