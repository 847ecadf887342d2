#![forbid(unsafe_code)]

//! Flattening of signals of signals.
//!
//! - `switch_to_latest`: follow only the newest inner signal. The previous
//!   inner subscription is disposed the moment a new one arrives; nothing is
//!   buffered.
//! - `sequence_many`: concat-map. Inner signals run one at a time in the
//!   order their upstream values arrived.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use super::{Event, Observer, Signal};
use crate::disposable::Disposable;

struct SwitchState {
    current: RefCell<Option<Disposable>>,
    generation: Cell<u64>,
    inner_active: Cell<bool>,
    outer_done: Cell<bool>,
}

impl<T: Clone + 'static> Signal<Signal<T>> {
    /// Forward values from the most recently emitted inner signal only.
    ///
    /// Completes once the outer signal and the current inner signal have both
    /// completed. A failure of either fails the result.
    pub fn switch_to_latest(&self) -> Signal<T> {
        let outer = self.clone();
        Signal::create(move |observer: Observer<T>| {
            let state = Rc::new(SwitchState {
                current: RefCell::new(None),
                generation: Cell::new(0),
                inner_active: Cell::new(false),
                outer_done: Cell::new(false),
            });

            let switch_state = Rc::clone(&state);
            let downstream = observer.clone();
            let outer_sub = outer.observe_with(move |event| {
                let state = &switch_state;
                let Some(inner) = event.relay_terminal_when(&downstream, || {
                    state.outer_done.set(true);
                    !state.inner_active.get()
                }) else {
                    return;
                };

                let generation = state.generation.get() + 1;
                state.generation.set(generation);
                let previous = state.current.borrow_mut().take();
                if let Some(previous) = previous {
                    previous.dispose();
                }
                state.inner_active.set(true);

                let inner_state = Rc::clone(state);
                let observer = downstream.clone();
                let handle = inner.observe_with(move |event| {
                    if inner_state.generation.get() != generation {
                        return;
                    }
                    match event {
                        Event::Next(value) => observer.send_next(value),
                        Event::Failed(err) => observer.send_failed(err),
                        Event::Completed => {
                            inner_state.inner_active.set(false);
                            if inner_state.outer_done.get() {
                                observer.send_completed();
                            }
                        }
                    }
                });
                if state.generation.get() == generation {
                    *state.current.borrow_mut() = Some(handle);
                } else {
                    handle.dispose();
                }
            });

            Disposable::new(move || {
                outer_sub.dispose();
                let current = state.current.borrow_mut().take();
                if let Some(current) = current {
                    current.dispose();
                }
            })
        })
    }
}

impl<T> Event<T> {
    /// Like `relay_terminal`, but completion is only relayed when
    /// `should_complete` agrees.
    fn relay_terminal_when<U>(
        self,
        observer: &Observer<U>,
        should_complete: impl FnOnce() -> bool,
    ) -> Option<T> {
        match self {
            Self::Next(value) => Some(value),
            Self::Failed(err) => {
                observer.send_failed(err);
                None
            }
            Self::Completed => {
                if should_complete() {
                    observer.send_completed();
                }
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// sequence_many
// ---------------------------------------------------------------------------

struct ConcatState<T> {
    queue: RefCell<VecDeque<T>>,
    generation: Cell<u64>,
    active: Cell<bool>,
    outer_done: Cell<bool>,
    current: RefCell<Option<Disposable>>,
}

impl<T: Clone + 'static> Signal<T> {
    /// For each value, subscribe to `project(value)` and forward its values.
    /// Inner signals run one after another; values that arrive while one is
    /// running wait their turn.
    pub fn sequence_many<U: Clone + 'static>(
        &self,
        project: impl Fn(T) -> Signal<U> + 'static,
    ) -> Signal<U> {
        let upstream = self.clone();
        let project: Rc<dyn Fn(T) -> Signal<U>> = Rc::new(project);
        Signal::create(move |observer: Observer<U>| {
            let state = Rc::new(ConcatState {
                queue: RefCell::new(VecDeque::new()),
                generation: Cell::new(0),
                active: Cell::new(false),
                outer_done: Cell::new(false),
                current: RefCell::new(None),
            });

            let outer_state = Rc::clone(&state);
            let outer_project = Rc::clone(&project);
            let downstream = observer.clone();
            let outer_sub = upstream.observe_with(move |event| {
                let state = &outer_state;
                let Some(value) = event.relay_terminal_when(&downstream, || {
                    state.outer_done.set(true);
                    !state.active.get() && state.queue.borrow().is_empty()
                }) else {
                    return;
                };
                if state.active.get() {
                    state.queue.borrow_mut().push_back(value);
                } else {
                    run_inner(state, &outer_project, &downstream, value);
                }
            });

            Disposable::new(move || {
                outer_sub.dispose();
                state.queue.borrow_mut().clear();
                let current = state.current.borrow_mut().take();
                if let Some(current) = current {
                    current.dispose();
                }
            })
        })
    }
}

fn run_inner<T: Clone + 'static, U: Clone + 'static>(
    state: &Rc<ConcatState<T>>,
    project: &Rc<dyn Fn(T) -> Signal<U>>,
    observer: &Observer<U>,
    value: T,
) {
    if observer.is_closed() {
        return;
    }
    let generation = state.generation.get() + 1;
    state.generation.set(generation);
    state.active.set(true);
    let inner = project(value);

    let inner_state = Rc::clone(state);
    let inner_project = Rc::clone(project);
    let downstream = observer.clone();
    let handle = inner.observe_with(move |event| match event {
        Event::Next(value) => downstream.send_next(value),
        Event::Failed(err) => downstream.send_failed(err),
        Event::Completed => {
            inner_state.active.set(false);
            let next = inner_state.queue.borrow_mut().pop_front();
            match next {
                Some(next) => run_inner(&inner_state, &inner_project, &downstream, next),
                None => {
                    if inner_state.outer_done.get() {
                        downstream.send_completed();
                    }
                }
            }
        }
    });
    // A synchronous inner may already have completed and started the next one.
    if state.active.get() && state.generation.get() == generation {
        *state.current.borrow_mut() = Some(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Subject;
    use crate::signal::tests::{record, values};

    #[test]
    fn switch_drops_previous_inner() {
        let outer = Subject::new();
        let s1 = Subject::new();
        let s2 = Subject::new();
        let (events, _sub) = record(&outer.signal().switch_to_latest());

        outer.send_next(s1.signal());
        s1.send_next(1);
        outer.send_next(s2.signal());
        s1.send_next(99);
        s2.send_next(2);

        assert_eq!(values(&events.borrow()), vec![1, 2]);
        assert_eq!(s1.observer_count(), 0);
    }

    #[test]
    fn switch_completes_after_outer_and_current_inner() {
        let outer = Subject::new();
        let inner = Subject::new();
        let (events, _sub) = record(&outer.signal().switch_to_latest());

        outer.send_next(inner.signal());
        outer.send_completed();
        assert!(!events.borrow().contains(&Event::Completed));

        inner.send_next('z');
        inner.send_completed();
        assert_eq!(*events.borrow(), vec![Event::Next('z'), Event::Completed]);
    }

    #[test]
    fn switch_with_synchronous_inners() {
        let outer: Signal<Signal<i32>> = vec![Signal::just(1), Signal::just(2)]
            .into_iter()
            .collect();
        let (events, _sub) = record(&outer.switch_to_latest());
        assert_eq!(
            *events.borrow(),
            vec![Event::Next(1), Event::Next(2), Event::Completed]
        );
    }

    #[test]
    fn disposing_switch_releases_inner() {
        let outer = Subject::new();
        let inner: Subject<i32> = Subject::new();
        let (_events, sub) = record(&outer.signal().switch_to_latest());
        outer.send_next(inner.signal());
        assert_eq!(inner.observer_count(), 1);
        sub.dispose();
        assert_eq!(inner.observer_count(), 0);
        assert_eq!(outer.observer_count(), 0);
    }

    #[test]
    fn sequence_many_queues_while_inner_runs() {
        let upstream = Subject::new();
        let inners: Rc<RefCell<Vec<Subject<String>>>> = Rc::new(RefCell::new(Vec::new()));
        let created = Rc::clone(&inners);
        let flattened = upstream.signal().sequence_many(move |tag: &'static str| {
            let subject = Subject::new();
            created.borrow_mut().push(subject.clone());
            subject.signal().map(move |v: String| format!("{tag}:{v}"))
        });
        let (events, _sub) = record(&flattened);

        upstream.send_next("a");
        upstream.send_next("b");
        assert_eq!(inners.borrow().len(), 1);

        let first = inners.borrow()[0].clone();
        first.send_next("1".into());
        first.send_completed();
        assert_eq!(inners.borrow().len(), 2);

        let second = inners.borrow()[1].clone();
        second.send_next("2".into());
        upstream.send_completed();
        second.send_completed();

        assert_eq!(values(&events.borrow()), vec!["a:1", "b:2"]);
        assert_eq!(events.borrow().last(), Some(&Event::Completed));
    }

    #[test]
    fn sequence_many_behaves_like_flat_map_for_single_values() {
        let upstream: Signal<i32> = vec![1, 2, 3].into_iter().collect();
        let (events, _sub) = record(&upstream.sequence_many(|n| Signal::just(n * n)));
        assert_eq!(values(&events.borrow()), vec![1, 4, 9]);
        assert_eq!(events.borrow().last(), Some(&Event::Completed));
    }
}
