#![forbid(unsafe_code)]

//! Command serialization driven by a lab-clock run loop.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rfx_runtime::{Command, Event, RunLoop, Signal, SignalError, Subject, Subscription};
use web_time::{Duration, Instant};

fn recorded<T: Clone + 'static>(signal: &Signal<T>) -> (Rc<RefCell<Vec<T>>>, Subscription) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let sub = signal.subscribe_next(move |value| sink.borrow_mut().push(value));
    (seen, sub)
}

/// A command whose single action answers `true` one second after it starts.
fn delayed_command(
    run_loop: &RunLoop,
    enabled: &Signal<bool>,
) -> (Command<(), bool>, Rc<Cell<u32>>) {
    let command = Command::new(enabled);
    let starts = Rc::new(Cell::new(0));
    let counter = Rc::clone(&starts);
    let clock = run_loop.clone();
    let _results = command.add_action(move |()| {
        counter.set(counter.get() + 1);
        Signal::<Instant>::interval(Duration::from_secs(1), clock.clone())
            .take(1)
            .map_replace(true)
    });
    (command, starts)
}

#[test]
fn executing_goes_false_true_false_across_lab_time() {
    let run_loop = RunLoop::lab();
    let (command, starts) = delayed_command(&run_loop, &Signal::just(true));
    let (executing, _executing_sub) = recorded(&command.executing_signal());
    let (answers, _answer_sub) = recorded(&command.execute(()));

    assert_eq!(*executing.borrow(), vec![false, true]);
    assert_eq!(run_loop.pending_timers(), 1);

    let rejected = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&rejected);
    let _second = command
        .execute(())
        .subscribe(move |event| sink.borrow_mut().push(event));
    assert_eq!(
        *rejected.borrow(),
        vec![Event::Failed(SignalError::NotExecutable)]
    );

    run_loop.advance(Duration::from_millis(500));
    assert!(command.is_executing());
    assert!(answers.borrow().is_empty());

    run_loop.advance(Duration::from_millis(600));
    assert_eq!(*answers.borrow(), vec![true]);
    assert_eq!(*executing.borrow(), vec![false, true, false]);
    assert_eq!(starts.get(), 1);
    assert_eq!(run_loop.pending_timers(), 0);
}

#[test]
fn can_execute_follows_validity_and_execution() {
    let run_loop = RunLoop::lab();
    let validity = Subject::new();
    let (command, _starts) = delayed_command(&run_loop, &validity.signal());
    validity.send_next(false);
    let (allowed, _sub) = recorded(&command.can_execute_signal());
    assert_eq!(*allowed.borrow(), vec![false]);

    validity.send_next(true);
    let _run = command.execute(()).subscribe_next(|_| {});
    assert_eq!(*allowed.borrow(), vec![false, true, false]);

    run_loop.run_until_idle();
    assert_eq!(*allowed.borrow(), vec![false, true, false, true]);
    assert!(command.can_execute());
}

#[test]
fn disabled_command_arms_nothing() {
    let run_loop = RunLoop::lab();
    let (command, starts) = delayed_command(&run_loop, &Signal::just(false));
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    let _sub = command
        .execute(())
        .subscribe(move |event| sink.borrow_mut().push(event));

    assert_eq!(*events.borrow(), vec![Event::Failed(SignalError::NotExecutable)]);
    assert_eq!(starts.get(), 0);
    assert_eq!(run_loop.pending_timers(), 0);
    assert!(!command.is_executing());
}

#[test]
fn executions_run_back_to_back() {
    let run_loop = RunLoop::lab();
    let (command, starts) = delayed_command(&run_loop, &Signal::just(true));
    let (executing, _sub) = recorded(&command.executing_signal());

    for _ in 0..3 {
        let _answer = command.execute(());
        run_loop.advance(Duration::from_secs(1));
    }

    assert_eq!(starts.get(), 3);
    assert_eq!(
        *executing.borrow(),
        vec![false, true, false, true, false, true, false]
    );
}

#[test]
fn results_can_be_delivered_on_the_run_loop() {
    let run_loop = RunLoop::lab();
    let command: Command<i32, i32> = Command::enabled();
    let _results = command.add_action(|n| Signal::just(n + 1));
    let (delivered, _sub) = recorded(&command.execute(1).deliver_on(run_loop.clone()));

    assert!(delivered.borrow().is_empty());
    run_loop.drain();
    assert_eq!(*delivered.borrow(), vec![2]);
}
