#![forbid(unsafe_code)]

//! Key-path agent resolution against nested object graphs.

use std::cell::RefCell;
use std::rc::Rc;

use rfx_runtime::{
    ArgValue, Argument, BindingError, Event, KeyPath, KeyValueCoding, Lifetime, Object, ObjectRef,
    ResolutionMode, Signal, Subject, Value, bind, bind_path,
};

fn nested() -> (Rc<Object>, Rc<Object>, Rc<Object>) {
    let leaf = Object::builder("Leaf").property("c", 0).build();
    let middle = Object::builder("Middle")
        .property("b", Value::from(Rc::clone(&leaf)))
        .build();
    let root = Object::builder("Root")
        .property("a", Value::from(Rc::clone(&middle)))
        .build();
    (root, middle, leaf)
}

type Calls = Rc<RefCell<Vec<Vec<Value>>>>;

fn recording_method(class: &str, selector: &str, arity: usize) -> (Rc<Object>, Calls) {
    let calls: Calls = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&calls);
    let object = Object::builder(class)
        .method(selector, arity, move |_, args| {
            log.borrow_mut().push(args.to_vec());
            Ok(Value::Null)
        })
        .build();
    (object, calls)
}

// ---------------------------------------------------------------------------
// Property drive
// ---------------------------------------------------------------------------

#[test]
fn nested_assign_applies_current_value_then_updates() {
    let (root, _middle, leaf) = nested();
    let screen = Lifetime::new("screen");
    let source = Subject::new();

    let _binding = bind_path!(root.clone(), &screen; a.b)
        .assign("c", &source.signal().start_with(7))
        .expect("path resolves");
    assert_eq!(leaf.get("c"), Some(Value::Int(7)));

    source.send_next(8);
    assert_eq!(leaf.get("c"), Some(Value::Int(8)));
}

#[test]
fn nested_assign_follows_replaced_intermediate() {
    let (root, middle, old_leaf) = nested();
    let screen = Lifetime::new("screen");
    let source = Subject::new();
    let _binding = bind(root, &screen)
        .property("a")
        .property("b")
        .assign("c", &source.signal())
        .expect("path resolves");

    let new_leaf = Object::builder("Leaf").property("c", 0).build();
    middle
        .set("b", Value::from(Rc::clone(&new_leaf)))
        .expect("b exists");
    source.send_next(3);

    assert_eq!(old_leaf.get("c"), Some(Value::Int(0)));
    assert_eq!(new_leaf.get("c"), Some(Value::Int(3)));
}

#[test]
fn nested_assign_rejects_non_object_intermediate() {
    let (root, middle, _leaf) = nested();
    middle.set("b", 5).expect("b exists");
    let screen = Lifetime::new("screen");
    let err = bind_path!(root, &screen; a.b)
        .assign("c", &Signal::just(1))
        .expect_err("b is not an object");
    assert_eq!(
        err,
        BindingError::NotAnObject {
            key_path: "a.b".into()
        }
    );
}

// ---------------------------------------------------------------------------
// Lifted calls
// ---------------------------------------------------------------------------

#[test]
fn capability_error_names_target_path_and_selector() {
    let (target, _calls) = recording_method("Widget", "other:", 1);
    let holder = Object::builder("Holder")
        .property("x", Value::from(Rc::clone(&target)))
        .build();
    let screen = Lifetime::new("screen");
    let source: Subject<i64> = Subject::new();

    let err = bind(holder, &screen)
        .property("x")
        .lift_call(
            "foo",
            vec![
                Argument::positional(ArgValue::signal(&source.signal())),
                Argument::keyword("bar", Value::Int(1)),
            ],
        )
        .expect_err("foo:bar: is missing");

    assert_eq!(
        err,
        BindingError::Capability {
            target: target.describe(),
            key_path: "x".into(),
            selector: "foo:bar:".into(),
        }
    );
    let message = err.to_string();
    assert!(message.contains("x"));
    assert!(message.contains("foo:bar:"));
    assert_eq!(source.observer_count(), 0);
}

#[test]
fn lifted_call_supports_six_arguments() {
    let (target, calls) = recording_method("Canvas", "paint:a:b:c:d:e:", 6);
    let holder = Object::builder("Holder")
        .property("canvas", Value::from(target))
        .build();
    let screen = Lifetime::new("screen");
    let first = Subject::new();
    let third = Subject::new();

    let _lifted = bind(holder, &screen)
        .property("canvas")
        .lift_call(
            "paint",
            vec![
                Argument::positional(ArgValue::signal(&first.signal())),
                Argument::keyword("a", Value::Int(1)),
                Argument::keyword("b", ArgValue::signal(&third.signal())),
                Argument::keyword("c", Value::Int(3)),
                Argument::keyword("d", Value::Int(4)),
                Argument::keyword("e", Value::from("end")),
            ],
        )
        .expect("canvas responds to paint:a:b:c:d:e:");

    first.send_next(10);
    assert!(calls.borrow().is_empty(), "waits for every signal argument");
    third.send_next(30);
    first.send_next(11);

    let row = |head: i64| {
        vec![
            Value::Int(head),
            Value::Int(1),
            Value::Int(30),
            Value::Int(3),
            Value::Int(4),
            Value::from("end"),
        ]
    };
    assert_eq!(*calls.borrow(), vec![row(10), row(11)]);
}

#[test]
fn lifted_call_puts_positional_arguments_first() {
    let (target, calls) = recording_method("Button", "set_title:for_state:", 2);
    let holder = Object::builder("Holder")
        .property("button", Value::from(target))
        .build();
    let screen = Lifetime::new("screen");
    let titles = Subject::new();

    let _lifted = bind(holder, &screen)
        .property("button")
        .lift_call(
            "set_title",
            vec![
                Argument::keyword("for_state", Value::from("normal")),
                Argument::positional(ArgValue::signal(&titles.signal())),
            ],
        )
        .expect("resolves");
    titles.send_next("Go".to_owned());

    assert_eq!(
        *calls.borrow(),
        vec![vec![Value::from("Go"), Value::from("normal")]]
    );
}

#[test]
fn lifted_call_stops_with_observer() {
    let (target, calls) = recording_method("Sink", "accept:", 1);
    let holder = Object::builder("Holder")
        .property("sink", Value::from(target))
        .build();
    let screen = Lifetime::new("screen");
    let values = Subject::new();
    let _lifted = bind_path!(holder, &screen; sink)
        .lift_call("accept", vec![Argument::positional(ArgValue::signal(&values.signal()))])
        .expect("resolves");

    values.send_next(true);
    drop(screen);
    values.send_next(false);
    assert_eq!(*calls.borrow(), vec![vec![Value::Bool(true)]]);
}

// ---------------------------------------------------------------------------
// Dynamic dispatch
// ---------------------------------------------------------------------------

fn form() -> Rc<Object> {
    let (field, _calls) = recording_method("Field", "set_text:", 1);
    Object::builder("Form")
        .property("field", Value::from(field))
        .property("title", "")
        .build()
}

#[test]
fn send_checks_signal_operations_first() {
    let screen = Lifetime::new("screen");
    let source: Subject<Value> = Subject::new();
    // `start_with` is a signal operation even when handed a signal, so the
    // argument is rejected instead of becoming a lifted call.
    let err = bind(form(), &screen)
        .property("title")
        .send(
            "start_with",
            vec![Argument::positional(ArgValue::Signal(source.signal()))],
        )
        .expect_err("start_with needs a constant");
    assert!(matches!(err, BindingError::InvalidArgument { .. }));
}

#[test]
fn send_resolves_each_mode_in_order() {
    let screen = Lifetime::new("screen");
    let titles: Subject<Value> = Subject::new();

    let observed = bind(form(), &screen)
        .property("title")
        .send("take", vec![Argument::positional(Value::Int(1))])
        .expect("observation");
    assert_eq!(observed.mode(), ResolutionMode::Observation);

    let target = form();
    let bound = bind(target.clone(), &screen)
        .send(
            "title=",
            vec![Argument::positional(ArgValue::Signal(titles.signal()))],
        )
        .expect("property drive");
    assert_eq!(bound.mode(), ResolutionMode::PropertyDrive);
    titles.send_next(Value::from("Sign up"));
    assert_eq!(target.get("title"), Some(Value::from("Sign up")));

    let lifted = bind(form(), &screen)
        .property("field")
        .send(
            "set_text",
            vec![Argument::positional(ArgValue::Signal(titles.signal()))],
        )
        .expect("lifted call");
    assert_eq!(lifted.mode(), ResolutionMode::LiftedCall);

    let extended = bind(form(), &screen)
        .send("field", Vec::new())
        .expect("path extension");
    assert_eq!(extended.mode(), ResolutionMode::PathExtension);
}

#[test]
fn send_with_signal_and_empty_path_has_nothing_to_lift() {
    let screen = Lifetime::new("screen");
    let values: Subject<Value> = Subject::new();
    let root: ObjectRef = form();
    let err = bind(root, &screen)
        .send(
            "set_text",
            vec![Argument::positional(ArgValue::Signal(values.signal()))],
        )
        .expect_err("empty path");
    assert_eq!(err, BindingError::EmptyKeyPath);
}

#[test]
fn observation_resolution_emits_current_value() {
    let screen = Lifetime::new("screen");
    let target = form();
    target.set("title", "Hello").expect("title exists");
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);

    let _sub = bind(target, &screen)
        .property("title")
        .send("observe", Vec::new())
        .expect("observation")
        .into_signal()
        .expect("signal")
        .subscribe_next(move |value| sink.borrow_mut().push(value));

    assert_eq!(*seen.borrow(), vec![Value::from("Hello")]);
}

#[test]
fn send_never_extends_the_path_with_a_signal_operation_name() {
    let screen = Lifetime::new("screen");
    for name in [
        "map",
        "filter",
        "scan_with_start",
        "switch_to_latest",
        "sequence_many",
        "deliver_on",
        "take_until",
        "subscribe_next",
    ] {
        let result = bind(form(), &screen)
            .property("title")
            .send(name, Vec::new())
            .map(|resolution| resolution.mode());
        assert!(
            matches!(result, Err(BindingError::InvalidArgument { .. })),
            "{name} resolved as {result:?}"
        );
    }
}

#[test]
fn send_take_until_ends_the_observation() {
    let screen = Lifetime::new("screen");
    let target = form();
    let stop: Subject<Value> = Subject::new();
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);

    let _sub = bind(target.clone(), &screen)
        .property("title")
        .send(
            "take_until",
            vec![Argument::positional(ArgValue::Signal(stop.signal()))],
        )
        .expect("observation")
        .into_signal()
        .expect("signal")
        .subscribe(move |event| sink.borrow_mut().push(event));

    target.set("title", "a").expect("title exists");
    stop.send_next(Value::Null);
    target.set("title", "b").expect("title exists");

    assert_eq!(
        *events.borrow(),
        vec![
            Event::Next(Value::from("")),
            Event::Next(Value::from("a")),
            Event::Completed,
        ]
    );
}

// ---------------------------------------------------------------------------
// Path extension
// ---------------------------------------------------------------------------

#[test]
fn dotted_property_name_extends_by_each_segment() {
    let (root, _middle, leaf) = nested();
    let screen = Lifetime::new("screen");

    let agent = bind(root, &screen).property("a.b");
    assert_eq!(agent.key_path(), &KeyPath::parse("a.b"));
    assert_eq!(agent.key_path().len(), 2);

    let _binding = agent
        .assign("c", &Signal::just(Value::Int(5)))
        .expect("path resolves");
    assert_eq!(leaf.get("c"), Some(Value::Int(5)));
}
