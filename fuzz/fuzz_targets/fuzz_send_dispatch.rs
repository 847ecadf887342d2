#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rfx_runtime::{ArgValue, Argument, Lifetime, Object, Resolution, Subject, Value, bind};

#[derive(Arbitrary, Debug)]
enum FuzzArg {
    Int(i64),
    Text(String),
    Signal,
    Keyword(String, bool),
}

#[derive(Arbitrary, Debug)]
struct FuzzCall {
    path: Vec<u8>,
    name: String,
    args: Vec<FuzzArg>,
    emits: Vec<i64>,
}

const KEYS: [&str; 4] = ["child", "count", "title", "missing"];

fuzz_target!(|call: FuzzCall| {
    let child = Object::builder("Child")
        .property("count", 0)
        .property("title", "")
        .method("accept:", 1, |_, _| Ok(Value::Null))
        .build();
    let root = Object::builder("Root")
        .property("child", Value::from(child))
        .property("count", 0)
        .build();
    let lifetime = Lifetime::new("fuzz");
    let source: Subject<Value> = Subject::new();

    let mut agent = bind(root, &lifetime);
    for index in call.path.iter().take(4) {
        agent = agent.property(KEYS[usize::from(*index) % KEYS.len()]);
    }
    let args: Vec<Argument> = call
        .args
        .into_iter()
        .take(6)
        .map(|arg| match arg {
            FuzzArg::Int(n) => Argument::positional(Value::Int(n)),
            FuzzArg::Text(text) => Argument::positional(Value::from(text)),
            FuzzArg::Signal => Argument::positional(ArgValue::Signal(source.signal())),
            FuzzArg::Keyword(keyword, signal) => {
                let value = if signal {
                    ArgValue::Signal(source.signal())
                } else {
                    ArgValue::Constant(Value::Null)
                };
                Argument::keyword(keyword, value)
            }
        })
        .collect();

    let Ok(resolution) = agent.send(&call.name, args) else {
        return;
    };
    let _held = match resolution {
        Resolution::Observed(signal) => Some(signal.subscribe(|_| {})),
        other => other.into_subscription(),
    };
    for value in call.emits.into_iter().take(16) {
        source.send_next(Value::Int(value));
    }
});
