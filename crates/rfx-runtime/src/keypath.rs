#![forbid(unsafe_code)]

//! Key-path binding agent.
//!
//! [`bind`] starts a [`KeyPathAgent`] at a root object on behalf of an
//! observer [`Lifetime`]. The agent accumulates property names and is then
//! consumed by exactly one terminal operation:
//!
//! | Mode | Typed entry point | Result |
//! |------|-------------------|--------|
//! | Observation | [`observe`](KeyPathAgent::observe) | `Signal<Value>` of the value at the path |
//! | Property drive | [`bind_from`](KeyPathAgent::bind_from) / [`assign`](KeyPathAgent::assign) | writes every emission into the path |
//! | Lifted call | [`lift_call`](KeyPathAgent::lift_call) | re-invokes an operation on the target whenever a signal argument emits |
//! | Path extension | [`property`](KeyPathAgent::property) | the same agent, one segment longer |
//!
//! [`send`](KeyPathAgent::send) is the dynamic front end for scripted
//! callers: given an operation name and arguments it picks the mode, checking
//! observation first, then property drive, then lifted call, then path
//! extension.
//!
//! # Invariants
//!
//! 1. Terminal operations consume the agent; a spent agent cannot be reused.
//! 2. Construction-time failures (empty path, unknown key, missing capability)
//!    are returned before anything is subscribed or invoked.
//! 3. A property-drive binding applies a value the source signal already
//!    holds at bind time immediately.
//! 4. Observations and bindings end when the observer lifetime ends.
//!
//! # Failure Modes
//!
//! - **Write or invocation fails while bound**: logged at `WARN` and the
//!   binding stops. Other bindings are unaffected.

use std::fmt;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::disposable::Subscription;
use crate::error::{BindingError, Result, SignalError};
use crate::kvc::{
    KeyPath, Lifetime, ObjectRef, Selector, Value, object_for_key_path, observe_key_path_until,
    set_value_for_key_path, unknown_key,
};
use crate::signal::Signal;

/// Operation names that [`KeyPathAgent::send`] resolves as signal
/// operations on the observation of the accumulated path. Every `Signal`
/// operation is listed, so none of them can become a property segment.
pub const SIGNAL_OPERATIONS: &[&str] = &[
    "observe",
    "start_with",
    "take",
    "take_until",
    "boolean",
    "negate",
    "flip_flop",
    "map_replace",
    "skip_repeats",
    "replay",
    "map",
    "try_map",
    "filter",
    "scan_with_start",
    "switch_to_latest",
    "sequence_many",
    "deliver_on",
    "concat",
    "combine_latest",
    "combine_latest_with",
    "combine_latest_all",
    "reduce_latest",
    "subscribe",
    "subscribe_next",
    "subscribe_with",
];

/// Signal operations that need closures, schedulers, or nested signals.
/// [`KeyPathAgent::send`] recognizes them but can only report them.
const TYPED_ONLY_OPERATIONS: &[&str] = &[
    "map",
    "try_map",
    "filter",
    "scan_with_start",
    "switch_to_latest",
    "sequence_many",
    "deliver_on",
    "concat",
    "combine_latest",
    "combine_latest_with",
    "combine_latest_all",
    "reduce_latest",
    "subscribe",
    "subscribe_next",
    "subscribe_with",
];

/// Start a key-path agent at `object` for `observer`.
#[must_use]
pub fn bind(object: ObjectRef, observer: &Lifetime) -> KeyPathAgent {
    KeyPathAgent {
        root: object,
        observer: observer.name().to_owned(),
        ended: observer.ended(),
        path: KeyPath::new(),
    }
}

/// `bind_path!(object, observer; a.b.c)` is
/// `bind(object, observer).property("a").property("b").property("c")`.
#[macro_export]
macro_rules! bind_path {
    ($object:expr, $observer:expr) => {
        $crate::keypath::bind($object, $observer)
    };
    ($object:expr, $observer:expr; $($key:ident).+) => {
        $crate::keypath::bind($object, $observer)$(.property(stringify!($key)))+
    };
}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// A lifted-call or dynamic-dispatch argument value.
#[derive(Clone)]
pub enum ArgValue {
    Constant(Value),
    Signal(Signal<Value>),
}

impl ArgValue {
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Constant(value.into())
    }

    pub fn signal<T: Into<Value> + Clone + 'static>(signal: &Signal<T>) -> Self {
        Self::Signal(signal.map(Into::into))
    }
}

impl From<Value> for ArgValue {
    fn from(value: Value) -> Self {
        Self::Constant(value)
    }
}

impl From<Signal<Value>> for ArgValue {
    fn from(signal: Signal<Value>) -> Self {
        Self::Signal(signal)
    }
}

impl fmt::Debug for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Self::Signal(_) => f.write_str("Signal(..)"),
        }
    }
}

/// An argument, positional or labelled with a keyword.
///
/// Keywords become parts of the selector: `set_title_color` called with a
/// positional argument and a `for_state` keyword argument resolves to
/// `set_title_color:for_state:`.
#[derive(Debug, Clone)]
pub struct Argument {
    keyword: Option<String>,
    value: ArgValue,
}

impl Argument {
    pub fn positional(value: impl Into<ArgValue>) -> Self {
        Self {
            keyword: None,
            value: value.into(),
        }
    }

    pub fn keyword(keyword: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        Self {
            keyword: Some(keyword.into()),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn is_signal(&self) -> bool {
        matches!(self.value, ArgValue::Signal(_))
    }

    #[must_use]
    pub fn keyword_name(&self) -> Option<&str> {
        self.keyword.as_deref()
    }

    #[must_use]
    pub fn value(&self) -> &ArgValue {
        &self.value
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Which of the four modes a dynamic call resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMode {
    Observation,
    PropertyDrive,
    LiftedCall,
    PathExtension,
}

impl fmt::Display for ResolutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Observation => "observation",
            Self::PropertyDrive => "property-drive",
            Self::LiftedCall => "lifted-call",
            Self::PathExtension => "path-extension",
        })
    }
}

/// Outcome of [`KeyPathAgent::send`].
#[derive(Debug)]
pub enum Resolution {
    Observed(Signal<Value>),
    Bound(Subscription),
    Lifted(Subscription),
    Extended(KeyPathAgent),
}

impl Resolution {
    #[must_use]
    pub fn mode(&self) -> ResolutionMode {
        match self {
            Self::Observed(_) => ResolutionMode::Observation,
            Self::Bound(_) => ResolutionMode::PropertyDrive,
            Self::Lifted(_) => ResolutionMode::LiftedCall,
            Self::Extended(_) => ResolutionMode::PathExtension,
        }
    }

    #[must_use]
    pub fn into_signal(self) -> Option<Signal<Value>> {
        match self {
            Self::Observed(signal) => Some(signal),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_subscription(self) -> Option<Subscription> {
        match self {
            Self::Bound(sub) | Self::Lifted(sub) => Some(sub),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_agent(self) -> Option<KeyPathAgent> {
        match self {
            Self::Extended(agent) => Some(agent),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// KeyPathAgent
// ---------------------------------------------------------------------------

/// Accumulates a key path and resolves it into a binding.
#[must_use = "a key-path agent does nothing until a terminal operation consumes it"]
pub struct KeyPathAgent {
    root: ObjectRef,
    observer: String,
    ended: Signal<()>,
    path: KeyPath,
}

impl KeyPathAgent {
    /// Append `name` to the path.
    pub fn property(mut self, name: impl Into<String>) -> Self {
        self.path.push(name);
        self
    }

    #[must_use]
    pub fn key_path(&self) -> &KeyPath {
        &self.path
    }

    /// The value at the path: current value on subscribe, then changes,
    /// until the observer lifetime ends.
    #[must_use]
    pub fn observe(self) -> Signal<Value> {
        debug!(
            key_path = %self.path,
            observer = %self.observer,
            mode = %ResolutionMode::Observation,
            "key path resolved"
        );
        observe_key_path_until(&self.root, &self.path, &self.ended)
    }

    /// `property(name).bind_from(signal)`.
    ///
    /// # Errors
    ///
    /// See [`bind_from`](Self::bind_from).
    pub fn assign<T>(self, name: impl Into<String>, signal: &Signal<T>) -> Result<Subscription>
    where
        T: Into<Value> + Clone + 'static,
    {
        self.property(name).bind_from(signal)
    }

    /// Drive the property at the path from `signal`.
    ///
    /// The last path segment is the assigned key. Every emission is written
    /// through the full path from the root, so replacing an intermediate
    /// object re-targets later writes.
    ///
    /// # Errors
    ///
    /// [`BindingError::EmptyKeyPath`]; [`BindingError::UnknownKey`] or
    /// [`BindingError::NotAnObject`] when the path does not resolve now.
    pub fn bind_from<T>(self, signal: &Signal<T>) -> Result<Subscription>
    where
        T: Into<Value> + Clone + 'static,
    {
        let (parent, key) = self.path.split_last().ok_or(BindingError::EmptyKeyPath)?;
        let parent: KeyPath = parent.iter().cloned().collect();
        let owner = object_for_key_path(&self.root, &parent)?;
        if owner.value_for_key(key).is_none() {
            return Err(unknown_key(&*owner, key));
        }
        debug!(
            key_path = %self.path,
            observer = %self.observer,
            mode = %ResolutionMode::PropertyDrive,
            "key path resolved"
        );

        let root = Rc::clone(&self.root);
        let path = self.path.clone();
        let writes = signal
            .take_until(&self.ended)
            .try_map(move |value| {
                set_value_for_key_path(&root, &path, value.into()).map_err(SignalError::from)
            });
        let key_path = self.path.to_string();
        Ok(writes.subscribe_with(
            |()| {},
            move |err| warn!(key_path = %key_path, error = %err, "property binding stopped"),
            || {},
        ))
    }

    /// Invoke `name` (plus keyword parts) on the object at the path every
    /// time a signal argument emits, with the latest value of every signal
    /// argument substituted in place.
    ///
    /// Positional arguments come first, then keyword arguments, each group in
    /// the order given. Any number of arguments is supported.
    ///
    /// # Errors
    ///
    /// [`BindingError::EmptyKeyPath`], [`BindingError::NoSignalArgument`],
    /// [`BindingError::UnknownKey`] / [`BindingError::NotAnObject`] when the
    /// target does not resolve, [`BindingError::Capability`] when the target
    /// does not respond to the selector.
    pub fn lift_call(self, name: &str, args: Vec<Argument>) -> Result<Subscription> {
        if self.path.is_empty() {
            return Err(BindingError::EmptyKeyPath);
        }
        let (positional, keyword): (Vec<Argument>, Vec<Argument>) =
            args.into_iter().partition(|arg| arg.keyword.is_none());
        let keywords: Vec<&str> = keyword.iter().filter_map(Argument::keyword_name).collect();
        let selector = Selector::with_keywords(name, &keywords, positional.len() + keyword.len());
        let ordered: Vec<ArgValue> = positional
            .into_iter()
            .chain(keyword)
            .map(|arg| arg.value)
            .collect();

        let mut template = Vec::with_capacity(ordered.len());
        let mut slots = Vec::new();
        let mut sources = Vec::new();
        for (index, value) in ordered.into_iter().enumerate() {
            match value {
                ArgValue::Constant(value) => template.push(value),
                ArgValue::Signal(signal) => {
                    template.push(Value::Null);
                    slots.push(index);
                    sources.push(signal);
                }
            }
        }
        if sources.is_empty() {
            return Err(BindingError::NoSignalArgument {
                selector: selector.to_string(),
            });
        }

        let target = object_for_key_path(&self.root, &self.path)?;
        if !target.responds_to(&selector) {
            return Err(BindingError::Capability {
                target: target.describe(),
                key_path: self.path.to_string(),
                selector: selector.to_string(),
            });
        }
        debug!(
            key_path = %self.path,
            observer = %self.observer,
            selector = %selector,
            arity = selector.arity(),
            mode = %ResolutionMode::LiftedCall,
            "key path resolved"
        );

        let invocations = Signal::combine_latest_all(sources)
            .take_until(&self.ended)
            .try_map(move |latest| {
                let mut call_args = template.clone();
                for (&slot, value) in slots.iter().zip(latest) {
                    call_args[slot] = value;
                }
                target
                    .invoke(&selector, &call_args)
                    .map(drop)
                    .map_err(SignalError::from)
            });
        let key_path = self.path.to_string();
        Ok(invocations.subscribe_with(
            |()| {},
            move |err| warn!(key_path = %key_path, error = %err, "lifted call stopped"),
            || {},
        ))
    }

    /// Resolve a dynamic call.
    ///
    /// Checked in order:
    ///
    /// 1. `name` is in [`SIGNAL_OPERATIONS`]: apply it to the observation of
    ///    the path. Operations that need closures or schedulers are rejected
    ///    with [`BindingError::InvalidArgument`].
    /// 2. `name` ends with `=` and the only argument is a signal: drive the
    ///    property `name` (without `=`) from it.
    /// 3. The path is non-empty and some argument is a signal: lifted call.
    /// 4. No arguments: extend the path with `name`.
    ///
    /// # Errors
    ///
    /// Whatever the chosen mode reports; [`BindingError::InvalidArgument`]
    /// when arguments fit no mode; [`BindingError::EmptyKeyPath`] when signal
    /// arguments are given with nothing to lift onto.
    pub fn send(self, name: &str, args: Vec<Argument>) -> Result<Resolution> {
        if SIGNAL_OPERATIONS.contains(&name) {
            let observed = self.observe();
            return apply_signal_operation(name, observed, &args).map(Resolution::Observed);
        }

        if let Some(key) = name.strip_suffix('=') {
            if let [argument] = args.as_slice() {
                if let ArgValue::Signal(signal) = &argument.value {
                    if key.is_empty() {
                        return Err(BindingError::invalid_argument(name, "missing property name"));
                    }
                    let signal = signal.clone();
                    return self.property(key).bind_from(&signal).map(Resolution::Bound);
                }
            }
        }

        let any_signal = args.iter().any(Argument::is_signal);
        if any_signal {
            if self.path.is_empty() {
                return Err(BindingError::EmptyKeyPath);
            }
            return self.lift_call(name, args).map(Resolution::Lifted);
        }

        if !args.is_empty() {
            return Err(BindingError::invalid_argument(
                name,
                "arguments given but none is a signal",
            ));
        }
        if name.is_empty() || name.contains(['.', '=']) {
            return Err(BindingError::invalid_argument(name, "not a property name"));
        }
        Ok(Resolution::Extended(self.property(name)))
    }
}

impl fmt::Debug for KeyPathAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPathAgent")
            .field("root", &self.root.describe())
            .field("observer", &self.observer)
            .field("key_path", &self.path.to_string())
            .finish()
    }
}

fn constant<'a>(operation: &str, args: &'a [Argument], index: usize) -> Result<&'a Value> {
    match args.get(index).map(|arg| &arg.value) {
        Some(ArgValue::Constant(value)) => Ok(value),
        Some(ArgValue::Signal(_)) => Err(BindingError::invalid_argument(
            operation,
            format!("argument {index} must be a constant"),
        )),
        None => Err(BindingError::invalid_argument(
            operation,
            format!("missing argument {index}"),
        )),
    }
}

fn expect_arity(operation: &str, args: &[Argument], arity: usize) -> Result<()> {
    if args.len() == arity {
        return Ok(());
    }
    Err(BindingError::invalid_argument(
        operation,
        format!("takes {arity} argument(s), got {}", args.len()),
    ))
}

fn apply_signal_operation(
    operation: &str,
    observed: Signal<Value>,
    args: &[Argument],
) -> Result<Signal<Value>> {
    if TYPED_ONLY_OPERATIONS.contains(&operation) {
        return Err(BindingError::invalid_argument(
            operation,
            "needs the typed Signal API",
        ));
    }
    let arity = match operation {
        "start_with" | "take" | "take_until" | "map_replace" => 1,
        "flip_flop" => 2,
        _ => 0,
    };
    expect_arity(operation, args, arity)?;
    let signal = match operation {
        "observe" => observed,
        "skip_repeats" => observed.skip_repeats(),
        "replay" => observed.replay(),
        "take_until" => match args.first().map(|arg| &arg.value) {
            Some(ArgValue::Signal(trigger)) => observed.take_until(trigger),
            _ => {
                return Err(BindingError::invalid_argument(
                    operation,
                    "argument 0 must be a signal",
                ));
            }
        },
        "start_with" => observed.start_with(constant(operation, args, 0)?.clone()),
        "map_replace" => observed.map_replace(constant(operation, args, 0)?.clone()),
        "take" => {
            let count = constant(operation, args, 0)?
                .as_int()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| {
                    BindingError::invalid_argument(operation, "count must be a non-negative int")
                })?;
            observed.take(count)
        }
        "boolean" => observed.boolean().map(Value::Bool),
        "negate" => observed.boolean().negate().map(Value::Bool),
        "flip_flop" => {
            let if_true = constant(operation, args, 0)?.clone();
            let if_false = constant(operation, args, 1)?.clone();
            observed.boolean().flip_flop(if_true, if_false)
        }
        _ => {
            return Err(BindingError::invalid_argument(
                operation,
                "not a signal operation",
            ));
        }
    };
    Ok(signal)
}
