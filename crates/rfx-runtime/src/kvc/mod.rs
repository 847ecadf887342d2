#![forbid(unsafe_code)]

//! Key-value coding: the object model bindings talk to.
//!
//! Anything a [`KeyPathAgent`](crate::keypath::KeyPathAgent) can traverse
//! implements [`KeyValueCoding`]: read a key, write a key, observe a key as a
//! [`Signal`], check whether an operation exists, and invoke it. The free
//! functions in this module lift those single-key operations to dotted
//! [`KeyPath`]s.
//!
//! # Invariants
//!
//! 1. `observe_key` emits the value current at subscription time before any
//!    change.
//! 2. Key-path observation re-resolves every segment after the one whose
//!    value changed, so replacing an intermediate object re-targets the
//!    observation.
//! 3. A key path whose intermediate value is not an object observes as
//!    [`Value::Null`] and reads or writes as [`BindingError::NotAnObject`].
//!
//! # Failure Modes
//!
//! - **Unknown key**: reads and writes return [`BindingError::UnknownKey`];
//!   observing fails the signal with the same error.

mod lifetime;
mod object;
mod value;

use std::rc::Rc;

use crate::error::{BindingError, Result, SignalError};
use crate::signal::Signal;

pub use lifetime::Lifetime;
pub use object::{Object, ObjectBuilder};
pub use value::{KeyPath, Selector, Value};

/// Shared handle to a key-value coding object.
pub type ObjectRef = Rc<dyn KeyValueCoding>;

/// Dynamic property access, observation and invocation.
pub trait KeyValueCoding {
    /// Short human-readable identity, used in error messages and logs.
    fn describe(&self) -> String;

    fn value_for_key(&self, key: &str) -> Option<Value>;

    /// # Errors
    ///
    /// [`BindingError::UnknownKey`] or [`BindingError::ReadOnlyKey`].
    fn set_value_for_key(&self, key: &str, value: Value) -> Result<()>;

    /// Current value on subscribe, then every change.
    fn observe_key(&self, key: &str) -> Signal<Value>;

    /// Whether `selector` can be invoked with `selector.arity()` arguments.
    fn responds_to(&self, _selector: &Selector) -> bool {
        false
    }

    /// # Errors
    ///
    /// [`BindingError::Invocation`] when the operation does not exist or fails.
    fn invoke(&self, selector: &Selector, _args: &[Value]) -> Result<Value> {
        Err(BindingError::Invocation {
            selector: selector.to_string(),
            message: format!("{} has no such operation", self.describe()),
        })
    }
}

/// Unknown-key error for `object`, shared by implementors.
pub fn unknown_key(object: &(impl KeyValueCoding + ?Sized), key: &str) -> BindingError {
    BindingError::UnknownKey {
        target: object.describe(),
        key: key.to_owned(),
    }
}

// ---------------------------------------------------------------------------
// Key paths
// ---------------------------------------------------------------------------

/// Walk `segments` from `root`, requiring an object at every step.
fn resolve_object(root: &ObjectRef, segments: &[String]) -> Result<ObjectRef> {
    let mut current = Rc::clone(root);
    for (depth, key) in segments.iter().enumerate() {
        let next = current
            .value_for_key(key)
            .ok_or_else(|| unknown_key(&*current, key))?;
        current = match next {
            Value::Object(object) => object,
            _ => {
                return Err(BindingError::NotAnObject {
                    key_path: segments[..=depth].join("."),
                });
            }
        };
    }
    Ok(current)
}

/// The object at `path`, which must resolve to an object.
///
/// # Errors
///
/// [`BindingError::UnknownKey`] or [`BindingError::NotAnObject`].
pub fn object_for_key_path(root: &ObjectRef, path: &KeyPath) -> Result<ObjectRef> {
    resolve_object(root, path.segments())
}

/// Read the value at `path`. The empty path reads `root` itself.
///
/// # Errors
///
/// [`BindingError::UnknownKey`] or [`BindingError::NotAnObject`].
pub fn value_for_key_path(root: &ObjectRef, path: &KeyPath) -> Result<Value> {
    let Some((parent, key)) = path.split_last() else {
        return Ok(Value::Object(Rc::clone(root)));
    };
    let owner = resolve_object(root, parent)?;
    owner
        .value_for_key(key)
        .ok_or_else(|| unknown_key(&*owner, key))
}

/// Write `value` at `path`.
///
/// # Errors
///
/// [`BindingError::EmptyKeyPath`], or whatever resolving the parent or the
/// final write reports.
pub fn set_value_for_key_path(root: &ObjectRef, path: &KeyPath, value: Value) -> Result<()> {
    let (parent, key) = path.split_last().ok_or(BindingError::EmptyKeyPath)?;
    resolve_object(root, parent)?.set_value_for_key(key, value)
}

/// Observe the value at `path` until `lifetime` ends.
///
/// Each intermediate object is observed too; when one is replaced, the rest
/// of the path is re-resolved against the new object.
pub fn observe_key_path(root: &ObjectRef, path: &KeyPath, lifetime: &Lifetime) -> Signal<Value> {
    observe_key_path_until(root, path, &lifetime.ended())
}

/// Observe the value at `path` until `ended` emits or completes.
pub(crate) fn observe_key_path_until(
    root: &ObjectRef,
    path: &KeyPath,
    ended: &Signal<()>,
) -> Signal<Value> {
    let segments: Rc<[String]> = path.segments().into();
    observe_from(Rc::clone(root), segments, 0).take_until(ended)
}

fn observe_from(object: ObjectRef, segments: Rc<[String]>, index: usize) -> Signal<Value> {
    let Some(key) = segments.get(index) else {
        return Signal::just(Value::Object(object));
    };
    let head = object.observe_key(key);
    if index + 1 == segments.len() {
        return head;
    }
    head.map(move |value| match value {
        Value::Object(next) => observe_from(next, Rc::clone(&segments), index + 1),
        _ => Signal::just(Value::Null),
    })
    .switch_to_latest()
}

/// Observe a single key, failing the signal on an unknown key.
pub(crate) fn observe_known_key(
    object: &(impl KeyValueCoding + ?Sized),
    key: &str,
    observe: impl FnOnce() -> Signal<Value>,
) -> Signal<Value> {
    if object.value_for_key(key).is_none() {
        return Signal::fail(SignalError::Binding(unknown_key(object, key)));
    }
    observe()
}
