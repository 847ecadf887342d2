#![forbid(unsafe_code)]

//! Error types shared by the signal graph and the binding resolver.
//!
//! Two families exist, matching the two moments a failure can happen:
//!
//! - [`BindingError`] is returned synchronously while a binding or combinator
//!   is being *constructed* (wrong reducer arity, missing capability, bad key
//!   path). Nothing has been subscribed when it is returned.
//! - [`SignalError`] travels *through* a running signal graph as a terminal
//!   [`Event::Failed`](crate::signal::Event::Failed) and reaches subscribers
//!   as an explicit failure notification, distinct from completion.
//!
//! Neither family is retried by the runtime.

use thiserror::Error;

pub type Result<T, E = BindingError> = std::result::Result<T, E>;

/// Failure while composing a binding or combinator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("reducer takes {expected} argument(s) but {actual} signal(s) were supplied")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("{target} (via key path '{key_path}') does not respond to `{selector}`")]
    Capability {
        target: String,
        key_path: String,
        selector: String,
    },

    #[error("binding requires a non-empty key path")]
    EmptyKeyPath,

    #[error("`{selector}` has no signal argument to lift")]
    NoSignalArgument { selector: String },

    #[error("{target} has no key '{key}'")]
    UnknownKey { target: String, key: String },

    #[error("value at key path '{key_path}' is not an object")]
    NotAnObject { key_path: String },

    #[error("{target} key '{key}' is read-only")]
    ReadOnlyKey { target: String, key: String },

    #[error("invalid argument to `{operation}`: {message}")]
    InvalidArgument { operation: String, message: String },

    #[error("invocation of `{selector}` failed: {message}")]
    Invocation { selector: String, message: String },
}

impl BindingError {
    #[must_use]
    pub fn invalid_argument(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Terminal failure delivered to subscribers of a signal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    /// A transform inside a combinator failed.
    #[error("upstream failure: {0}")]
    Upstream(String),

    /// A dynamic value could not be coerced at a typed boundary.
    #[error("expected {expected}, found {found}")]
    Coercion {
        expected: &'static str,
        found: &'static str,
    },

    /// A command rejected an invocation.
    #[error("command is not executable")]
    NotExecutable,

    #[error(transparent)]
    Binding(#[from] BindingError),
}

impl SignalError {
    #[must_use]
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }
}
