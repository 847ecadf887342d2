#![forbid(unsafe_code)]

//! Dynamic values, selectors and key paths.

use std::fmt;
use std::rc::Rc;

use super::{KeyValueCoding, ObjectRef};
use crate::error::SignalError;
use crate::signal::Signal;

/// A dynamically typed property value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Object(ObjectRef),
}

impl Value {
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Object(_) => "object",
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Numeric truthiness: `Bool(b)` is `b`, numbers are true when non-zero,
    /// `Null` is false.
    ///
    /// # Errors
    ///
    /// [`SignalError::Coercion`] for strings and objects.
    pub fn truthiness(&self) -> Result<bool, SignalError> {
        match self {
            Self::Null => Ok(false),
            Self::Bool(b) => Ok(*b),
            Self::Int(n) => Ok(*n != 0),
            Self::Float(f) => Ok(*f != 0.0),
            Self::Str(_) | Self::Object(_) => Err(SignalError::Coercion {
                expected: "bool",
                found: self.kind_name(),
            }),
        }
    }
}

impl PartialEq for Value {
    /// Objects compare by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Int(n) => f.debug_tuple("Int").field(n).finish(),
            Self::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Self::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Self::Object(object) => f.debug_tuple("Object").field(&object.describe()).finish(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::Object(object) => f.write_str(&object.describe()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl<O: KeyValueCoding + 'static> From<Rc<O>> for Value {
    fn from(object: Rc<O>) -> Self {
        Self::Object(object)
    }
}

impl Signal<Value> {
    /// Normalize numeric truthiness into `bool`. Values that have no
    /// truthiness fail the signal with [`SignalError::Coercion`].
    pub fn boolean(&self) -> Signal<bool> {
        self.try_map(|value| value.truthiness())
    }
}

// ---------------------------------------------------------------------------
// Selector
// ---------------------------------------------------------------------------

/// A multi-part operation name plus its argument count.
///
/// Each part of the name is terminated by `:`, so `set_title_color` with the
/// keyword `for_state` becomes `set_title_color:for_state:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selector {
    name: String,
    arity: usize,
}

impl Selector {
    #[must_use]
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        Self {
            name: name.into(),
            arity,
        }
    }

    /// Build the full selector for a call named `name` with `keywords`.
    #[must_use]
    pub fn with_keywords<S: AsRef<str>>(name: &str, keywords: &[S], arity: usize) -> Self {
        let mut full = String::with_capacity(name.len() + 1);
        full.push_str(name);
        full.push(':');
        for keyword in keywords {
            full.push_str(keyword.as_ref());
            full.push(':');
        }
        Self::new(full, arity)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.arity
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// ---------------------------------------------------------------------------
// KeyPath
// ---------------------------------------------------------------------------

/// Ordered property names, displayed dot-joined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyPath {
    segments: Vec<String>,
}

impl KeyPath {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a dotted path. Empty segments are dropped, so `""` is the empty
    /// path and `"a..b"` is `a.b`.
    #[must_use]
    pub fn parse(dotted: &str) -> Self {
        Self {
            segments: dotted
                .split('.')
                .filter(|segment| !segment.is_empty())
                .map(str::to_owned)
                .collect(),
        }
    }

    /// Append `segment`. A dotted segment appends each of its parts and
    /// empty parts are dropped, as in [`parse`](Self::parse).
    pub fn push(&mut self, segment: impl Into<String>) {
        let segment = segment.into();
        if !segment.is_empty() && !segment.contains('.') {
            self.segments.push(segment);
            return;
        }
        self.segments.extend(
            segment
                .split('.')
                .filter(|part| !part.is_empty())
                .map(str::to_owned),
        );
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Everything but the last segment, and the last segment.
    #[must_use]
    pub fn split_last(&self) -> Option<(&[String], &str)> {
        self.segments
            .split_last()
            .map(|(last, parent)| (parent, last.as_str()))
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl<S: Into<String>> FromIterator<S> for KeyPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut path = Self::new();
        for segment in iter {
            path.push(segment);
        }
        path
    }
}
