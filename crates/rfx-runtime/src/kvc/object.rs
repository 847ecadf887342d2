#![forbid(unsafe_code)]

//! A concrete key-value coding object: a property bag with methods.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use tracing::trace;

use super::{KeyValueCoding, Selector, Value, observe_known_key, unknown_key};
use crate::error::{BindingError, Result};
use crate::signal::{Signal, Subject};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

fn next_object_id() -> u64 {
    NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)
}

type MethodFn = Rc<dyn Fn(&Object, &[Value]) -> Result<Value>>;

struct Method {
    arity: usize,
    call: MethodFn,
}

/// Property bag with change notification and registered methods.
///
/// The set of keys is fixed at build time; writing an unknown key is an
/// error. Methods are looked up by full selector name and argument count.
pub struct Object {
    class: String,
    id: u64,
    properties: Rc<RefCell<AHashMap<String, Value>>>,
    channels: RefCell<AHashMap<String, Subject<Value>>>,
    methods: AHashMap<String, Method>,
}

impl Object {
    #[must_use]
    pub fn builder(class: impl Into<String>) -> ObjectBuilder {
        ObjectBuilder {
            class: class.into(),
            properties: AHashMap::new(),
            methods: AHashMap::new(),
        }
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.properties.borrow().get(key).cloned()
    }

    /// Write `key`, notifying observers when the value changed.
    ///
    /// # Errors
    ///
    /// [`BindingError::UnknownKey`] when `key` was not declared.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        {
            let mut properties = self.properties.borrow_mut();
            let slot = properties
                .get_mut(key)
                .ok_or_else(|| unknown_key(self, key))?;
            if *slot == value {
                return Ok(());
            }
            *slot = value.clone();
        }
        trace!(object = %self.describe(), key, "property changed");
        let channel = self.channels.borrow().get(key).cloned();
        if let Some(channel) = channel {
            channel.send_next(value);
        }
        Ok(())
    }

    /// Declared keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.properties.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn channel(&self, key: &str) -> Subject<Value> {
        self.channels
            .borrow_mut()
            .entry(key.to_owned())
            .or_default()
            .clone()
    }
}

impl KeyValueCoding for Object {
    fn describe(&self) -> String {
        format!("{}#{}", self.class, self.id)
    }

    fn value_for_key(&self, key: &str) -> Option<Value> {
        self.get(key)
    }

    fn set_value_for_key(&self, key: &str, value: Value) -> Result<()> {
        self.set(key, value)
    }

    fn observe_key(&self, key: &str) -> Signal<Value> {
        observe_known_key(self, key, || {
            let properties = Rc::clone(&self.properties);
            let changes = self.channel(key).signal();
            let key = key.to_owned();
            Signal::create(move |observer| {
                let current = properties.borrow().get(&key).cloned().unwrap_or_default();
                observer.send_next(current);
                changes.forward_to(observer)
            })
            // A change still queued when this subscriber joined is already
            // its current value.
            .skip_repeats()
        })
    }

    fn responds_to(&self, selector: &Selector) -> bool {
        self.methods
            .get(selector.name())
            .is_some_and(|method| method.arity == selector.arity())
    }

    fn invoke(&self, selector: &Selector, args: &[Value]) -> Result<Value> {
        let method = self
            .methods
            .get(selector.name())
            .ok_or_else(|| BindingError::Invocation {
                selector: selector.to_string(),
                message: format!("{} has no such operation", self.describe()),
            })?;
        if method.arity != args.len() {
            return Err(BindingError::Invocation {
                selector: selector.to_string(),
                message: format!("expected {} argument(s), got {}", method.arity, args.len()),
            });
        }
        (method.call)(self, args)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.class)
            .field("id", &self.id)
            .field("keys", &self.keys())
            .field("methods", &self.methods.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Declares the keys and methods of an [`Object`].
#[must_use]
pub struct ObjectBuilder {
    class: String,
    properties: AHashMap<String, Value>,
    methods: AHashMap<String, Method>,
}

impl ObjectBuilder {
    pub fn property(mut self, key: impl Into<String>, initial: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), initial.into());
        self
    }

    /// Register `call` under the full selector name `name` (for example
    /// `set_title_color:for_state:`).
    pub fn method(
        mut self,
        name: impl Into<String>,
        arity: usize,
        call: impl Fn(&Object, &[Value]) -> Result<Value> + 'static,
    ) -> Self {
        self.methods.insert(
            name.into(),
            Method {
                arity,
                call: Rc::new(call),
            },
        );
        self
    }

    pub fn build(self) -> Rc<Object> {
        Rc::new(Object {
            class: self.class,
            id: next_object_id(),
            properties: Rc::new(RefCell::new(self.properties)),
            channels: RefCell::new(AHashMap::new()),
            methods: self.methods,
        })
    }
}

impl fmt::Debug for ObjectBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBuilder")
            .field("class", &self.class)
            .finish_non_exhaustive()
    }
}
