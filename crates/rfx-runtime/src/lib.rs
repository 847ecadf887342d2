#![forbid(unsafe_code)]

//! Push-based signals, gated commands, and key-path bindings.
//!
//! # Layers
//!
//! - [`signal`]: cold [`Signal`]s, hot [`Subject`]s, and the combinators that
//!   compose them.
//! - [`scheduler`]: the [`RunLoop`] delivery context and its timers.
//! - [`command`]: [`Command`], an action gated by a predicate and serialized
//!   so that at most one execution is in flight.
//! - [`kvc`]: the object model bindings talk to, plus the observation bridge.
//! - [`keypath`]: [`KeyPathAgent`], which turns a chain of property names
//!   into an observation, a property binding, or a lifted call.
//!
//! Everything here is single-threaded (`Rc`, `RefCell`).
//!
//! # Example
//!
//! ```
//! use rfx_runtime::{Lifetime, Object, Subject, bind};
//!
//! let label = Object::builder("Label").property("text", "").build();
//! let screen = Lifetime::new("screen");
//! let names = Subject::new();
//!
//! let _binding = bind(label.clone(), &screen)
//!     .assign("text", &names.signal())
//!     .unwrap();
//! names.send_next("Ada".to_owned());
//! assert_eq!(label.get("text").unwrap().as_str(), Some("Ada"));
//! ```

pub mod command;
pub mod disposable;
pub mod error;
pub mod keypath;
pub mod kvc;
pub mod observable;
pub mod scheduler;
pub mod signal;

pub use command::Command;
pub use disposable::{BindingScope, Disposable, Subscription};
pub use error::{BindingError, Result, SignalError};
pub use keypath::{ArgValue, Argument, KeyPathAgent, Resolution, ResolutionMode, bind};
pub use kvc::{KeyPath, KeyValueCoding, Lifetime, Object, ObjectRef, Selector, Value};
pub use observable::Observable;
pub use scheduler::{RunLoop, Scheduler};
pub use signal::{
    CombineLatest, Event, Observer, Reducer, Signal, Subject, combine_latest, combine_latest_with,
    reduce_latest,
};
