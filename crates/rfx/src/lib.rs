#![forbid(unsafe_code)]

//! rfx public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users.

pub use rfx_runtime as runtime;
pub use rfx_runtime::bind_path;

pub mod prelude {
    pub use rfx_runtime::{
        ArgValue, Argument, BindingError, BindingScope, Command, Event, KeyPath, KeyValueCoding,
        Lifetime, Object, ObjectRef, Observable, Reducer, RunLoop, Scheduler, Selector, Signal,
        SignalError, Subject, Subscription, Value, bind, combine_latest, reduce_latest,
    };
    pub use rfx_runtime::bind_path;
}
