#![forbid(unsafe_code)]

//! Observer identity for key-path observations.

use std::fmt;

use tracing::trace;

use crate::signal::{Signal, Subject};

/// The owner of a set of observations.
///
/// Observation signals created against a `Lifetime` complete when it is
/// dropped, so nothing keeps reporting into an owner that no longer exists.
pub struct Lifetime {
    name: String,
    ended: Subject<()>,
}

impl Lifetime {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ended: Subject::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Emits once and completes when the lifetime is dropped. Subscribing
    /// after that completes immediately.
    #[must_use]
    pub fn ended(&self) -> Signal<()> {
        self.ended.signal()
    }
}

impl Drop for Lifetime {
    fn drop(&mut self) {
        trace!(lifetime = %self.name, "lifetime ended");
        self.ended.send_next(());
        self.ended.send_completed();
    }
}

impl fmt::Debug for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifetime")
            .field("name", &self.name)
            .field("observers", &self.ended.observer_count())
            .finish()
    }
}
