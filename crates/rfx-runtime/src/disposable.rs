#![forbid(unsafe_code)]

//! Revocation handles for subscriptions.
//!
//! - [`Disposable`]: cloneable, idempotent cancellation handle. Combinators
//!   chain these together so that disposing a downstream handle tears down
//!   every upstream subscription it created.
//! - [`Subscription`]: RAII guard around a [`Disposable`], returned to callers
//!   of the terminal `subscribe*` operations. Dropping it revokes the
//!   subscription.
//! - [`BindingScope`]: collects the subscriptions of one logical owner (a
//!   screen, a widget) and releases them together.
//!
//! # Invariants
//!
//! 1. `dispose()` runs the registered teardown actions at most once, no matter
//!    how many clones call it.
//! 2. Adding a child to an already-disposed handle disposes the child
//!    immediately.
//! 3. Disposing one subscription never affects a sibling subscription on the
//!    same signal.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

type Teardown = Box<dyn FnOnce()>;

struct DisposableInner {
    disposed: Cell<bool>,
    teardown: RefCell<Vec<Teardown>>,
}

/// Idempotent cancellation handle. Clones share state.
#[derive(Clone)]
pub struct Disposable {
    inner: Rc<DisposableInner>,
}

impl Disposable {
    /// A handle with no teardown of its own. Children can be attached with
    /// [`add`](Self::add).
    #[must_use]
    pub fn composite() -> Self {
        Self {
            inner: Rc::new(DisposableInner {
                disposed: Cell::new(false),
                teardown: RefCell::new(Vec::new()),
            }),
        }
    }

    /// A handle that runs `action` when disposed.
    #[must_use]
    pub fn new(action: impl FnOnce() + 'static) -> Self {
        let handle = Self::composite();
        handle.add_action(action);
        handle
    }

    /// A handle with nothing to tear down.
    #[must_use]
    pub fn empty() -> Self {
        Self::composite()
    }

    pub fn add_action(&self, action: impl FnOnce() + 'static) {
        if self.inner.disposed.get() {
            action();
            return;
        }
        self.inner.teardown.borrow_mut().push(Box::new(action));
    }

    /// Dispose `child` together with this handle.
    pub fn add(&self, child: Disposable) {
        if Rc::ptr_eq(&self.inner, &child.inner) {
            return;
        }
        self.add_action(move || child.dispose());
    }

    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        // Take the list before running anything: teardown may re-enter.
        let actions = std::mem::take(&mut *self.inner.teardown.borrow_mut());
        for action in actions {
            action();
        }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl fmt::Debug for Disposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposable")
            .field("disposed", &self.inner.disposed.get())
            .field("pending", &self.inner.teardown.borrow().len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// RAII guard for a live subscription.
///
/// Dropping the guard disposes the subscription. Use
/// [`detach`](Self::detach) to keep the subscription running for as long as
/// its signal does.
#[must_use = "dropping a Subscription immediately unsubscribes"]
pub struct Subscription {
    handle: Option<Disposable>,
}

impl Subscription {
    pub(crate) fn new(handle: Disposable) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    /// Revoke the subscription now. Idempotent.
    pub fn dispose(&self) {
        if let Some(handle) = &self.handle {
            handle.dispose();
        }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.handle.as_ref().is_none_or(Disposable::is_disposed)
    }

    /// Give up the guard, returning the plain handle. The subscription is no
    /// longer revoked on drop.
    pub fn detach(mut self) -> Disposable {
        self.handle.take().unwrap_or_default()
    }
}

impl Default for Disposable {
    fn default() -> Self {
        Self::empty()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.dispose();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// BindingScope
// ---------------------------------------------------------------------------

/// Collects the subscriptions of one owner.
///
/// When the scope is dropped, all held subscriptions are released, in
/// reverse registration order.
#[derive(Default)]
pub struct BindingScope {
    subscriptions: Vec<Subscription>,
}

impl BindingScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `subscription` alive until the scope is dropped or cleared.
    pub fn hold(&mut self, subscription: Subscription) -> &mut Self {
        self.subscriptions.push(subscription);
        self
    }

    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.subscriptions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Release everything now. The scope stays usable.
    pub fn clear(&mut self) {
        while let Some(subscription) = self.subscriptions.pop() {
            drop(subscription);
        }
    }
}

impl Drop for BindingScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for BindingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingScope")
            .field("binding_count", &self.subscriptions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispose_runs_teardown_once() {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let handle = Disposable::new(move || c.set(c.get() + 1));
        let clone = handle.clone();

        handle.dispose();
        clone.dispose();
        handle.dispose();

        assert_eq!(count.get(), 1);
        assert!(clone.is_disposed());
    }

    #[test]
    fn add_to_disposed_composite_disposes_child() {
        let parent = Disposable::composite();
        parent.dispose();

        let child = Disposable::composite();
        parent.add(child.clone());
        assert!(child.is_disposed());
    }

    #[test]
    fn composite_disposes_children() {
        let parent = Disposable::composite();
        let a = Disposable::composite();
        let b = Disposable::composite();
        parent.add(a.clone());
        parent.add(b.clone());

        parent.dispose();
        assert!(a.is_disposed());
        assert!(b.is_disposed());
    }

    #[test]
    fn subscription_disposes_on_drop() {
        let handle = Disposable::composite();
        {
            let _sub = Subscription::new(handle.clone());
            assert!(!handle.is_disposed());
        }
        assert!(handle.is_disposed());
    }

    #[test]
    fn detach_keeps_subscription_alive() {
        let handle = Disposable::composite();
        let sub = Subscription::new(handle.clone());
        let detached = sub.detach();
        assert!(!handle.is_disposed());
        detached.dispose();
        assert!(handle.is_disposed());
    }

    #[test]
    fn scope_releases_in_reverse_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut scope = BindingScope::new();
        for i in 0..3 {
            let order = Rc::clone(&order);
            scope.hold(Subscription::new(Disposable::new(move || {
                order.borrow_mut().push(i);
            })));
        }
        assert_eq!(scope.binding_count(), 3);

        drop(scope);
        assert_eq!(*order.borrow(), vec![2, 1, 0]);
    }

    #[test]
    fn scope_clear_is_reusable() {
        let mut scope = BindingScope::new();
        scope.hold(Subscription::new(Disposable::composite()));
        scope.clear();
        assert!(scope.is_empty());
        scope.hold(Subscription::new(Disposable::composite()));
        assert_eq!(scope.binding_count(), 1);
    }
}
