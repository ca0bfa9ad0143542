//! Delivery target abstraction.
//!
//! A [`SlotTarget`] adapts a free function, a closure, or a method plus
//! receiver into one uniform callable the registry can invoke. Method targets
//! hold the receiver weakly: once the owning object is dropped, the slot is
//! silently skipped on emission instead of touching a dead receiver.
//!
//! Receivers can opt into pre/post invocation hooks by implementing
//! [`ReceiverHooks`] and connecting via
//! [`method_with_hooks`](SlotTarget::method_with_hooks). The capability is
//! resolved once at subscription time, not re-probed per call.

use std::sync::{Arc, Weak};

/// Optional pre/post invocation hooks a receiver may implement.
///
/// `before_slot` runs immediately before the target method, on the same
/// thread that performs the invocation. `after_slot` runs immediately after
/// via a drop guard, so it executes even when the target panics.
///
/// Both hooks default to no-ops; implement either independently.
pub trait ReceiverHooks: Send + Sync {
    /// Called immediately before the slot method.
    fn before_slot(&self) {}

    /// Called immediately after the slot method, even on unwind.
    fn after_slot(&self) {}
}

/// Address-sized identity of a receiving object.
///
/// Used for duplicate detection only; the registry never dereferences it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReceiverId(usize);

impl ReceiverId {
    /// Identity of the object behind `receiver`.
    pub fn of<R>(receiver: &Arc<R>) -> Self {
        Self(Arc::as_ptr(receiver) as *const () as usize)
    }
}

/// Calls `after_slot` on drop, so the post hook survives a panicking slot.
struct AfterGuard<'a>(&'a dyn ReceiverHooks);

impl Drop for AfterGuard<'_> {
    fn drop(&mut self) {
        self.0.after_slot();
    }
}

/// A uniform invocable wrapper over a free function, closure, or
/// method-plus-receiver.
///
/// # Type Parameter
///
/// - `Args`: the signal's argument type. Slots receive `&Args`.
pub struct SlotTarget<Args> {
    invoke: Arc<dyn Fn(&Args) + Send + Sync>,
    /// Identity of the owning object, for duplicate detection.
    pub(crate) receiver: Option<ReceiverId>,
    /// Identity of the method fn pointer, for duplicate detection.
    /// Closures have no usable identity, so plain targets carry `None`.
    pub(crate) callable: Option<usize>,
    /// Hook capability resolved at subscription time. Weak, so the hooks
    /// never keep the receiver alive.
    hooks: Option<Weak<dyn ReceiverHooks + Send + Sync>>,
}

impl<Args: 'static> SlotTarget<Args> {
    /// Wrap a free function or closure.
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        Self {
            invoke: Arc::new(f),
            receiver: None,
            callable: None,
            hooks: None,
        }
    }

    /// Wrap a method on a shared receiver.
    ///
    /// The receiver is captured weakly: if the owning `Arc` has been dropped
    /// by the time the signal fires, the invocation is skipped.
    pub fn method<R>(receiver: &Arc<R>, f: fn(&R, &Args)) -> Self
    where
        R: Send + Sync + 'static,
    {
        let weak = Arc::downgrade(receiver);
        Self {
            invoke: Arc::new(move |args: &Args| {
                if let Some(receiver) = weak.upgrade() {
                    f(&receiver, args);
                }
            }),
            receiver: Some(ReceiverId::of(receiver)),
            callable: Some(f as usize),
            hooks: None,
        }
    }

    /// Wrap a method on a receiver that implements [`ReceiverHooks`].
    ///
    /// `before_slot`/`after_slot` bracket every invocation of `f`. Like
    /// [`method`](Self::method), a dropped receiver means neither the hooks
    /// nor the method run.
    pub fn method_with_hooks<R>(receiver: &Arc<R>, f: fn(&R, &Args)) -> Self
    where
        R: ReceiverHooks + 'static,
    {
        let weak = Arc::downgrade(receiver);
        let hooks = Arc::downgrade(receiver);
        let hooks: Weak<dyn ReceiverHooks + Send + Sync> = hooks;
        Self {
            invoke: Arc::new(move |args: &Args| {
                if let Some(receiver) = weak.upgrade() {
                    f(&receiver, args);
                }
            }),
            receiver: Some(ReceiverId::of(receiver)),
            callable: Some(f as usize),
            hooks: Some(hooks),
        }
    }

    /// Invoke the target with hook bracketing and dead-receiver skipping.
    pub(crate) fn call(&self, args: &Args) {
        match &self.hooks {
            Some(hooks) => {
                // Receiver dropped: skip hooks and target alike.
                let Some(hooks) = hooks.upgrade() else { return };
                hooks.before_slot();
                let _after = AfterGuard(&*hooks);
                (self.invoke)(args);
            }
            None => (self.invoke)(args),
        }
    }
}

// Manual impl: derive would demand Args: Clone, which is not required.
impl<Args: 'static> Clone for SlotTarget<Args> {
    fn clone(&self) -> Self {
        Self {
            invoke: self.invoke.clone(),
            receiver: self.receiver,
            callable: self.callable,
            hooks: self.hooks.clone(),
        }
    }
}

static_assertions::assert_impl_all!(SlotTarget<(String, i32)>: Send, Sync, Clone);
