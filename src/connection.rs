//! Connection handles and subscription configuration.

use std::fmt;
use std::sync::Weak;
use std::sync::atomic::{AtomicBool, Ordering};

use slotmap::new_key_type;

new_key_type! {
    /// Generation-tagged identity of one signal-slot connection.
    ///
    /// Keys stay stable across unrelated insertions and removals; a removed
    /// key never aliases a later connection.
    pub struct ConnectionId;
}

/// How a connected slot is invoked when the signal is emitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeliveryPolicy {
    /// Invoke the slot immediately, inline on the emitting thread.
    Direct,

    /// Submit the slot invocation to the signal's task queue and return
    /// immediately. Safe for cross-thread delivery.
    Queued,

    /// Submit to the task queue, then suspend the emitting thread until that
    /// invocation completes before moving to the next entry.
    ///
    /// # Warning
    ///
    /// Emitting with a `Blocking` slot from the queue's home thread
    /// **deadlocks**: emit waits for the queue, and the queue's thread is
    /// busy waiting inside emit.
    Blocking,

    /// Resolve per emission: `Direct` when emitting from the queue's home
    /// thread (or when no queue is attached), `Queued` otherwise.
    ///
    /// This is the default and the recommended policy for most slots.
    #[default]
    Auto,
}

/// Per-subscription configuration passed to [`connect_with`].
///
/// # Example
///
/// ```
/// use signalkit::{DeliveryPolicy, SlotConfig};
///
/// let config = SlotConfig::default()
///     .name("autosave")
///     .priority(-10)
///     .policy(DeliveryPolicy::Queued)
///     .unique();
/// assert_eq!(config.priority, -10);
/// ```
///
/// [`connect_with`]: crate::Signal::connect_with
#[derive(Clone, Debug)]
pub struct SlotConfig {
    /// Optional name, used for name-based disconnect/toggle and duplicate
    /// detection. Not required to be unique unless the caller relies on
    /// name-based operations.
    pub name: Option<String>,
    /// Dispatch order: lower values dispatch earlier. Ties are stable in
    /// subscription order.
    pub priority: i32,
    /// Delivery policy for this slot.
    pub policy: DeliveryPolicy,
    /// Whether the slot starts enabled.
    pub enabled: bool,
    /// Refuse the connect if an equivalent slot already exists (same
    /// receiver/method pair, or same name).
    pub unique: bool,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            name: None,
            priority: 0,
            policy: DeliveryPolicy::Auto,
            enabled: true,
            unique: false,
        }
    }
}

impl SlotConfig {
    /// Set the slot name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the dispatch priority.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the delivery policy.
    pub fn policy(mut self, policy: DeliveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Start the slot disabled; it can be enabled later through its handle
    /// or by name.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Enable duplicate detection for this connect call.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Registry operations a handle can perform without knowing the signal's
/// argument type.
pub(crate) trait RegistryOps: Send + Sync {
    fn remove(&self, id: ConnectionId) -> bool;
    fn set_enabled(&self, id: ConnectionId, enabled: bool) -> bool;
    fn contains(&self, id: ConnectionId) -> bool;
}

/// Caller-held token controlling one subscription.
///
/// Returned by the `connect` family on [`Signal`]. The handle owns a
/// disconnect capability, not the slot itself: **dropping the handle does not
/// disconnect**. Disconnection is explicit via [`disconnect`](Self::disconnect)
/// or name-based removal on the signal.
///
/// Handles are movable-only (not `Clone`) and follow a one-way state machine:
/// `Valid → Disconnected`, never reversed. After disconnecting,
/// [`set_enabled`](Self::set_enabled) and further [`disconnect`](Self::disconnect)
/// calls are idempotent no-ops returning `false`.
///
/// The enabled flag is a separate axis from validity: toggling it neither
/// removes nor reorders the slot.
///
/// [`Signal`]: crate::Signal
pub struct ConnectionHandle {
    registry: Weak<dyn RegistryOps>,
    id: ConnectionId,
    disconnected: AtomicBool,
}

impl ConnectionHandle {
    pub(crate) fn new(registry: Weak<dyn RegistryOps>, id: ConnectionId) -> Self {
        Self {
            registry,
            id,
            disconnected: AtomicBool::new(false),
        }
    }

    /// Remove the subscription from its signal.
    ///
    /// Returns `true` if the slot was removed, `false` if the handle was
    /// already disconnected, the slot was removed by name, or the signal is
    /// gone. Never an error; the handle is permanently invalid afterwards.
    ///
    /// An emission that snapshotted the registry before this call may still
    /// invoke the slot once (best-effort, see [`Signal::emit`]).
    ///
    /// [`Signal::emit`]: crate::Signal::emit
    pub fn disconnect(&self) -> bool {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            return false;
        }
        match self.registry.upgrade() {
            Some(registry) => registry.remove(self.id),
            None => false,
        }
    }

    /// Toggle the slot's enabled flag. O(1), does not reorder or remove.
    ///
    /// Takes effect for the next emission; an in-flight emission that already
    /// took its snapshot may not observe the change. Returns `false` without
    /// effect on a disconnected or invalid handle.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        if self.disconnected.load(Ordering::SeqCst) {
            return false;
        }
        match self.registry.upgrade() {
            Some(registry) => registry.set_enabled(self.id, enabled),
            None => false,
        }
    }

    /// Whether this handle still refers to a live subscription.
    pub fn is_connected(&self) -> bool {
        if self.disconnected.load(Ordering::SeqCst) {
            return false;
        }
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.contains(self.id))
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("disconnected", &self.disconnected.load(Ordering::SeqCst))
            .finish()
    }
}

static_assertions::assert_impl_all!(ConnectionHandle: Send, Sync);
static_assertions::assert_not_impl_any!(ConnectionHandle: Clone, Copy);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SlotConfig::default();
        assert_eq!(config.priority, 0);
        assert_eq!(config.policy, DeliveryPolicy::Auto);
        assert!(config.enabled);
        assert!(!config.unique);
        assert!(config.name.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = SlotConfig::default()
            .name("x")
            .priority(7)
            .policy(DeliveryPolicy::Blocking)
            .disabled()
            .unique();
        assert_eq!(config.name.as_deref(), Some("x"));
        assert_eq!(config.priority, 7);
        assert_eq!(config.policy, DeliveryPolicy::Blocking);
        assert!(!config.enabled);
        assert!(config.unique);
    }

    #[test]
    fn test_handle_with_dead_registry() {
        // A handle whose signal is gone is permanently a no-op.
        let handle = ConnectionHandle::new(Weak::<DeadRegistry>::new(), ConnectionId::default());
        assert!(!handle.is_connected());
        assert!(!handle.set_enabled(true));
        assert!(!handle.disconnect());
        assert!(!handle.disconnect());
    }

    struct DeadRegistry;

    impl RegistryOps for DeadRegistry {
        fn remove(&self, _id: ConnectionId) -> bool {
            false
        }
        fn set_enabled(&self, _id: ConnectionId, _enabled: bool) -> bool {
            false
        }
        fn contains(&self, _id: ConnectionId) -> bool {
            false
        }
    }
}
