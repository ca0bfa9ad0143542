//! Signal/slot dispatch.
//!
//! This module provides a type-safe signal/slot mechanism for inter-component
//! communication. Signals are emitted when something happens, and connected
//! slots (callbacks) are invoked in response, ordered by priority.
//!
//! # Key Types
//!
//! - [`Signal<Args>`] - The event source, owning the subscription registry
//! - [`ConnectionHandle`] - Movable-only token returned when connecting
//! - [`DeliveryPolicy`] - How a slot is invoked (Direct, Queued, Blocking, Auto)
//! - [`SlotConfig`] - Name, priority, policy and duplicate-check settings
//! - [`SlotTarget`] - Uniform wrapper over closures and receiver methods
//!
//! # Ordering
//!
//! Slots dispatch in ascending priority order (lower value first), stable in
//! subscription order on ties. Within one `emit`, queued entries are submitted
//! to the task queue in that same order; across concurrent `emit` calls no
//! relative ordering is guaranteed.
//!
//! # Thread Safety
//!
//! `connect`, `disconnect`, `set_enabled` and `emit` may race freely from any
//! thread. Emission takes a point-in-time snapshot of the enabled entries
//! under a read lock, then invokes with no lock held, so slots can reconnect
//! or disconnect reentrantly without deadlocking. A disconnect that completes
//! before an emission snapshots is guaranteed excluded; one that races with
//! an in-flight emission is excluded best-effort only, since the snapshot may
//! already hold the entry.
//!
//! # Example
//!
//! ```
//! use signalkit::Signal;
//!
//! // Create a signal that passes a string argument
//! let text_changed = Signal::<String>::new();
//!
//! // Connect a slot (closure)
//! let handle = text_changed.connect(|text| {
//!     println!("text changed to {text}");
//! });
//!
//! // Emit the signal
//! text_changed.emit("hello".to_string());
//!
//! // Disconnect when done (dropping the handle alone does not disconnect)
//! handle.disconnect();
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use parking_lot::RwLock;
use slotmap::SlotMap;

use crate::connection::{ConnectionHandle, ConnectionId, DeliveryPolicy, RegistryOps, SlotConfig};
use crate::error::{Result, SignalError};
use crate::invocation::{QueuedInvocation, completion_pair};
use crate::logging::{panic_message, targets};
use crate::queue::TaskQueue;
use crate::slot::SlotTarget;

/// Internal storage for one subscription.
struct SlotEntry<Args> {
    target: SlotTarget<Args>,
    priority: i32,
    policy: DeliveryPolicy,
    /// Shared with nothing but toggled without the writer lock.
    enabled: Arc<AtomicBool>,
    name: Option<String>,
}

/// Registry contents guarded by the readers-writer lock.
struct RegistryState<Args> {
    slots: SlotMap<ConnectionId, SlotEntry<Args>>,
    /// Keys sorted by ascending priority. The ordered insert in
    /// `insert_locked` is what keeps ties stable in subscription order.
    order: Vec<ConnectionId>,
}

impl<Args> RegistryState<Args> {
    fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
            order: Vec::new(),
        }
    }
}

/// State shared between the signal, its handles, and in-flight snapshots.
struct SignalShared<Args> {
    registry: RwLock<RegistryState<Args>>,
    /// Injected task queue for Queued/Blocking/Auto delivery.
    queue: Option<Arc<dyn TaskQueue>>,
    /// Whether signal emission is temporarily blocked.
    blocked: AtomicBool,
    /// Catch-and-report panicking direct slots instead of propagating.
    catch_panics: AtomicBool,
}

impl<Args: 'static> RegistryOps for SignalShared<Args> {
    fn remove(&self, id: ConnectionId) -> bool {
        let mut state = self.registry.write();
        if state.slots.remove(id).is_some() {
            state.order.retain(|key| *key != id);
            true
        } else {
            false
        }
    }

    fn set_enabled(&self, id: ConnectionId, enabled: bool) -> bool {
        let state = self.registry.read();
        match state.slots.get(id) {
            Some(entry) => {
                entry.enabled.store(enabled, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    fn contains(&self, id: ConnectionId) -> bool {
        self.registry.read().slots.contains_key(id)
    }
}

/// One snapshotted entry, owned independently of the registry.
struct DispatchEntry<Args> {
    target: SlotTarget<Args>,
    policy: DeliveryPolicy,
}

/// A type-safe signal with priority-ordered slots.
///
/// When a signal is emitted, the connected, enabled slots are invoked in
/// ascending priority order with the provided arguments, each according to
/// its [`DeliveryPolicy`].
///
/// # Type Parameter
///
/// - `Args`: the argument type passed to slots. Use `()` for argument-free
///   signals, or a tuple like `(String, i32)` for multiple arguments. Cloned
///   once per queued delivery.
///
/// # Task queue
///
/// Asynchronous delivery requires a [`TaskQueue`] injected via
/// [`with_queue`](Self::with_queue). Without one, `Auto` resolves to `Direct`
/// and `Queued`/`Blocking` fall back to inline invocation with a warning.
///
/// # Destruction
///
/// Dropping a signal releases all entries without flushing: an emission
/// already in flight owns its snapshot and completes independently, and
/// invocations already submitted to the task queue still run.
pub struct Signal<Args> {
    shared: Arc<SignalShared<Args>>,
}

impl<Args: Clone + Send + 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: Clone + Send + 'static> Signal<Args> {
    /// Create a signal with no connections and no task queue.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create a signal that delivers asynchronous work through `queue`.
    pub fn with_queue(queue: Arc<dyn TaskQueue>) -> Self {
        Self::build(Some(queue))
    }

    fn build(queue: Option<Arc<dyn TaskQueue>>) -> Self {
        Self {
            shared: Arc::new(SignalShared {
                registry: RwLock::new(RegistryState::new()),
                queue,
                blocked: AtomicBool::new(false),
                catch_panics: AtomicBool::new(false),
            }),
        }
    }

    /// Connect a closure with the default configuration (priority 0, `Auto`
    /// delivery, enabled, no duplicate check).
    ///
    /// The slot is visible to every `emit` that snapshots after this returns.
    ///
    /// # Example
    ///
    /// ```
    /// use signalkit::Signal;
    ///
    /// let signal = Signal::<String>::new();
    /// let handle = signal.connect(|s| println!("got {s}"));
    /// signal.emit("hello".to_string());
    /// assert!(handle.is_connected());
    /// ```
    pub fn connect<F>(&self, slot: F) -> ConnectionHandle
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.insert(SlotTarget::function(slot), SlotConfig::default())
    }

    /// Connect a closure with a specific delivery policy.
    pub fn connect_with_policy<F>(&self, slot: F, policy: DeliveryPolicy) -> ConnectionHandle
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.insert(SlotTarget::function(slot), SlotConfig::default().policy(policy))
    }

    /// Connect a prepared [`SlotTarget`] with full configuration.
    ///
    /// With [`SlotConfig::unique`] set, the connect is refused with
    /// [`SignalError::DuplicateSlot`] when an entry with the same
    /// receiver/method identity pair, or the same name, already exists; the
    /// registry is left untouched.
    ///
    /// # Example
    ///
    /// ```
    /// use signalkit::{Signal, SlotConfig, SlotTarget};
    ///
    /// let signal = Signal::<i32>::new();
    /// let config = SlotConfig::default().name("log").unique();
    /// assert!(signal.connect_with(SlotTarget::function(|_| {}), config.clone()).is_ok());
    /// assert!(signal.connect_with(SlotTarget::function(|_| {}), config).is_err());
    /// assert_eq!(signal.connection_count(), 1);
    /// ```
    pub fn connect_with(
        &self,
        target: SlotTarget<Args>,
        config: SlotConfig,
    ) -> Result<ConnectionHandle> {
        let mut state = self.shared.registry.write();
        if config.unique && Self::has_duplicate(&state, &target, config.name.as_deref()) {
            return Err(SignalError::DuplicateSlot {
                name: config.name.clone(),
            });
        }
        Ok(self.insert_locked(&mut state, target, config))
    }

    fn has_duplicate(
        state: &RegistryState<Args>,
        target: &SlotTarget<Args>,
        name: Option<&str>,
    ) -> bool {
        state.slots.values().any(|entry| {
            let same_method = target.receiver.is_some()
                && target.callable.is_some()
                && entry.target.receiver == target.receiver
                && entry.target.callable == target.callable;
            let same_name = name.is_some() && entry.name.as_deref() == name;
            same_method || same_name
        })
    }

    fn insert(&self, target: SlotTarget<Args>, config: SlotConfig) -> ConnectionHandle {
        let mut state = self.shared.registry.write();
        self.insert_locked(&mut state, target, config)
    }

    fn insert_locked(
        &self,
        state: &mut RegistryState<Args>,
        target: SlotTarget<Args>,
        config: SlotConfig,
    ) -> ConnectionHandle {
        let priority = config.priority;
        let id = state.slots.insert(SlotEntry {
            target,
            priority,
            policy: config.policy,
            enabled: Arc::new(AtomicBool::new(config.enabled)),
            name: config.name,
        });

        // Insert after every entry with priority <= ours: ascending order,
        // stable on ties.
        let position = {
            let slots = &state.slots;
            state
                .order
                .partition_point(|key| slots[*key].priority <= priority)
        };
        state.order.insert(position, id);

        tracing::trace!(
            target: targets::SIGNAL,
            ?id,
            priority,
            "slot connected"
        );

        let registry = Arc::downgrade(&self.shared);
        let registry: std::sync::Weak<dyn RegistryOps> = registry;
        ConnectionHandle::new(registry, id)
    }

    /// Remove every slot registered under `name`.
    ///
    /// Returns `true` if anything was removed. Calling again for the same
    /// name returns `false`; never an error.
    pub fn disconnect_name(&self, name: &str) -> bool {
        let mut state = self.shared.registry.write();
        let matching: Vec<ConnectionId> = state
            .slots
            .iter()
            .filter(|(_, entry)| entry.name.as_deref() == Some(name))
            .map(|(id, _)| id)
            .collect();
        if matching.is_empty() {
            return false;
        }
        for id in &matching {
            state.slots.remove(*id);
        }
        state.order.retain(|id| !matching.contains(id));
        true
    }

    /// Toggle the enabled flag of every slot registered under `name`.
    ///
    /// Returns `true` if any slot matched.
    pub fn set_name_enabled(&self, name: &str, enabled: bool) -> bool {
        let state = self.shared.registry.read();
        let mut found = false;
        for entry in state.slots.values() {
            if entry.name.as_deref() == Some(name) {
                entry.enabled.store(enabled, Ordering::SeqCst);
                found = true;
            }
        }
        found
    }

    /// Disconnect all slots.
    pub fn disconnect_all(&self) {
        let mut state = self.shared.registry.write();
        state.slots.clear();
        state.order.clear();
    }

    /// Number of connected slots, enabled or not.
    pub fn connection_count(&self) -> usize {
        self.shared.registry.read().slots.len()
    }

    /// Whether no slots are connected.
    pub fn is_empty(&self) -> bool {
        self.connection_count() == 0
    }

    /// Block signal emission temporarily.
    ///
    /// While blocked, `emit` does nothing. Useful during initialization or
    /// batch updates to suppress cascading notifications.
    pub fn set_blocked(&self, blocked: bool) {
        self.shared.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Check if signal emission is currently blocked.
    pub fn is_blocked(&self) -> bool {
        self.shared.blocked.load(Ordering::SeqCst)
    }

    /// Catch panics from directly-invoked slots and report them via
    /// `tracing::error!` instead of propagating.
    ///
    /// Off by default: a panicking slot unwinds out of `emit` (abandoning the
    /// remaining entries of that emission) so bugs are not silently lost.
    pub fn set_catch_panics(&self, catch: bool) {
        self.shared.catch_panics.store(catch, Ordering::SeqCst);
    }

    /// Emit the signal, invoking the connected slots.
    ///
    /// Takes a priority-ordered snapshot of the entries that are enabled at
    /// snapshot time, releases the registry lock, then delivers per entry:
    ///
    /// - `Direct`: invoked inline; panics propagate unless
    ///   [`set_catch_panics`](Self::set_catch_panics) is on.
    /// - `Auto`: `Direct` when no queue is attached or the caller is on the
    ///   queue's home thread, else `Queued`.
    /// - `Queued`: arguments are cloned and the invocation submitted to the
    ///   task queue; same-emit submissions happen in priority order.
    /// - `Blocking`: submitted like `Queued`, but the emitting thread waits
    ///   for that invocation to finish before the next entry.
    ///
    /// Emitting with zero connected slots, or while blocked, is a no-op.
    #[tracing::instrument(skip_all, target = "signalkit::signal", level = "trace")]
    pub fn emit(&self, args: Args) {
        if self.is_blocked() {
            tracing::trace!(target: targets::SIGNAL, "signal blocked, skipping emit");
            return;
        }

        let snapshot = self.snapshot();
        tracing::trace!(target: targets::SIGNAL, slot_count = snapshot.len(), "emitting signal");

        let current_thread = thread::current().id();
        for entry in snapshot {
            match entry.policy {
                DeliveryPolicy::Direct => self.invoke_direct(&entry.target, &args),
                DeliveryPolicy::Auto if self.resolves_direct(current_thread) => {
                    self.invoke_direct(&entry.target, &args);
                }
                DeliveryPolicy::Auto | DeliveryPolicy::Queued => {
                    self.submit_queued(entry.target, args.clone());
                }
                DeliveryPolicy::Blocking => {
                    self.submit_blocking(entry.target, args.clone());
                }
            }
        }
    }

    /// Emit with every slot forced through the task queue, regardless of its
    /// policy.
    ///
    /// Use this to guarantee deferred execution, e.g. to avoid re-entrancy
    /// into the emitting call stack. Returns the number of slots queued, or
    /// 0 if the signal is blocked.
    pub fn emit_queued(&self, args: Args) -> usize {
        if self.is_blocked() {
            return 0;
        }

        let snapshot = self.snapshot();
        let count = snapshot.len();
        for entry in snapshot {
            self.submit_queued(entry.target, args.clone());
        }
        count
    }

    /// Point-in-time view of the enabled entries, in dispatch order.
    ///
    /// The returned entries own their targets; the registry lock is released
    /// when this returns, so invocation never holds it.
    fn snapshot(&self) -> Vec<DispatchEntry<Args>> {
        let state = self.shared.registry.read();
        state
            .order
            .iter()
            .filter_map(|id| {
                let entry = state.slots.get(*id)?;
                if !entry.enabled.load(Ordering::SeqCst) {
                    return None;
                }
                Some(DispatchEntry {
                    target: entry.target.clone(),
                    policy: entry.policy,
                })
            })
            .collect()
    }

    fn resolves_direct(&self, current_thread: thread::ThreadId) -> bool {
        match &self.shared.queue {
            Some(queue) => queue.home_thread() == current_thread,
            None => true,
        }
    }

    fn invoke_direct(&self, target: &SlotTarget<Args>, args: &Args) {
        if self.shared.catch_panics.load(Ordering::SeqCst) {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| target.call(args))) {
                tracing::error!(
                    target: targets::SIGNAL,
                    "slot panicked during direct delivery: {}",
                    panic_message(payload.as_ref())
                );
            }
        } else {
            target.call(args);
        }
    }

    fn submit_queued(&self, target: SlotTarget<Args>, args: Args) {
        match &self.shared.queue {
            Some(queue) => {
                queue.submit(QueuedInvocation::new(move || target.call(&args)));
            }
            None => {
                tracing::warn!(
                    target: targets::SIGNAL,
                    "no task queue attached, executing queued slot inline"
                );
                // Inline delivery honors the catch-panics setting like any
                // other direct invocation.
                self.invoke_direct(&target, &args);
            }
        }
    }

    fn submit_blocking(&self, target: SlotTarget<Args>, args: Args) {
        match &self.shared.queue {
            Some(queue) => {
                let (handle, waiter) = completion_pair();
                let invocation =
                    QueuedInvocation::with_completion(move || target.call(&args), handle);
                queue.submit(invocation);
                waiter.wait();
            }
            None => {
                tracing::warn!(
                    target: targets::SIGNAL,
                    "no task queue attached, executing blocking slot inline"
                );
                self.invoke_direct(&target, &args);
            }
        }
    }
}

static_assertions::assert_impl_all!(Signal<(String, i32)>: Send, Sync);
