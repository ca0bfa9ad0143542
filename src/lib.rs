//! Type-safe signal/slot dispatch with priority ordering and cross-thread
//! delivery.
//!
//! signalkit provides:
//!
//! - **Signals**: typed event sources that invoke connected slots on emission
//! - **Priority ordering**: lower priority dispatches first, ties stable in
//!   subscription order
//! - **Delivery policies**: Direct (inline), Queued (async fire-and-forget),
//!   Blocking (async, awaited), Auto (thread-dependent)
//! - **Connection handles**: explicit enable/disable and disconnect, safe
//!   under concurrent emission
//! - **Receiver safety**: method slots hold their receiver weakly and are
//!   skipped once it is dropped
//! - **Task queue boundary**: asynchronous delivery goes through an injected
//!   [`TaskQueue`]; [`WorkerQueue`] is the built-in dedicated-thread
//!   implementation
//!
//! # Signal/Slot Example
//!
//! ```
//! use signalkit::Signal;
//!
//! let value_changed = Signal::<i32>::new();
//!
//! let handle = value_changed.connect(|value| {
//!     println!("value changed to {value}");
//! });
//!
//! value_changed.emit(42);
//!
//! // Disconnect is explicit; dropping the handle keeps the slot connected.
//! handle.disconnect();
//! ```
//!
//! # Priorities and Policies
//!
//! ```
//! use std::sync::Arc;
//! use signalkit::{DeliveryPolicy, Signal, SlotConfig, SlotTarget, WorkerQueue};
//!
//! let queue = Arc::new(WorkerQueue::new());
//! let saved = Signal::<String>::with_queue(queue.clone());
//!
//! // Runs first (lowest priority value), inline on the emitting thread.
//! saved.connect_with(
//!     SlotTarget::function(|path: &String| println!("validating {path}")),
//!     SlotConfig::default().priority(-10).policy(DeliveryPolicy::Direct),
//! )?;
//!
//! // Runs second, on the queue's thread; emit waits for it to finish.
//! saved.connect_with(
//!     SlotTarget::function(|path: &String| println!("indexing {path}")),
//!     SlotConfig::default().priority(0).policy(DeliveryPolicy::Blocking),
//! )?;
//!
//! saved.emit("/tmp/report.txt".to_string());
//! queue.stop_and_join();
//! # Ok::<(), signalkit::SignalError>(())
//! ```
//!
//! # Method Slots and Hooks
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use signalkit::{Signal, SlotConfig, SlotTarget};
//!
//! struct Document {
//!     edits: AtomicUsize,
//! }
//!
//! impl Document {
//!     fn on_changed(&self, _text: &String) {
//!         self.edits.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let doc = Arc::new(Document { edits: AtomicUsize::new(0) });
//! let changed = Signal::<String>::new();
//!
//! changed.connect_with(
//!     SlotTarget::method(&doc, Document::on_changed),
//!     SlotConfig::default(),
//! )?;
//!
//! changed.emit("draft".to_string());
//! assert_eq!(doc.edits.load(Ordering::SeqCst), 1);
//!
//! // Once the receiver is gone the slot is skipped, never invoked.
//! drop(doc);
//! changed.emit("orphaned".to_string());
//! # Ok::<(), signalkit::SignalError>(())
//! ```

mod connection;
mod error;
pub mod invocation;
pub mod logging;
pub mod queue;
mod signal;
mod slot;

pub use connection::{ConnectionHandle, ConnectionId, DeliveryPolicy, SlotConfig};
pub use error::{Result, SignalError};
pub use invocation::{CompletionHandle, CompletionWaiter, QueuedInvocation, completion_pair};
pub use queue::{TaskQueue, WorkerQueue, WorkerQueueConfig};
pub use signal::Signal;
pub use slot::{ReceiverHooks, ReceiverId, SlotTarget};
