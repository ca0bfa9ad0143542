//! Deferred slot invocations for cross-thread delivery.
//!
//! When a signal is emitted with a `Queued` or `Blocking` policy (or an `Auto`
//! policy resolved off the queue's home thread), the slot call is wrapped in a
//! [`QueuedInvocation`] and handed to the signal's [`TaskQueue`]. The queue
//! executes it exactly once on its owning thread.
//!
//! Blocking delivery additionally uses a [`completion_pair`]: the invocation
//! carries the [`CompletionHandle`], the emitting thread holds the
//! [`CompletionWaiter`]. Completion is signaled when the handle is dropped, so
//! a slot that panics still unblocks the emitter.
//!
//! [`TaskQueue`]: crate::TaskQueue

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// A type-erased unit of work that can be executed later, exactly once.
///
/// This wraps a closure that captures the slot and its arguments, allowing
/// deferred execution on a [`TaskQueue`]'s owning thread.
///
/// [`TaskQueue`]: crate::TaskQueue
pub struct QueuedInvocation {
    invoke: Box<dyn FnOnce() + Send>,
    /// Present for blocking delivery; signaled on drop.
    completion: Option<CompletionHandle>,
}

impl QueuedInvocation {
    /// Create a new queued invocation.
    pub fn new<F>(invoke: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            invoke: Box::new(invoke),
            completion: None,
        }
    }

    /// Create a queued invocation that signals `completion` once executed.
    pub fn with_completion<F>(invoke: F, completion: CompletionHandle) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            invoke: Box::new(invoke),
            completion: Some(completion),
        }
    }

    /// Execute the invocation, consuming it.
    ///
    /// The completion handle, if any, is dropped when this returns or unwinds,
    /// so blocked emitters are released even if the slot panics.
    pub fn execute(self) {
        let Self { invoke, completion } = self;
        invoke();
        drop(completion);
    }
}

/// Signals completion of a blocking invocation when dropped.
///
/// Held by the [`QueuedInvocation`]; the paired [`CompletionWaiter`] unblocks
/// once this side is dropped, whether the invocation ran to completion,
/// panicked, or was discarded by a shutting-down queue.
pub struct CompletionHandle {
    inner: Arc<CompletionState>,
}

impl Drop for CompletionHandle {
    fn drop(&mut self) {
        let mut done = self.inner.done.lock();
        *done = true;
        self.inner.condvar.notify_all();
    }
}

/// Blocks a thread until the paired [`CompletionHandle`] is dropped.
pub struct CompletionWaiter {
    inner: Arc<CompletionState>,
}

impl CompletionWaiter {
    /// Wait for the invocation to complete.
    ///
    /// # Warning
    ///
    /// Calling this from the queue's home thread deadlocks: the queue cannot
    /// run the invocation while its thread is parked here.
    pub fn wait(self) {
        let mut done = self.inner.done.lock();
        while !*done {
            self.inner.condvar.wait(&mut done);
        }
    }

    /// Wait for the invocation to complete, giving up after `timeout`.
    ///
    /// Returns `true` if the invocation completed, `false` on timeout.
    pub fn wait_timeout(self, timeout: Duration) -> bool {
        let mut done = self.inner.done.lock();
        if *done {
            return true;
        }
        let result = self.inner.condvar.wait_for(&mut done, timeout);
        *done || !result.timed_out()
    }
}

struct CompletionState {
    done: Mutex<bool>,
    condvar: Condvar,
}

/// Create a completion handle/waiter pair for blocking delivery.
pub fn completion_pair() -> (CompletionHandle, CompletionWaiter) {
    let state = Arc::new(CompletionState {
        done: Mutex::new(false),
        condvar: Condvar::new(),
    });

    (
        CompletionHandle {
            inner: state.clone(),
        },
        CompletionWaiter { inner: state },
    )
}
