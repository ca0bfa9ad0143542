//! Task queue boundary for asynchronous slot delivery.
//!
//! Signals do not own an event loop. Asynchronous delivery goes through the
//! [`TaskQueue`] trait, injected at signal construction via
//! [`Signal::with_queue`]. Any event loop that can accept a unit of work,
//! guarantee its eventual single execution on one owning thread, and report
//! that thread's identity can back a signal.
//!
//! [`WorkerQueue`] is the built-in implementation: a dedicated thread draining
//! a channel in FIFO order. It is sufficient for applications without a
//! framework event loop, and for deterministic tests.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use signalkit::{Signal, WorkerQueue};
//!
//! let queue = Arc::new(WorkerQueue::new());
//! let signal = Signal::<i32>::with_queue(queue.clone());
//!
//! signal.connect(|n| {
//!     let _ = n;
//! });
//! signal.emit(42);
//!
//! queue.stop_and_join();
//! ```
//!
//! [`Signal::with_queue`]: crate::Signal::with_queue

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;

use crate::invocation::QueuedInvocation;
use crate::logging::{panic_message, targets};

/// The external task queue a signal delivers asynchronous work through.
///
/// Implementations must guarantee that every submitted invocation is executed
/// exactly once, on the thread identified by [`home_thread`](Self::home_thread).
/// Signals use the home thread identity to resolve the `Auto` delivery policy:
/// emitting from the home thread invokes directly, emitting from any other
/// thread queues.
pub trait TaskQueue: Send + Sync {
    /// Submit a unit of work for eventual execution on the home thread.
    ///
    /// Fire-and-forget: the queue decides when the work runs, but it must run
    /// exactly once. Implementations should not silently drop work.
    fn submit(&self, invocation: QueuedInvocation);

    /// The identity of the thread that executes submitted work.
    fn home_thread(&self) -> ThreadId;
}

/// Configuration for creating a [`WorkerQueue`].
#[derive(Debug, Clone)]
pub struct WorkerQueueConfig {
    /// Name for the queue thread.
    pub name: String,
    /// Stack size for the queue thread in bytes. `None` uses the default.
    pub stack_size: Option<usize>,
}

impl Default for WorkerQueueConfig {
    fn default() -> Self {
        Self {
            name: "signalkit-queue".to_string(),
            stack_size: None,
        }
    }
}

impl WorkerQueueConfig {
    /// Create a new configuration with the given thread name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A [`TaskQueue`] backed by one dedicated thread.
///
/// Invocations are executed sequentially in submission order. A panicking
/// invocation is caught and reported via `tracing::error!`; the queue thread
/// survives and continues with the next invocation.
///
/// # Shutdown
///
/// [`stop`](Self::stop) drops the channel sender, which is what shuts the
/// thread down: the thread keeps draining until the channel is both
/// disconnected and empty, so every invocation whose submit succeeded still
/// runs. A submit that arrives after the stop executes the invocation inline
/// on the submitting thread (with a warning) rather than dropping it. There
/// is no window in which an accepted invocation can be lost. Dropping the
/// queue handle requests a stop without blocking.
///
/// # Thread Safety
///
/// `WorkerQueue` is `Send + Sync`; multiple threads may submit concurrently.
pub struct WorkerQueue {
    /// `None` after stop; the sender drop is what disconnects the channel.
    sender: Mutex<Option<Sender<QueuedInvocation>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    pending: Arc<AtomicUsize>,
    home: ThreadId,
}

impl WorkerQueue {
    /// Create a queue with default configuration. The thread starts
    /// immediately.
    pub fn new() -> Self {
        Self::with_config(WorkerQueueConfig::default())
    }

    /// Create a queue with custom configuration.
    pub fn with_config(config: WorkerQueueConfig) -> Self {
        let (sender, receiver) = unbounded();
        let pending = Arc::new(AtomicUsize::new(0));

        let mut builder = thread::Builder::new().name(config.name);
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let thread_pending = pending.clone();
        let handle = builder
            .spawn(move || queue_loop(receiver, thread_pending))
            .expect("failed to spawn task queue thread");
        let home = handle.thread().id();

        Self {
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
            pending,
            home,
        }
    }

    /// Check whether the queue is accepting work.
    pub fn is_running(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Number of submitted invocations that have not finished executing.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Request shutdown after all previously submitted work has run.
    ///
    /// Non-blocking; use [`join`](Self::join) to wait for the thread to exit.
    pub fn stop(&self) {
        // Dropping the only sender disconnects the channel; the thread exits
        // once it has drained what was already accepted.
        self.sender.lock().take();
    }

    /// Wait for the queue thread to finish.
    ///
    /// Returns `true` if the thread was joined, `false` if it was already
    /// joined or panicked. Call [`stop`](Self::stop) first.
    pub fn join(&self) -> bool {
        let mut handle = self.handle.lock();
        if let Some(h) = handle.take() {
            h.join().is_ok()
        } else {
            false
        }
    }

    /// Stop the queue and wait for it to finish.
    pub fn stop_and_join(&self) -> bool {
        self.stop();
        self.join()
    }
}

impl Default for WorkerQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WorkerQueue {
    fn drop(&mut self) {
        // Don't block in drop, just request shutdown.
        self.stop();
    }
}

impl TaskQueue for WorkerQueue {
    fn submit(&self, invocation: QueuedInvocation) {
        let sender = self.sender.lock();
        match sender.as_ref() {
            Some(sender) => {
                self.pending.fetch_add(1, Ordering::AcqRel);
                // Cannot fail while a sender is alive; the thread drops the
                // receiver only after the channel disconnects.
                if let Err(err) = sender.send(invocation) {
                    self.pending.fetch_sub(1, Ordering::AcqRel);
                    tracing::warn!(
                        target: targets::QUEUE,
                        "queue thread gone, executing invocation inline"
                    );
                    err.0.execute();
                }
            }
            None => {
                drop(sender);
                tracing::warn!(
                    target: targets::QUEUE,
                    "submit after stop, executing invocation inline"
                );
                invocation.execute();
            }
        }
    }

    fn home_thread(&self) -> ThreadId {
        self.home
    }
}

fn run_one(invocation: QueuedInvocation, pending: &AtomicUsize) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(move || invocation.execute())) {
        tracing::error!(
            target: targets::QUEUE,
            "queued slot panicked: {}",
            panic_message(payload.as_ref())
        );
    }
    pending.fetch_sub(1, Ordering::AcqRel);
}

fn queue_loop(receiver: Receiver<QueuedInvocation>, pending: Arc<AtomicUsize>) {
    // `recv` keeps returning buffered invocations after the sender drops and
    // errors only once the channel is empty, so shutdown drains everything.
    while let Ok(invocation) = receiver.recv() {
        run_one(invocation, &pending);
    }
}

static_assertions::assert_impl_all!(WorkerQueue: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    fn wait_until(condition: impl Fn() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("condition not reached within 2s");
    }

    #[test]
    fn test_queue_creation() {
        let queue = WorkerQueue::new();
        assert!(queue.is_running());
        assert_eq!(queue.pending(), 0);
        queue.stop_and_join();
    }

    #[test]
    fn test_executes_on_home_thread() {
        let queue = WorkerQueue::with_config(WorkerQueueConfig::with_name("home-test"));
        let observed = Arc::new(Mutex::new(None));

        let observed_clone = observed.clone();
        queue.submit(QueuedInvocation::new(move || {
            *observed_clone.lock() = Some(thread::current().id());
        }));

        wait_until(|| observed.lock().is_some());
        assert_eq!(*observed.lock(), Some(queue.home_thread()));

        queue.stop_and_join();
    }

    #[test]
    fn test_sequential_fifo_order() {
        let queue = WorkerQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let order_clone = order.clone();
            queue.submit(QueuedInvocation::new(move || {
                order_clone.lock().push(i);
            }));
        }

        wait_until(|| queue.pending() == 0);
        assert_eq!(*order.lock(), (0..10).collect::<Vec<_>>());

        queue.stop_and_join();
    }

    #[test]
    fn test_panic_does_not_kill_queue() {
        let queue = WorkerQueue::new();
        let ran = Arc::new(AtomicBool::new(false));

        queue.submit(QueuedInvocation::new(|| panic!("bad slot")));

        let ran_clone = ran.clone();
        queue.submit(QueuedInvocation::new(move || {
            ran_clone.store(true, Ordering::SeqCst);
        }));

        wait_until(|| ran.load(Ordering::SeqCst));
        queue.stop_and_join();
    }

    #[test]
    fn test_stop_drains_pending_work() {
        let queue = WorkerQueue::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let counter_clone = counter.clone();
            queue.submit(QueuedInvocation::new(move || {
                thread::sleep(Duration::from_millis(5));
                counter_clone.fetch_add(1, Ordering::SeqCst);
            }));
        }

        queue.stop_and_join();
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_submit_after_stop_runs_inline() {
        let queue = WorkerQueue::new();
        queue.stop_and_join();

        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();
        queue.submit(QueuedInvocation::new(move || {
            ran_clone.store(true, Ordering::SeqCst);
        }));

        // Inline fallback, so the work has already run.
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_stop_racing_submits_lose_nothing() {
        // Submits race against stop: each one must either be accepted and
        // drained before the thread exits, or run inline after the stop.
        for _ in 0..20 {
            let queue = Arc::new(WorkerQueue::new());
            let counter = Arc::new(AtomicUsize::new(0));

            let q = queue.clone();
            let c = counter.clone();
            let submitter = thread::spawn(move || {
                for _ in 0..100 {
                    let c2 = c.clone();
                    q.submit(QueuedInvocation::new(move || {
                        c2.fetch_add(1, Ordering::SeqCst);
                    }));
                }
            });

            queue.stop_and_join();
            submitter.join().unwrap();
            assert_eq!(counter.load(Ordering::SeqCst), 100);
        }
    }

    #[test]
    fn test_concurrent_submitters() {
        let queue = Arc::new(WorkerQueue::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let mut handles = vec![];
        for _ in 0..5 {
            let q = queue.clone();
            let c = counter.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..20 {
                    let c2 = c.clone();
                    q.submit(QueuedInvocation::new(move || {
                        c2.fetch_add(1, Ordering::SeqCst);
                    }));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        wait_until(|| counter.load(Ordering::SeqCst) == 100);
        queue.stop_and_join();
    }
}
