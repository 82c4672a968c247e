//! Lock-free multi-producer/single-consumer result channel.
//!
//! Worker threads push completed block results without ever blocking on
//! the consumer; the collector pops them from the other end. The queue is
//! an intrusive singly-linked list of heap nodes threaded through two
//! atomic pointers, `head` (oldest unconsumed) and `tail` (last pushed).
//! A mutex/condvar pair exists only so the consumer can block for a
//! bounded time when the queue is empty; producers never touch it on the
//! push fast path.
//!
//! Producer lifecycle is tracked through [`ResultProducer`] handles:
//! registration on creation, deregistration on drop. When the count hits
//! zero a blocked consumer is woken so it can observe "no producers and an
//! empty queue" as end-of-stream instead of waiting forever.
//!
//! # Safety
//!
//! `pop` is single-consumer only: two threads popping concurrently would
//! race on `head`. Pushes may come from any number of threads.

use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{BlockHashError, Result};

/// Default bound on how long an empty-queue pop blocks.
pub const DEFAULT_WAIT: Duration = Duration::from_millis(500);

/// Loads of `head` attempted before falling back to a blocking wait.
const SPIN_ATTEMPTS: usize = 8;

struct Node<T> {
    value: T,
    next: AtomicPtr<Node<T>>,
}

/// Lock-free MPSC queue with producer-liveness tracking.
pub struct ResultQueue<T> {
    head: AtomicPtr<Node<T>>,
    tail: AtomicPtr<Node<T>>,
    producer_count: AtomicUsize,
    closed: AtomicBool,
    lock: Mutex<()>,
    available: Condvar,
    default_wait: Duration,
}

// The raw node pointers are only ever handed between threads through the
// atomics above, with the single-consumer contract documented on `pop`.
unsafe impl<T: Send> Send for ResultQueue<T> {}
unsafe impl<T: Send> Sync for ResultQueue<T> {}

impl<T: Send> ResultQueue<T> {
    /// Create an empty queue with the default consumer wait bound.
    pub fn new() -> Self {
        Self::with_wait(DEFAULT_WAIT)
    }

    /// Create an empty queue with a custom consumer wait bound.
    pub fn with_wait(default_wait: Duration) -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            tail: AtomicPtr::new(ptr::null_mut()),
            producer_count: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            lock: Mutex::new(()),
            available: Condvar::new(),
            default_wait,
        }
    }

    /// Register a new producer handle.
    pub fn new_producer(self: &Arc<Self>) -> ResultProducer<T> {
        // Registration takes the lock so the consumer's "count then wait"
        // sequence cannot miss a registration.
        let _guard = self.guard();
        self.producer_count.fetch_add(1, Ordering::AcqRel);
        ResultProducer {
            queue: Arc::clone(self),
        }
    }

    /// Number of live producer handles.
    pub fn producer_count(&self) -> usize {
        self.producer_count.load(Ordering::Acquire)
    }

    /// `true` when no item is waiting.
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire).is_null()
    }

    /// Refuse all future pushes. Called by the consumer on abnormal
    /// teardown so a late producer fails fast instead of queueing into
    /// the void.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Pop the oldest item, blocking up to the default wait bound while
    /// producers remain alive and the queue is empty.
    ///
    /// Single consumer only.
    pub fn pop(&self) -> Option<T> {
        self.pop_timeout(self.default_wait)
    }

    /// Pop the oldest item, blocking at most `timeout` when the queue is
    /// empty but producers remain. Returns `None` immediately once the
    /// queue is empty and no producers are registered (end-of-stream).
    ///
    /// Single consumer only.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let head = self.wait_for_item(timeout);
        if head.is_null() {
            return None;
        }

        let tail = self.tail.load(Ordering::Acquire);
        if head != tail {
            self.head.store(self.next_of(head), Ordering::Release);
        } else if self
            .tail
            .compare_exchange(tail, ptr::null_mut(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            // Tail cleared; clear head too unless a racing push already
            // installed a new one (which is fine, the racer's node stays).
            let _ = self.head.compare_exchange(
                head,
                ptr::null_mut(),
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        } else {
            // A concurrent push swung the tail first, so the old tail has
            // (or is about to have) a successor linked behind it.
            self.head.store(self.next_of(head), Ordering::Release);
        }

        let node = unsafe { Box::from_raw(head) };
        Some(node.value)
    }

    /// Push an item. Producer-side, lock-free; fails only if the consumer
    /// closed the queue.
    fn push(&self, value: T) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BlockHashError::QueueClosed(
                "consumer is gone".to_string(),
            ));
        }

        let node = Box::into_raw(Box::new(Node {
            value,
            next: AtomicPtr::new(ptr::null_mut()),
        }));

        let mut old_tail = self.tail.load(Ordering::Relaxed);
        loop {
            match self.tail.compare_exchange_weak(
                old_tail,
                node,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(current) => old_tail = current,
            }
        }

        if old_tail.is_null() {
            // Queue was empty: this node is also the new head. Wake the
            // consumer if it is blocked on emptiness.
            self.head.store(node, Ordering::Release);
            let _guard = self.guard();
            self.available.notify_one();
        } else {
            unsafe { (*old_tail).next.store(node, Ordering::Release) };
        }

        Ok(())
    }

    /// Wait until `head` is non-null, producers are all gone, or the
    /// timeout elapses. Returns the observed head pointer (possibly null).
    fn wait_for_item(&self, timeout: Duration) -> *mut Node<T> {
        for _ in 0..SPIN_ATTEMPTS {
            let head = self.head.load(Ordering::Acquire);
            if !head.is_null() {
                return head;
            }
            std::hint::spin_loop();
        }

        let guard = self.guard();
        if self.producer_count.load(Ordering::Acquire) == 0 {
            return self.head.load(Ordering::Acquire);
        }
        if timeout.is_zero() {
            return self.head.load(Ordering::Acquire);
        }

        let result = self.available.wait_timeout_while(guard, timeout, |_| {
            self.head.load(Ordering::Acquire).is_null()
                && self.producer_count.load(Ordering::Acquire) != 0
        });
        drop(result.unwrap_or_else(|poisoned| poisoned.into_inner()));

        self.head.load(Ordering::Acquire)
    }

    /// Spin until the successor link of `node` becomes visible. Only
    /// called when the tail is known to have moved past `node`, so the
    /// pusher is guaranteed to link `next` imminently.
    fn next_of(&self, node: *mut Node<T>) -> *mut Node<T> {
        loop {
            let next = unsafe { (*node).next.load(Ordering::Acquire) };
            if !next.is_null() {
                return next;
            }
            std::hint::spin_loop();
        }
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // A poisoned lock only means another thread panicked while holding
        // it; the queue state itself lives in the atomics.
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn deregister_producer(&self) {
        let guard = self.guard();
        let remaining = self.producer_count.fetch_sub(1, Ordering::AcqRel);
        drop(guard);
        if remaining == 1 {
            // Last producer gone: wake the consumer so it can observe
            // end-of-stream instead of waiting out its timeout.
            self.available.notify_all();
        }
    }
}

impl<T: Send> Default for ResultQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for ResultQueue<T> {
    fn drop(&mut self) {
        // Free any nodes never popped.
        let mut node = *self.head.get_mut();
        while !node.is_null() {
            let boxed = unsafe { Box::from_raw(node) };
            node = boxed.next.load(Ordering::Relaxed);
        }
    }
}

/// Producer handle for a [`ResultQueue`].
///
/// Registers with the queue on creation and deregisters on drop; the
/// consumer uses the registration count to detect end-of-stream.
pub struct ResultProducer<T: Send> {
    queue: Arc<ResultQueue<T>>,
}

impl<T: Send> ResultProducer<T> {
    /// Push an item onto the queue. Never blocks on the consumer.
    pub fn push(&self, value: T) -> Result<()> {
        self.queue.push(value)
    }
}

impl<T: Send> Drop for ResultProducer<T> {
    fn drop(&mut self) {
        self.queue.deregister_producer();
    }
}
