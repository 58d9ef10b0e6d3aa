//! Thread-safe FIFO work queue
//!
//! Design:
//! - One `Mutex<VecDeque<T>>` per queue, every mutation under that lock
//! - Mirrored length (`AtomicUsize`) so an empty non-blocking dequeue
//!   can return without touching the lock
//! - Two condvars: `not_empty` for blocking consumers, `not_full` for
//!   blocking producers on a bounded queue
//! - Unbounded by default; `bounded(n)` rejects with `QueueFull`
//!
//! The lock only ever covers the deque and the length mirror. No caller
//! code runs while it is held.

use crate::error::QueueFull;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Multi-producer, multi-consumer FIFO of work items.
///
/// Items are stored by value. The queue owns only its node storage; any
/// payload the item points at stays with whichever side owns it.
///
/// # Example
///
/// ```
/// use fica_core::WorkQueue;
///
/// let q = WorkQueue::new();
/// q.enqueue("a").unwrap();
/// q.enqueue("b").unwrap();
/// assert_eq!(q.size(), 2);
/// assert_eq!(q.dequeue(), Some("a"));
/// assert_eq!(q.dequeue(), Some("b"));
/// assert_eq!(q.dequeue(), None);
/// ```
pub struct WorkQueue<T> {
    items: Mutex<VecDeque<T>>,
    /// Written under `items` lock, read lock-free as an emptiness hint
    len: AtomicUsize,
    /// `None` = unbounded
    capacity: Option<usize>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> WorkQueue<T> {
    /// Create an unbounded queue
    pub fn new() -> Self {
        Self::build(None, 0)
    }

    /// Create an unbounded queue with preallocated node storage
    pub fn with_capacity_hint(hint: usize) -> Self {
        Self::build(None, hint)
    }

    /// Create a queue holding at most `capacity` items.
    ///
    /// `capacity` must be > 0; a zero capacity is treated as 1.
    pub fn bounded(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self::build(Some(capacity), capacity)
    }

    fn build(capacity: Option<usize>, prealloc: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(prealloc)),
            len: AtomicUsize::new(0),
            capacity,
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Item storage. A panic elsewhere never leaves the deque half-updated,
    /// so a poisoned lock is still safe to use.
    #[inline]
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn is_full(&self, q: &VecDeque<T>) -> bool {
        matches!(self.capacity, Some(cap) if q.len() >= cap)
    }

    /// Append at the tail.
    ///
    /// Always succeeds on an unbounded queue. On a full bounded queue the
    /// item comes back inside `QueueFull`.
    pub fn enqueue(&self, item: T) -> Result<(), QueueFull<T>> {
        {
            let mut q = self.lock();
            if self.is_full(&q) {
                return Err(QueueFull(item));
            }
            q.push_back(item);
            self.len.store(q.len(), Ordering::Release);
        }
        self.not_empty.notify_one();
        Ok(())
    }

    /// Append at the tail, waiting up to `timeout` for room on a bounded queue.
    pub fn enqueue_blocking(&self, item: T, timeout: Duration) -> Result<(), QueueFull<T>> {
        let deadline = Instant::now().checked_add(timeout);
        let mut q = self.lock();
        while self.is_full(&q) {
            q = match wait_step(&self.not_full, q, deadline) {
                Some(guard) => guard,
                None => return Err(QueueFull(item)),
            };
        }
        q.push_back(item);
        self.len.store(q.len(), Ordering::Release);
        drop(q);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove and return the head item, or `None` if the queue is empty.
    ///
    /// Never blocks. An empty queue is left untouched.
    pub fn dequeue(&self) -> Option<T> {
        if self.len.load(Ordering::Acquire) == 0 {
            return None;
        }
        let item = {
            let mut q = self.lock();
            let item = q.pop_front();
            self.len.store(q.len(), Ordering::Release);
            item
        };
        if item.is_some() && self.capacity.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Remove and return the head item, waiting up to `timeout` for one.
    ///
    /// Returns `None` on timeout.
    pub fn dequeue_blocking(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now().checked_add(timeout);
        let mut q = self.lock();
        loop {
            if let Some(item) = q.pop_front() {
                self.len.store(q.len(), Ordering::Release);
                drop(q);
                if self.capacity.is_some() {
                    self.not_full.notify_one();
                }
                return Some(item);
            }
            q = wait_step(&self.not_empty, q, deadline)?;
        }
    }

    /// Number of queued items.
    ///
    /// Taken under the lock, but only advisory: it may be stale by the
    /// time the caller acts on it.
    pub fn size(&self) -> usize {
        self.lock().len()
    }

    /// Check if empty (advisory, like `size`)
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Maximum item count, `None` when unbounded
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Remove every queued item, head first
    pub fn drain(&self) -> Vec<T> {
        let drained: Vec<T> = {
            let mut q = self.lock();
            let drained = q.drain(..).collect();
            self.len.store(0, Ordering::Release);
            drained
        };
        if !drained.is_empty() && self.capacity.is_some() {
            self.not_full.notify_all();
        }
        drained
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for WorkQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("len", &self.len.load(Ordering::Relaxed))
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Wait once on `cond`. Returns `None` once `deadline` has passed.
fn wait_step<'a, T>(
    cond: &Condvar,
    guard: MutexGuard<'a, VecDeque<T>>,
    deadline: Option<Instant>,
) -> Option<MutexGuard<'a, VecDeque<T>>> {
    match deadline {
        None => Some(cond.wait(guard).unwrap_or_else(PoisonError::into_inner)),
        Some(deadline) => {
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _) = cond
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            Some(guard)
        }
    }
}
