//! Buffer mover
//!
//! Moves fixed-size buffers between a hardware channel and a pair of work
//! queues:
//!
//! ```text
//!   Read:   channel -> [free node] -> work queue
//!   Write:  work queue -> channel  -> free queue
//! ```
//!
//! Nodes are allocated once up front and cycle between `free` and `work`;
//! nothing is allocated on the data path. A `Transfer` is a step function:
//! hand it to a pool worker and it moves one buffer per iteration.

use fica_core::{HardwareChannel, HardwareError, HwResult, Step, StepResult, WorkQueue};
use fica_core::{fdebug, fwarn};

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Poll interval while waiting for the work queue to drain
const DRAIN_POLL: Duration = Duration::from_micros(100);

/// One preallocated buffer plus the length of valid data in it
#[derive(Debug)]
pub struct BufferNode {
    buf: Box<[u8]>,
    valid: usize,
}

impl BufferNode {
    pub fn new(size: usize) -> Self {
        Self {
            buf: vec![0u8; size].into_boxed_slice(),
            valid: 0,
        }
    }

    /// Valid bytes
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.buf[..self.valid]
    }

    /// Whole buffer, for filling
    #[inline]
    pub fn buf_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Mark the first `len` bytes valid (clamped to the buffer size)
    #[inline]
    pub fn set_valid(&mut self, len: usize) {
        self.valid = len.min(self.buf.len());
    }

    #[inline]
    pub fn valid(&self) -> usize {
        self.valid
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }
}

/// Free and work queues sharing one node pool
#[derive(Debug)]
pub struct BufferQueues {
    free: WorkQueue<BufferNode>,
    work: WorkQueue<BufferNode>,
    buf_size: usize,
}

impl BufferQueues {
    /// `count` nodes of `size` bytes, all on the free queue
    pub fn new(count: usize, size: usize) -> Self {
        let free = WorkQueue::with_capacity_hint(count);
        for _ in 0..count {
            // Unbounded queue: never full
            let _ = free.enqueue(BufferNode::new(size));
        }
        Self {
            free,
            work: WorkQueue::with_capacity_hint(count),
            buf_size: size,
        }
    }

    #[inline]
    pub fn free(&self) -> &WorkQueue<BufferNode> {
        &self.free
    }

    #[inline]
    pub fn work(&self) -> &WorkQueue<BufferNode> {
        &self.work
    }

    #[inline]
    pub fn buf_size(&self) -> usize {
        self.buf_size
    }

    /// Return a node to the free queue
    pub fn recycle(&self, mut node: BufferNode) {
        node.valid = 0;
        let _ = self.free.enqueue(node);
    }

    /// Queue a filled node for the other side
    pub fn submit(&self, node: BufferNode) {
        let _ = self.work.enqueue(node);
    }

    /// Wait until the work queue is empty.
    ///
    /// Returns false if `timeout` passed first.
    pub fn wait_work_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.work.is_empty() {
            if Instant::now() >= deadline {
                fwarn!("work queue still holds {} buffers", self.work.size());
                return false;
            }
            thread::sleep(DRAIN_POLL);
        }
        true
    }
}

/// Which way a `Transfer` moves data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Channel into the work queue
    Read,
    /// Work queue out to the channel
    Write,
}

/// One direction of buffer movement over one channel
pub struct Transfer<C: HardwareChannel> {
    channel: C,
    queues: Arc<BufferQueues>,
    direction: Direction,
    /// Stop after this many bytes
    limit: Option<u64>,
    moved: u64,
    /// Node the channel had no room for, retried first
    held: Option<BufferNode>,
}

impl<C: HardwareChannel> Transfer<C> {
    pub fn new(channel: C, queues: Arc<BufferQueues>, direction: Direction) -> Self {
        Self {
            channel,
            queues,
            direction,
            limit: None,
            moved: 0,
            held: None,
        }
    }

    /// Finish with `Step::Done` once `bytes` have moved
    pub fn limit(mut self, bytes: u64) -> Self {
        self.limit = Some(bytes);
        self
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Bytes moved so far
    #[inline]
    pub fn moved(&self) -> u64 {
        self.moved
    }

    fn remaining(&self) -> Option<u64> {
        self.limit.map(|l| l.saturating_sub(self.moved))
    }

    /// Move at most one buffer
    pub fn step(&mut self) -> StepResult {
        if self.remaining() == Some(0) {
            fdebug!("{:?} transfer done after {} bytes", self.direction, self.moved);
            return Ok(Step::Done);
        }
        match self.direction {
            Direction::Read => self.read_one(),
            Direction::Write => self.write_one(),
        }
    }

    fn read_one(&mut self) -> StepResult {
        let mut node = match self.queues.free.dequeue() {
            Some(node) => node,
            None => return Ok(Step::Idle),
        };

        let want = match self.remaining() {
            Some(rem) => (rem.min(node.capacity() as u64)) as usize,
            None => node.capacity(),
        };
        let n = match self.channel.read(&mut node.buf[..want]) {
            Ok(n) => n,
            Err(e) => {
                self.queues.recycle(node);
                return Err(e);
            }
        };
        if n == 0 {
            self.queues.recycle(node);
            return Ok(Step::Idle);
        }

        node.set_valid(n);
        self.queues.submit(node);
        self.moved += n as u64;
        Ok(Step::bytes(n as u64))
    }

    fn write_one(&mut self) -> StepResult {
        let node = match self.held.take().or_else(|| self.queues.work.dequeue()) {
            Some(node) => node,
            None => return Ok(Step::Idle),
        };

        let requested = node.valid();
        let n = match self.channel.write(node.data()) {
            Ok(n) => n,
            Err(e) => {
                self.queues.recycle(node);
                return Err(e);
            }
        };
        if n == 0 && requested > 0 {
            // No room; keep the node so order is preserved
            self.held = Some(node);
            return Ok(Step::Idle);
        }

        self.queues.recycle(node);
        if n < requested {
            return Err(HardwareError::ShortTransfer {
                requested,
                transferred: n,
            });
        }
        self.moved += n as u64;
        Ok(Step::bytes(n as u64))
    }

    /// Close the channel and hand back any held node
    pub fn close(mut self) -> HwResult<()> {
        if let Some(node) = self.held.take() {
            self.queues.recycle(node);
        }
        self.channel.close()
    }
}
