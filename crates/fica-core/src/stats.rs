//! Transfer statistics and throughput math
//!
//! Elapsed time is kept as a `Duration` from a monotonic clock and turned
//! into floating-point seconds only for rate calculations.

use std::time::{Duration, Instant};

const MB: f64 = 1024.0 * 1024.0;

/// Monotonic stopwatch started at construction
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed time in seconds
    #[inline]
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Items and bytes moved over some elapsed time
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct XferStats {
    pub items: u64,
    pub bytes: u64,
    pub elapsed: Duration,
}

impl XferStats {
    pub fn new(items: u64, bytes: u64, elapsed: Duration) -> Self {
        Self {
            items,
            bytes,
            elapsed,
        }
    }

    /// Items per second, 0 when no time has passed
    pub fn items_per_sec(&self) -> f64 {
        rate(self.items, self.elapsed)
    }

    /// Bytes per second, 0 when no time has passed
    pub fn bytes_per_sec(&self) -> f64 {
        rate(self.bytes, self.elapsed)
    }

    /// Throughput in MiB/s
    pub fn mbps(&self) -> f64 {
        self.bytes_per_sec() / MB
    }

    /// Fold another worker's numbers in.
    ///
    /// Workers run concurrently, so elapsed is the longest of the two, not
    /// the sum.
    pub fn merge(&mut self, other: &XferStats) {
        self.items += other.items;
        self.bytes += other.bytes;
        self.elapsed = self.elapsed.max(other.elapsed);
    }
}

#[inline]
fn rate(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}
