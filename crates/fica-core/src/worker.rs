//! Worker descriptors, step outcomes and results
//!
//! These are the platform-agnostic halves of the worker pool: what a worker
//! is asked to do (`WorkerDescriptor`), what one step reports (`Step`), and
//! what comes back after join (`WorkerResult`, `PoolReport`).

use core::fmt;
use std::time::Duration;

use crate::backoff::IdlePolicy;
use crate::budget::Budget;
use crate::error::HardwareError;
use crate::state::{ExitStatus, WorkerState};
use crate::stats::XferStats;

/// Per-worker configuration, consumed by the worker's own thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerDescriptor {
    /// Position in `join_all()` output
    pub index: usize,
    /// Logical core to pin to, `None` = unbound
    pub core: Option<usize>,
    /// When the loop ends
    pub budget: Budget,
    /// What to do after an idle step
    pub idle: IdlePolicy,
}

impl WorkerDescriptor {
    /// Unbound worker that runs until stopped
    pub fn new(index: usize) -> Self {
        Self {
            index,
            core: None,
            budget: Budget::forever(),
            idle: IdlePolicy::default(),
        }
    }

    pub fn core(mut self, core: usize) -> Self {
        self.core = Some(core);
        self
    }

    pub fn budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    pub fn idle(mut self, idle: IdlePolicy) -> Self {
        self.idle = idle;
        self
    }
}

/// Outcome of one successful step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// One work item handled, `bytes` moved (0 if not a transfer)
    Processed { bytes: u64 },
    /// Nothing to do this time; the pool backs off before the next call
    Idle,
    /// Source exhausted; end the loop successfully
    Done,
}

impl Step {
    /// One item, no byte count
    #[inline]
    pub const fn item() -> Self {
        Step::Processed { bytes: 0 }
    }

    /// One item of `bytes` bytes
    #[inline]
    pub const fn bytes(bytes: u64) -> Self {
        Step::Processed { bytes }
    }
}

/// What a step function returns
pub type StepResult = Result<Step, HardwareError>;

/// Outcome of one worker, produced once at thread exit
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerResult {
    pub index: usize,
    pub core: Option<usize>,
    /// `Completed` or `Failed`
    pub state: WorkerState,
    pub status: ExitStatus,
    /// Step calls made (including idle ones)
    pub iterations: u64,
    /// Steps that returned `Processed`
    pub items: u64,
    pub bytes: u64,
    /// Time spent in the loop (zero if binding failed)
    pub elapsed: Duration,
}

impl WorkerResult {
    /// Result for a worker that never entered its loop
    pub fn not_started(index: usize, core: Option<usize>, status: ExitStatus) -> Self {
        Self {
            index,
            core,
            state: status.final_state(),
            status,
            iterations: 0,
            items: 0,
            bytes: 0,
            elapsed: Duration::ZERO,
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.state == WorkerState::Completed
    }

    pub fn stats(&self) -> XferStats {
        XferStats::new(self.items, self.bytes, self.elapsed)
    }

    /// Items per second
    pub fn throughput(&self) -> f64 {
        self.stats().items_per_sec()
    }
}

impl fmt::Display for WorkerResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        write!(f, "worker#{} ", self.index)?;
        match self.core {
            Some(core) => write!(f, "core={} ", core)?,
            None => write!(f, "core=- ")?,
        }
        write!(
            f,
            "{} ({}) time={:.3}s items={} bytes={} rate={:.0}/s spd={:.3} MBPS",
            self.state,
            self.status,
            self.elapsed.as_secs_f64(),
            self.items,
            self.bytes,
            stats.items_per_sec(),
            stats.mbps()
        )
    }
}

/// Aggregate over all workers of a pool
#[derive(Debug, Clone, PartialEq)]
pub struct PoolReport {
    pub workers: usize,
    pub failed: usize,
    /// Summed items/bytes, longest elapsed
    pub total: XferStats,
}

impl PoolReport {
    pub fn from_results(results: &[WorkerResult]) -> Self {
        let mut total = XferStats::default();
        for r in results {
            total.merge(&r.stats());
        }
        Self {
            workers: results.len(),
            failed: results.iter().filter(|r| !r.is_success()).count(),
            total,
        }
    }

    #[inline]
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for PoolReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} workers, {} failed, time={:.3}s items={} bytes={} rate={:.0}/s spd={:.3} MBPS",
            self.workers,
            self.failed,
            self.total.elapsed.as_secs_f64(),
            self.total.items,
            self.total.bytes,
            self.total.items_per_sec(),
            self.total.mbps()
        )
    }
}
