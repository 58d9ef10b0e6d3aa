//! # fica - pinned worker pool over a shared work queue
//!
//! A mutex-protected FIFO work queue plus a pool of OS threads, each
//! optionally pinned to one CPU core, each calling a step function in a
//! loop until its budget (pass count and/or deadline) runs out.
//!
//! ## Quick Start
//!
//! ```ignore
//! use fica::{run, PoolConfig, PoolReport, Step, WorkQueue};
//! use std::sync::Arc;
//!
//! fn main() {
//!     let config = PoolConfig::from_env().num_workers(2).passes(1000);
//!     let queue = Arc::new(WorkQueue::new());
//!
//!     for i in 0..1000u32 {
//!         queue.enqueue(i).unwrap();
//!     }
//!
//!     let q = Arc::clone(&queue);
//!     let results = run(&config, move |_ctx| match q.dequeue() {
//!         Some(_item) => Ok(Step::item()),
//!         None => Ok(Step::Done),
//!     })
//!     .unwrap();
//!
//!     println!("{}", PoolReport::from_results(&results));
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                       User Code                            │
//! │             step(ctx) -> Processed / Idle / Done           │
//! └────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌────────────────────────────────────────────────────────────┐
//! │                      WorkerPool                            │
//! │      validate, spawn, bind, budget loop, join in order     │
//! └────────────────────────────────────────────────────────────┘
//!          │                   │                   │
//!          ▼                   ▼                   ▼
//!    ┌───────────┐      ┌───────────┐      ┌───────────┐
//!    │ Worker 0  │      │ Worker 1  │      │ Worker N  │
//!    │  core c0  │      │  core c1  │      │  core cN  │
//!    └───────────┘      └───────────┘      └───────────┘
//!          │                   │                   │
//!          └───────────────────┼───────────────────┘
//!                              ▼
//!    ┌────────────────────────────────────────────────────────┐
//!    │        WorkQueue<T>  /  HardwareChannel (SRIO, ...)    │
//!    └────────────────────────────────────────────────────────┘
//! ```

// Re-export core types
pub use fica_core::{
    AffinityError, Budget, ChannelProvider, ConfigError, ExitStatus, HardwareChannel,
    HardwareError, HwResult, IdlePolicy, PoolError, PoolReport, PoolResult, QueueFull, Step,
    StepResult, StopToken, WorkQueue, WorkerDescriptor, WorkerResult, WorkerState, XferStats,
};
pub use fica_core::pattern;

// Re-export logging macros
pub use fica_core::{fdebug, ferror, finfo, fprintln, ftrace, fwarn};
pub use fica_core::log::{init as init_logging, set_flush_enabled, set_log_level, LogLevel};

// Re-export env utilities
pub use fica_core::{env_get, env_get_bool, env_get_list, env_get_opt};

// Re-export runtime types
pub use fica_runtime::{
    allowed_cores, available_core_count, bind_current_thread, BufferNode, BufferQueues,
    Direction, LoopbackChannel, LoopbackDevice, PoolConfig, Transfer, WorkerContext, WorkerPool,
};

/// Run a pool described by `config` to completion.
///
/// Validates `config` against the machine, starts one worker per
/// descriptor with the shared `step`, and waits for all of them.
/// Results come back in worker-index order.
pub fn run<F>(config: &PoolConfig, step: F) -> PoolResult<Vec<WorkerResult>>
where
    F: Fn(&mut WorkerContext) -> StepResult + Send + Sync + 'static,
{
    config.validate(available_core_count())?;
    let pool = WorkerPool::start(config.descriptors(), step)?;
    Ok(pool.join_all())
}

/// Like `run`, with a per-worker step built by `factory`.
pub fn run_with<M, S>(config: &PoolConfig, factory: M) -> PoolResult<Vec<WorkerResult>>
where
    M: FnMut(&WorkerDescriptor) -> S,
    S: FnMut(&mut WorkerContext) -> StepResult + Send + 'static,
{
    config.validate(available_core_count())?;
    let pool = WorkerPool::start_with(config.descriptors(), factory)?;
    Ok(pool.join_all())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_run_drains_queue() {
        let config = PoolConfig::new()
            .num_workers(available_core_count().min(4))
            .deadline(Some(std::time::Duration::from_secs(10)));
        let queue = Arc::new(WorkQueue::new());
        for i in 0..5_000u64 {
            queue.enqueue(i).unwrap();
        }
        let sum = Arc::new(AtomicU64::new(0));

        let q = Arc::clone(&queue);
        let s = Arc::clone(&sum);
        let results = run(&config, move |_| match q.dequeue() {
            Some(v) => {
                s.fetch_add(v, Ordering::Relaxed);
                Ok(Step::item())
            }
            None => Ok(Step::Done),
        })
        .unwrap();

        let report = PoolReport::from_results(&results);
        assert!(report.all_succeeded());
        assert_eq!(report.total.items, 5_000);
        assert_eq!(sum.load(Ordering::Relaxed), (0..5_000u64).sum::<u64>());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_run_rejects_bad_config() {
        let config = PoolConfig::new().num_workers(available_core_count() + 1);
        let err = run(&config, |_| Ok(Step::item())).unwrap_err();
        assert!(matches!(err, PoolError::Config(ConfigError::WorkerCount { .. })));
    }

    #[test]
    fn test_run_with_per_worker_steps() {
        let config = PoolConfig::new()
            .num_workers(available_core_count().min(3))
            .passes(10)
            .deadline(None);
        let results = run_with(&config, |desc| {
            let extra = desc.index as u64;
            move |_ctx: &mut WorkerContext| Ok(Step::bytes(extra))
        })
        .unwrap();

        for r in &results {
            assert_eq!(r.items, 10);
            assert_eq!(r.bytes, 10 * r.index as u64);
        }
    }
}
