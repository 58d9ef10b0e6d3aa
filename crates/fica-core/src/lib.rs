//! # fica-core
//!
//! Core types and traits for fica: a mutex-protected work queue and the
//! platform-agnostic half of a CPU-pinned worker pool.
//!
//! This crate contains no OS-specific code. Affinity, the thread pool
//! itself and the buffer mover live in `fica-runtime`.
//!
//! ## Modules
//!
//! - `queue` - thread-safe FIFO `WorkQueue`, bounded or unbounded
//! - `worker` - worker descriptors, step outcomes, per-worker results
//! - `state` - worker lifecycle state and exit status
//! - `budget` - pass count / deadline budget
//! - `stop` - cooperative stop token
//! - `backoff` - idle backoff for polling loops
//! - `stats` - stopwatch and throughput math
//! - `channel` - hardware channel traits
//! - `pattern` - incrementing data pattern for integrity checks
//! - `error` - error types
//! - `log` - leveled stderr logging macros
//! - `env` - environment variable helpers

pub mod queue;
pub mod worker;
pub mod state;
pub mod budget;
pub mod stop;
pub mod backoff;
pub mod stats;
pub mod channel;
pub mod pattern;
pub mod error;
pub mod log;
pub mod env;

// Re-exports for convenience
pub use queue::WorkQueue;
pub use worker::{PoolReport, Step, StepResult, WorkerDescriptor, WorkerResult};
pub use state::{ExitStatus, WorkerState};
pub use budget::Budget;
pub use stop::StopToken;
pub use backoff::{Backoff, IdlePolicy};
pub use stats::{Stopwatch, XferStats};
pub use channel::{ChannelProvider, HardwareChannel};
pub use error::{
    AffinityError, ConfigError, HardwareError, HwResult, PoolError, PoolResult, QueueFull,
};
pub use env::{env_get, env_get_bool, env_get_list, env_get_opt};
