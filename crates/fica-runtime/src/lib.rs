//! # fica-runtime
//!
//! Platform-specific half of fica.
//!
//! This crate provides:
//! - CPU affinity (`sched_setaffinity` on Linux, `Unsupported` elsewhere)
//! - Pool configuration with environment overrides
//! - The worker pool: one pinned OS thread per descriptor
//! - The buffer mover (free/work queues plus a channel transfer step)
//! - An in-memory loopback device implementing the channel traits

pub mod affinity;
pub mod config;
pub mod pool;
pub mod mover;
pub mod loopback;

// Re-exports
pub use affinity::{allowed_cores, available_core_count, bind_current_thread};
pub use config::PoolConfig;
pub use pool::{WorkerContext, WorkerPool};
pub use mover::{BufferNode, BufferQueues, Direction, Transfer};
pub use loopback::{LoopbackChannel, LoopbackDevice};
