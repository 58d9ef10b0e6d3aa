//! Library defaults for `PoolConfig`

/// Upper bound on the default worker count (still capped by online cores)
pub const NUM_WORKERS: usize = 8;

/// Pin workers to cores
pub const BIND: bool = false;

/// First core when cores are assigned as `core_base + index`
pub const CORE_BASE: usize = 0;

/// Iteration limit per worker, 0 = unlimited
pub const PASSES: u64 = 0;

/// Wall-clock limit per worker in milliseconds, 0 = none
pub const DEADLINE_MS: u64 = 10_000;

/// Work queue bound, 0 = unbounded
pub const QUEUE_CAPACITY: usize = 0;

/// Spin rounds after an idle step before sleeping
pub const IDLE_SPINS: u32 = 64;

/// Longest idle sleep in microseconds
pub const PARK_TIMEOUT_US: u64 = 100;
