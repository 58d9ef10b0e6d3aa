//! Pool configuration
//!
//! Provides library defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder calls
//! 2. Environment variables (`from_env()`)
//! 3. Library defaults (`config::defaults`)
//!
//! # Example
//!
//! ```rust,ignore
//! use fica_runtime::config::PoolConfig;
//!
//! let config = PoolConfig::from_env()
//!     .num_workers(4)
//!     .bind(true)
//!     .deadline(Some(Duration::from_secs(2)));
//! config.validate(available_core_count())?;
//! let descriptors = config.descriptors();
//! ```

pub mod defaults;

use std::time::Duration;

use fica_core::env::{env_get, env_get_bool, env_get_list};
use fica_core::{Budget, ConfigError, IdlePolicy, WorkQueue, WorkerDescriptor};

/// Template the pool expands into one `WorkerDescriptor` per worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of worker threads
    pub num_workers: usize,
    /// Pin each worker to a core
    pub bind: bool,
    /// Explicit core per worker (index order); overrides `core_base`
    pub cores: Option<Vec<usize>>,
    /// Worker `i` binds to `core_base + i` when `cores` is unset
    pub core_base: usize,
    /// Iteration limit per worker, 0 = unlimited
    pub passes: u64,
    /// Wall-clock limit per worker
    pub deadline: Option<Duration>,
    /// Bound for queues built with `new_queue`, 0 = unbounded
    pub queue_capacity: usize,
    /// Spin rounds after an idle step before sleeping
    pub idle_spins: u32,
    /// Longest idle sleep
    pub park_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl PoolConfig {
    /// Library defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `FICA_NUM_WORKERS` - number of worker threads
    /// - `FICA_BIND` - pin workers to cores (0/1)
    /// - `FICA_CORES` - explicit core list, e.g. `0,2,4`
    /// - `FICA_CORE_BASE` - first core for `core_base + index`
    /// - `FICA_PASSES` - iterations per worker (0 = unlimited)
    /// - `FICA_DEADLINE_MS` - run time per worker (0 = none)
    /// - `FICA_QUEUE_CAPACITY` - queue bound (0 = unbounded)
    /// - `FICA_IDLE_SPINS` - spins before idle sleep
    /// - `FICA_PARK_TIMEOUT_US` - longest idle sleep in microseconds
    pub fn from_env() -> Self {
        let base = Self::new();
        let deadline_ms = env_get(
            "FICA_DEADLINE_MS",
            base.deadline.map(|d| d.as_millis() as u64).unwrap_or(0),
        );
        Self {
            num_workers: env_get("FICA_NUM_WORKERS", base.num_workers),
            bind: env_get_bool("FICA_BIND", base.bind),
            cores: env_get_list("FICA_CORES"),
            core_base: env_get("FICA_CORE_BASE", base.core_base),
            passes: env_get("FICA_PASSES", base.passes),
            deadline: (deadline_ms > 0).then(|| Duration::from_millis(deadline_ms)),
            queue_capacity: env_get("FICA_QUEUE_CAPACITY", base.queue_capacity),
            idle_spins: env_get("FICA_IDLE_SPINS", base.idle_spins),
            park_timeout: Duration::from_micros(env_get(
                "FICA_PARK_TIMEOUT_US",
                base.park_timeout.as_micros() as u64,
            )),
        }
    }

    /// Library defaults, no environment lookup.
    /// Useful for testing or when you want full control.
    pub fn new() -> Self {
        Self {
            num_workers: defaults::NUM_WORKERS.min(crate::affinity::available_core_count()),
            bind: defaults::BIND,
            cores: None,
            core_base: defaults::CORE_BASE,
            passes: defaults::PASSES,
            deadline: (defaults::DEADLINE_MS > 0)
                .then(|| Duration::from_millis(defaults::DEADLINE_MS)),
            queue_capacity: defaults::QUEUE_CAPACITY,
            idle_spins: defaults::IDLE_SPINS,
            park_timeout: Duration::from_micros(defaults::PARK_TIMEOUT_US),
        }
    }

    // Builder methods

    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn bind(mut self, enable: bool) -> Self {
        self.bind = enable;
        self
    }

    pub fn cores(mut self, cores: Vec<usize>) -> Self {
        self.cores = Some(cores);
        self
    }

    pub fn core_base(mut self, base: usize) -> Self {
        self.core_base = base;
        self
    }

    pub fn passes(mut self, n: u64) -> Self {
        self.passes = n;
        self
    }

    pub fn deadline(mut self, d: Option<Duration>) -> Self {
        self.deadline = d;
        self
    }

    pub fn queue_capacity(mut self, cap: usize) -> Self {
        self.queue_capacity = cap;
        self
    }

    pub fn idle_spins(mut self, spins: u32) -> Self {
        self.idle_spins = spins;
        self
    }

    pub fn park_timeout(mut self, d: Duration) -> Self {
        self.park_timeout = d;
        self
    }

    /// Budget every worker gets
    pub fn budget(&self) -> Budget {
        Budget {
            passes: self.passes,
            deadline: self.deadline,
        }
    }

    pub fn idle_policy(&self) -> IdlePolicy {
        IdlePolicy::new(self.idle_spins, self.park_timeout)
    }

    /// Core for worker `index`, `None` when unbound
    fn core_for(&self, index: usize) -> Option<usize> {
        if !self.bind {
            return None;
        }
        match &self.cores {
            Some(cores) => cores.get(index).copied(),
            None => Some(self.core_base + index),
        }
    }

    /// Check against the machine's online core count.
    pub fn validate(&self, available_cores: usize) -> Result<(), ConfigError> {
        if self.num_workers == 0 || self.num_workers > available_cores {
            return Err(ConfigError::WorkerCount {
                requested: self.num_workers,
                available: available_cores,
            });
        }
        if self.bind {
            if let Some(cores) = &self.cores {
                if cores.len() < self.num_workers {
                    return Err(ConfigError::InvalidValue(
                        "core list shorter than num_workers",
                    ));
                }
            }
            for worker in 0..self.num_workers {
                if let Some(core) = self.core_for(worker) {
                    if core >= available_cores {
                        return Err(ConfigError::CoreOutOfRange {
                            worker,
                            core,
                            available: available_cores,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// One descriptor per worker, index order
    pub fn descriptors(&self) -> Vec<WorkerDescriptor> {
        (0..self.num_workers)
            .map(|index| WorkerDescriptor {
                index,
                core: self.core_for(index),
                budget: self.budget(),
                idle: self.idle_policy(),
            })
            .collect()
    }

    /// Queue honoring `queue_capacity`
    pub fn new_queue<T>(&self) -> WorkQueue<T> {
        if self.queue_capacity == 0 {
            WorkQueue::new()
        } else {
            WorkQueue::bounded(self.queue_capacity)
        }
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        eprintln!("fica pool configuration:");
        eprintln!("  num_workers:     {}", self.num_workers);
        eprintln!("  bind:            {}", self.bind);
        match &self.cores {
            Some(cores) => eprintln!("  cores:           {:?}", cores),
            None => eprintln!("  core_base:       {}", self.core_base),
        }
        eprintln!("  passes:          {}", self.passes);
        eprintln!("  deadline:        {:?}", self.deadline);
        eprintln!("  queue_capacity:  {}", self.queue_capacity);
        eprintln!("  idle_spins:      {}", self.idle_spins);
        eprintln!("  park_timeout:    {:?}", self.park_timeout);
    }
}
