//! Error types for fica
//!
//! Errors are split by where they surface:
//!
//! - `ConfigError` - rejected before any worker thread is spawned
//! - `AffinityError` - a single worker could not bind to its core
//! - `HardwareError` - returned by a step function or a channel, ends that worker
//! - `QueueFull` - bounded queue rejected an item, handed back to the caller
//! - `PoolError` - `WorkerPool::start` failures

use core::fmt;

/// Result type for pool-level operations
pub type PoolResult<T> = Result<T, PoolError>;

/// Result type for hardware collaborator calls
pub type HwResult<T> = Result<T, HardwareError>;

/// Invalid pool or worker configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Generic invalid value
    InvalidValue(&'static str),

    /// Worker count outside `1..=available`
    WorkerCount { requested: usize, available: usize },

    /// Worker asks for a core that does not exist
    CoreOutOfRange { worker: usize, core: usize, available: usize },

    /// Two descriptors share an index
    DuplicateIndex(usize),

    /// Descriptor index not below the worker count
    IndexOutOfRange { index: usize, workers: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "invalid config: {}", msg),
            ConfigError::WorkerCount { requested, available } => write!(
                f,
                "invalid config: {} workers requested, must be 1..={}",
                requested, available
            ),
            ConfigError::CoreOutOfRange { worker, core, available } => write!(
                f,
                "invalid config: worker {} bound to core {}, only {} cores online",
                worker, core, available
            ),
            ConfigError::DuplicateIndex(index) => {
                write!(f, "invalid config: duplicate worker index {}", index)
            }
            ConfigError::IndexOutOfRange { index, workers } => write!(
                f,
                "invalid config: worker index {} out of range for {} workers",
                index, workers
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// CPU affinity errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AffinityError {
    /// Platform cannot query or set thread affinity
    Unsupported,

    /// Core id not in `[0, available)`
    CoreOutOfRange { core: usize, available: usize },

    /// OS refused the request (errno)
    Os(i32),
}

impl fmt::Display for AffinityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AffinityError::Unsupported => write!(f, "thread affinity not supported on this platform"),
            AffinityError::CoreOutOfRange { core, available } => {
                write!(f, "core {} out of range (0..{})", core, available)
            }
            AffinityError::Os(errno) => write!(f, "set affinity failed: errno {}", errno),
        }
    }
}

impl std::error::Error for AffinityError {}

/// Errors raised by hardware collaborators (channels, step functions)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwareError {
    /// No device or channel with that name
    NotFound(String),

    /// Channel used after close
    Closed,

    /// OS error with errno
    Os(i32),

    /// Fewer bytes moved than requested
    ShortTransfer { requested: usize, transferred: usize },

    /// Received data does not match the expected pattern
    DataMismatch { offset: usize, expected: u8, actual: u8 },

    /// Device-specific failure
    Device(&'static str),
}

impl fmt::Display for HardwareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardwareError::NotFound(name) => write!(f, "channel '{}' not found", name),
            HardwareError::Closed => write!(f, "channel closed"),
            HardwareError::Os(errno) => write!(f, "OS error: errno {}", errno),
            HardwareError::ShortTransfer { requested, transferred } => write!(
                f,
                "short transfer: requested {} bytes, moved {}",
                requested, transferred
            ),
            HardwareError::DataMismatch { offset, expected, actual } => write!(
                f,
                "data mismatch at offset {}: expected {:#04x}, got {:#04x}",
                offset, expected, actual
            ),
            HardwareError::Device(msg) => write!(f, "device error: {}", msg),
        }
    }
}

impl std::error::Error for HardwareError {}

impl From<std::io::Error> for HardwareError {
    fn from(e: std::io::Error) -> Self {
        match e.raw_os_error() {
            Some(errno) => HardwareError::Os(errno),
            None => HardwareError::Device("I/O error without errno"),
        }
    }
}

/// Error returned when enqueueing on a full bounded queue.
///
/// Carries the rejected item so the caller keeps ownership.
#[derive(Clone, PartialEq, Eq)]
pub struct QueueFull<T>(pub T);

impl<T> QueueFull<T> {
    /// Take back the rejected item
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for QueueFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueueFull(..)")
    }
}

impl<T> fmt::Display for QueueFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue full")
    }
}

impl<T> std::error::Error for QueueFull<T> {}

/// Errors from `WorkerPool::start`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Rejected before spawning anything
    Config(ConfigError),

    /// OS refused to create a worker thread
    SpawnFailed { worker: usize, errno: Option<i32> },
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::Config(e) => write!(f, "{}", e),
            PoolError::SpawnFailed { worker, errno: Some(errno) } => {
                write!(f, "failed to spawn worker {}: errno {}", worker, errno)
            }
            PoolError::SpawnFailed { worker, errno: None } => {
                write!(f, "failed to spawn worker {}", worker)
            }
        }
    }
}

impl std::error::Error for PoolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PoolError::Config(e) => Some(e),
            PoolError::SpawnFailed { .. } => None,
        }
    }
}

impl From<ConfigError> for PoolError {
    fn from(e: ConfigError) -> Self {
        PoolError::Config(e)
    }
}
