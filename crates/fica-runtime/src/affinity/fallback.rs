//! Fallback for platforms without a per-thread affinity call
//!
//! Core counting still works; binding always fails.

use fica_core::AffinityError;

pub(super) fn online_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

pub(super) fn allowed_cores() -> Vec<usize> {
    Vec::new()
}

pub(super) fn bind(_core: usize) -> Result<(), AffinityError> {
    Err(AffinityError::Unsupported)
}
