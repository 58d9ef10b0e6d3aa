//! Cooperative stop flag shared by a pool and its workers
//!
//! Workers check the token once per iteration boundary. Nothing is
//! interrupted mid-step: a worker blocked inside a hardware read only sees
//! the request after that read returns.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable handle to a shared stop flag.
///
/// Clones share state: stopping any clone stops them all.
#[derive(Clone)]
pub struct StopToken {
    stopped: Arc<AtomicBool>,
}

impl StopToken {
    /// Create a new token in the running state
    pub fn new() -> Self {
        Self {
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request every holder of this token to stop
    #[inline]
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// Check if a stop was requested
    #[inline]
    pub fn is_stop_requested(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl Default for StopToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StopToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopToken")
            .field("stopped", &self.is_stop_requested())
            .finish()
    }
}
