//! Per-worker run budget
//!
//! A budget is a pass count, a wall-clock deadline, both, or neither.
//! Neither means "run until stopped", the old `while(1)` polling loop.
//! Both means whichever limit is hit first.

use std::time::Duration;

/// How long a worker keeps calling its step function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Budget {
    /// Maximum iterations, 0 = unlimited
    pub passes: u64,
    /// Maximum wall-clock time since the loop started
    pub deadline: Option<Duration>,
}

impl Budget {
    /// Run until a stop is requested or the step reports done
    pub const fn forever() -> Self {
        Self {
            passes: 0,
            deadline: None,
        }
    }

    /// Run exactly `n` iterations (0 = unlimited)
    pub const fn passes(n: u64) -> Self {
        Self {
            passes: n,
            deadline: None,
        }
    }

    /// Run until `d` has elapsed
    pub const fn deadline(d: Duration) -> Self {
        Self {
            passes: 0,
            deadline: Some(d),
        }
    }

    /// Add a pass limit to this budget
    pub const fn with_passes(mut self, n: u64) -> Self {
        self.passes = n;
        self
    }

    /// Add a deadline to this budget
    pub const fn with_deadline(mut self, d: Duration) -> Self {
        self.deadline = Some(d);
        self
    }

    /// Neither passes nor deadline set
    #[inline]
    pub const fn is_unbounded(&self) -> bool {
        self.passes == 0 && self.deadline.is_none()
    }

    /// Check the budget at an iteration boundary.
    ///
    /// `iterations` is the number of completed step calls, `elapsed` the
    /// time since the loop started.
    #[inline]
    pub fn exhausted(&self, iterations: u64, elapsed: Duration) -> bool {
        if self.passes != 0 && iterations >= self.passes {
            return true;
        }
        matches!(self.deadline, Some(d) if elapsed >= d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forever_never_exhausts() {
        let b = Budget::forever();
        assert!(b.is_unbounded());
        assert!(!b.exhausted(u64::MAX, Duration::from_secs(86_400)));
    }

    #[test]
    fn test_passes() {
        let b = Budget::passes(3);
        assert!(!b.exhausted(2, Duration::ZERO));
        assert!(b.exhausted(3, Duration::ZERO));
    }

    #[test]
    fn test_deadline() {
        let b = Budget::deadline(Duration::from_millis(10));
        assert!(!b.exhausted(1_000_000, Duration::from_millis(9)));
        assert!(b.exhausted(0, Duration::from_millis(10)));
    }

    #[test]
    fn test_first_limit_wins() {
        let b = Budget::passes(100).with_deadline(Duration::from_secs(1));
        assert!(b.exhausted(100, Duration::ZERO));
        assert!(b.exhausted(1, Duration::from_secs(1)));
        assert!(!b.exhausted(99, Duration::from_millis(999)));
    }
}
