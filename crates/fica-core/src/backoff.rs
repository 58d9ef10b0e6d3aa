//! Idle backoff for polling loops
//!
//! When a step finds nothing to do (empty queue, empty hardware ring) the
//! worker backs off instead of hammering the queue lock:
//!
//! 1. spin with `spin_loop` hints for `spins` rounds
//! 2. then sleep, doubling from 1us up to `max_sleep`
//!
//! Any productive step resets the sequence.

use std::time::Duration;

/// Backoff tuning, usually filled from `PoolConfig`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdlePolicy {
    /// Spin rounds before the first sleep
    pub spins: u32,
    /// Longest single sleep
    pub max_sleep: Duration,
}

impl IdlePolicy {
    pub const fn new(spins: u32, max_sleep: Duration) -> Self {
        Self { spins, max_sleep }
    }
}

impl Default for IdlePolicy {
    fn default() -> Self {
        Self {
            spins: 64,
            max_sleep: Duration::from_micros(100),
        }
    }
}

/// Backoff state for one polling loop. Not shared between threads.
#[derive(Debug)]
pub struct Backoff {
    policy: IdlePolicy,
    idle_rounds: u32,
    sleep: Duration,
}

const MIN_SLEEP: Duration = Duration::from_micros(1);

impl Backoff {
    pub fn new(policy: IdlePolicy) -> Self {
        Self {
            policy,
            idle_rounds: 0,
            sleep: MIN_SLEEP,
        }
    }

    /// Wait a little after an idle poll
    pub fn snooze(&mut self) {
        if self.idle_rounds < self.policy.spins {
            // 1, 2, 4 .. 64 spin hints per round
            let n = 1u32 << self.idle_rounds.min(6);
            for _ in 0..n {
                std::hint::spin_loop();
            }
            self.idle_rounds += 1;
            return;
        }
        if self.policy.max_sleep.is_zero() {
            std::thread::yield_now();
            return;
        }
        let sleep = self.sleep.min(self.policy.max_sleep);
        std::thread::sleep(sleep);
        self.sleep = (sleep * 2).min(self.policy.max_sleep);
    }

    /// Back to the spinning phase after useful work
    #[inline]
    pub fn reset(&mut self) {
        self.idle_rounds = 0;
        self.sleep = MIN_SLEEP;
    }

    /// True once spinning is over and `snooze` sleeps
    #[inline]
    pub fn is_sleeping(&self) -> bool {
        self.idle_rounds >= self.policy.spins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_spins_then_sleeps() {
        let mut b = Backoff::new(IdlePolicy::new(3, Duration::from_micros(50)));
        for _ in 0..3 {
            assert!(!b.is_sleeping());
            b.snooze();
        }
        assert!(b.is_sleeping());

        b.reset();
        assert!(!b.is_sleeping());
    }

    #[test]
    fn test_sleep_is_capped() {
        let mut b = Backoff::new(IdlePolicy::new(0, Duration::from_micros(200)));
        let start = Instant::now();
        for _ in 0..20 {
            b.snooze();
        }
        // 20 sleeps of at most 200us each, with generous scheduler slack
        assert!(start.elapsed() < Duration::from_millis(500));
        assert_eq!(b.sleep, Duration::from_micros(200));
    }
}
