//! CPU affinity
//!
//! Pins the calling thread to one logical core.
//! Platform-specific implementations use the native affinity call; where
//! there is none, binding reports `AffinityError::Unsupported` and the
//! worker fails instead of silently running unbound.

use fica_core::AffinityError;

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod linux;
        use linux as platform;
    } else {
        mod fallback;
        use fallback as platform;
    }
}

/// Number of online logical cores.
///
/// Valid core ids are `0..available_core_count()`. Never returns 0.
pub fn available_core_count() -> usize {
    platform::online_cores().max(1)
}

/// Cores the calling thread may currently run on, ascending.
///
/// Empty when the platform cannot report a mask.
pub fn allowed_cores() -> Vec<usize> {
    platform::allowed_cores()
}

/// Pin the calling thread to `core`.
///
/// Fails with `CoreOutOfRange` for ids outside `0..available_core_count()`,
/// `Unsupported` where the platform has no affinity call, and `Os(errno)`
/// when the kernel refuses (e.g. the core is outside the cgroup cpuset).
pub fn bind_current_thread(core: usize) -> Result<(), AffinityError> {
    let available = available_core_count();
    if core >= available {
        return Err(AffinityError::CoreOutOfRange { core, available });
    }
    platform::bind(core)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_core_count_positive() {
        assert!(available_core_count() >= 1);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let n = available_core_count();
        assert_eq!(
            bind_current_thread(n),
            Err(AffinityError::CoreOutOfRange { core: n, available: n })
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_bind_to_allowed_core() {
        let allowed = allowed_cores();
        assert!(!allowed.is_empty());
        let core = *allowed.last().unwrap();

        // Bind on a scratch thread so the test harness thread keeps its mask
        let after = thread::spawn(move || {
            bind_current_thread(core).map(|()| allowed_cores())
        })
        .join()
        .unwrap();

        assert_eq!(after, Ok(vec![core]));
    }

    #[cfg(not(target_os = "linux"))]
    #[test]
    fn test_bind_unsupported() {
        let r = thread::spawn(|| bind_current_thread(0)).join().unwrap();
        assert_eq!(r, Err(AffinityError::Unsupported));
    }
}
