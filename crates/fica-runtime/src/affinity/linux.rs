//! Linux affinity via `sched_setaffinity(0, ..)`
//!
//! pid 0 addresses the calling thread, not the whole process, so each
//! worker pins only itself.

use fica_core::AffinityError;
use nix::sched::{sched_getaffinity, sched_setaffinity, CpuSet};
use nix::unistd::Pid;

pub(super) fn online_cores() -> usize {
    // Safety: sysconf has no preconditions
    let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if n > 0 {
        n as usize
    } else {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

pub(super) fn allowed_cores() -> Vec<usize> {
    let set = match sched_getaffinity(Pid::from_raw(0)) {
        Ok(set) => set,
        Err(_) => return Vec::new(),
    };
    (0..CpuSet::count())
        .filter(|&cpu| set.is_set(cpu).unwrap_or(false))
        .collect()
}

pub(super) fn bind(core: usize) -> Result<(), AffinityError> {
    let mut set = CpuSet::new();
    set.set(core).map_err(|e| AffinityError::Os(e as i32))?;
    sched_setaffinity(Pid::from_raw(0), &set).map_err(|e| AffinityError::Os(e as i32))
}
