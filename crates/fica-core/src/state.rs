//! Worker lifecycle state and exit status

use core::fmt;

use crate::error::{AffinityError, HardwareError};

/// Lifecycle of a worker thread
///
/// `Created -> Binding -> Running -> {Completed | Failed}`.
/// `Binding` is skipped when the worker is unbound. A bind failure goes
/// straight from `Binding` to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Descriptor accepted, thread not yet running
    Created = 0,

    /// Pinning itself to a core
    Binding = 1,

    /// Inside the iteration loop
    Running = 2,

    /// Loop ended normally (budget, stop request, or step said done)
    Completed = 3,

    /// Bind failure, hardware error, or panic
    Failed = 4,
}

impl WorkerState {
    /// Check if the worker has exited
    #[inline]
    pub const fn is_terminated(&self) -> bool {
        matches!(self, WorkerState::Completed | WorkerState::Failed)
    }

    /// Whether `self -> next` is a legal transition
    pub const fn can_transition_to(&self, next: WorkerState) -> bool {
        matches!(
            (self, next),
            (WorkerState::Created, WorkerState::Binding)
                | (WorkerState::Created, WorkerState::Running)
                | (WorkerState::Binding, WorkerState::Running)
                | (WorkerState::Binding, WorkerState::Failed)
                | (WorkerState::Running, WorkerState::Completed)
                | (WorkerState::Running, WorkerState::Failed)
        )
    }
}

impl From<u8> for WorkerState {
    fn from(v: u8) -> Self {
        match v {
            0 => WorkerState::Created,
            1 => WorkerState::Binding,
            2 => WorkerState::Running,
            3 => WorkerState::Completed,
            _ => WorkerState::Failed,
        }
    }
}

impl From<WorkerState> for u8 {
    fn from(state: WorkerState) -> u8 {
        state as u8
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Created => "created",
            WorkerState::Binding => "binding",
            WorkerState::Running => "running",
            WorkerState::Completed => "completed",
            WorkerState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Why a worker left its loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    /// Pass count or deadline reached
    BudgetExhausted,

    /// `request_stop()` observed at an iteration boundary
    Stopped,

    /// Step function reported it has nothing more to do
    Finished,

    /// Could not pin to the requested core; no work was done
    AffinityBindFailure(AffinityError),

    /// Step function returned an error
    HardwareError(HardwareError),

    /// Step function panicked
    Panicked,
}

impl ExitStatus {
    /// Success statuses end in `Completed`, the rest in `Failed`
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(
            self,
            ExitStatus::BudgetExhausted | ExitStatus::Stopped | ExitStatus::Finished
        )
    }

    /// Terminal state matching this status
    #[inline]
    pub const fn final_state(&self) -> WorkerState {
        if self.is_success() {
            WorkerState::Completed
        } else {
            WorkerState::Failed
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::BudgetExhausted => write!(f, "budget exhausted"),
            ExitStatus::Stopped => write!(f, "stopped"),
            ExitStatus::Finished => write!(f, "finished"),
            ExitStatus::AffinityBindFailure(e) => write!(f, "affinity bind failure: {}", e),
            ExitStatus::HardwareError(e) => write!(f, "hardware error: {}", e),
            ExitStatus::Panicked => write!(f, "worker panicked"),
        }
    }
}
