//! Scheduler errors

use core::fmt;

/// Failures of task manager operations. None of them is fatal: the syscall
/// layer turns every one of them into a `-1` return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    /// The task table is full
    Capacity,
    /// waitpid target is out of range, not a child, or already collected
    InvalidTarget,
    /// waitpid(any) by a task without uncollected children
    NoChildren,
    /// A task-relative operation arrived while no task was running
    NotRunning,
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            SchedError::Capacity => "task table full",
            SchedError::InvalidTarget => "no such child",
            SchedError::NoChildren => "no children to wait for",
            SchedError::NotRunning => "no running task",
        };
        f.write_str(msg)
    }
}

pub type SchedResult<T> = Result<T, SchedError>;
