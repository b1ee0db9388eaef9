//! Syscall dispatcher
//!
//! Decodes the number and argument registers of a trapped task and calls
//! exactly one task manager operation.

use core::fmt;

use ember_abi::priority::InvalidPriority;
use ember_abi::syscall::{numbers::*, NO_PID};
use ember_abi::{CpuState, Priority};
use log::{trace, warn};

use crate::console::Console;
use crate::context::ContextPtr;
use crate::sched::manager::TaskManager;
use crate::sched::task::{Task, WaitTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    Print { addr: u64 },
    Fork,
    ForkPid,
    Execve { entry: u64 },
    Waitpid { target: WaitTarget },
    Exit,
    BlockForCollatz,
    SetLastAdmittedPriority { priority: Priority },
    CollatzAdded,
    SetScheduleLatch { on: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    UnknownNumber(u64),
    BadPriority(InvalidPriority),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeError::UnknownNumber(nr) => write!(f, "unknown syscall {}", nr),
            DecodeError::BadPriority(err) => write!(f, "{}", err),
        }
    }
}

impl Syscall {
    pub fn decode(cpu: &CpuState) -> Result<Self, DecodeError> {
        let arg = cpu.arg0();
        let call = match cpu.syscall_number() {
            SYS_PRINT => Syscall::Print { addr: arg },
            SYS_FORK => Syscall::Fork,
            SYS_FORK_PID => Syscall::ForkPid,
            SYS_EXECVE => Syscall::Execve { entry: arg },
            SYS_WAITPID => Syscall::Waitpid {
                target: WaitTarget::from_raw(arg),
            },
            SYS_EXIT => Syscall::Exit,
            SYS_BLOCK_FOR_COLLATZ => Syscall::BlockForCollatz,
            SYS_SET_LAST_ADMITTED_PRIORITY => Syscall::SetLastAdmittedPriority {
                priority: Priority::try_from(arg).map_err(DecodeError::BadPriority)?,
            },
            SYS_COLLATZ_ADDED => Syscall::CollatzAdded,
            SYS_SET_SCHEDULE_LATCH => Syscall::SetScheduleLatch { on: arg != 0 },
            other => return Err(DecodeError::UnknownNumber(other)),
        };
        Ok(call)
    }
}

/// Handle the syscall in `frame` and return the frame to resume.
pub fn dispatch<C: Console, const N: usize>(
    tasks: &mut TaskManager<C, N>,
    frame: ContextPtr,
) -> ContextPtr {
    // SAFETY: the trap path hands in the live frame of the calling task.
    let cpu = unsafe { frame.with(|cpu| *cpu) };
    let call = match Syscall::decode(&cpu) {
        Ok(call) => call,
        Err(err) => {
            warn!("[Ember::Syscall] pid {:?}: {}", tasks.current(), err);
            return frame;
        }
    };
    trace!("[Ember::Syscall] pid {:?}: {:?}", tasks.current(), call);

    match call {
        Syscall::Print { addr } => {
            tasks.console_mut().print_user(addr);
            frame
        }
        Syscall::Fork => {
            if let Err(err) = tasks.fork(frame) {
                warn!("[Ember::Syscall] fork failed: {}", err);
            }
            frame
        }
        Syscall::ForkPid => {
            let pid = tasks
                .current_task()
                .and_then(Task::fork_pid)
                .map_or(NO_PID, |pid| pid as u64);
            // SAFETY: as above.
            unsafe { frame.with(|cpu| cpu.set_return(pid)) };
            frame
        }
        Syscall::Execve { entry } => tasks.execve(entry, frame),
        Syscall::Waitpid { target } => tasks.waitpid(target, frame),
        Syscall::Exit => tasks.exit(frame),
        Syscall::BlockForCollatz => tasks.block_for_collatz(frame),
        Syscall::SetLastAdmittedPriority { priority } => {
            tasks.set_last_admitted_priority(priority);
            frame
        }
        Syscall::CollatzAdded => {
            tasks.collatz_added();
            frame
        }
        Syscall::SetScheduleLatch { on } => {
            tasks.set_schedule_latch(on);
            frame
        }
    }
}
