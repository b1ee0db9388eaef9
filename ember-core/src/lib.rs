//! Ember core: process manager and schedulers
//!
//! Hardware independent half of the kernel. The kernel binary hands every
//! trap frame to this crate and resumes whatever frame comes back; this
//! crate owns the task table, the ready queue and the scheduling policy.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod console;
pub mod context;
pub mod error;
pub mod sched;
pub mod syscall;
pub mod trap;

pub use config::{KernelConfig, Scenario, TablePrint};
pub use console::{Console, LineBuffer};
pub use context::ContextPtr;
pub use error::SchedError;
pub use sched::manager::TaskManager;
pub use sched::queue::SchedulerPolicy;
pub use sched::task::{Pid, Segments, Task, TaskState, WaitTarget};
