//! Process Scheduler

pub mod manager; // Task table, lifecycle API, scheduling decision
pub mod queue;   // Ready queue and insertion policies
pub mod report;  // Process table rendering
pub mod task;    // Task / PCB

/// Capacity of the task table.
pub const MAX_TASKS: usize = 256;

/// Bytes of private stack per task. The trap path, including table
/// rendering and the firmware console behind `log`, runs on this stack.
pub const STACK_SIZE: usize = 4096 * 4;

/// Scheduling decisions after the collatz task is tagged before the
/// collatz scenarios act (unblock or priority escalation).
pub const COLLATZ_TRIGGER_TICKS: u32 = 5;
