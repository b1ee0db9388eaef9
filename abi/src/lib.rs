//! Ember ABI
//!
//! Everything a task and the kernel have to agree on byte-for-byte:
//! the trap frame pushed by the entry stub, the syscall numbers carried
//! in `rax`, and the wire values of scheduling priorities.

#![no_std]

pub mod cpu;
pub mod priority;
pub mod syscall;

pub use cpu::CpuState;
pub use priority::Priority;
