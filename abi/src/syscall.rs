//! Syscall numbers
//!
//! A task traps with `int 0x80`, the number in `rax` and the argument in
//! `rdi`. The result comes back in `rax`.

/// Interrupt vector used for syscalls.
pub const SYSCALL_VECTOR: u8 = 0x80;

/// Syscall numbers (the process ones borrow their Linux x86 numbers)
pub mod numbers {
    pub const SYS_PRINT: u64 = 1;
    pub const SYS_WAITPID: u64 = 7;
    pub const SYS_EXIT: u64 = 8;
    pub const SYS_BLOCK_FOR_COLLATZ: u64 = 9;
    pub const SYS_SET_LAST_ADMITTED_PRIORITY: u64 = 10;
    pub const SYS_COLLATZ_ADDED: u64 = 11;
    pub const SYS_SET_SCHEDULE_LATCH: u64 = 12;
    pub const SYS_FORK: u64 = 57;
    pub const SYS_FORK_PID: u64 = 58;
    pub const SYS_EXECVE: u64 = 59;
}

/// `-1` as seen in a 64-bit register: "no pid" from fork, waitpid and
/// get_last_fork_child_pid.
pub const NO_PID: u64 = u64::MAX;

/// `waitpid` argument meaning "any child".
pub const WAIT_ANY: u64 = u64::MAX;
