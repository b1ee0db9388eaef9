//! Task side of the syscall interface
//!
//! Tasks run in the kernel's address space and enter the kernel with
//! `int 0x80`: number in rax, argument in rdi, result back in rax.

use core::arch::asm;
use core::fmt::{self, Write};

use ember_abi::syscall::{numbers::*, NO_PID, WAIT_ANY};
use ember_abi::Priority;

pub type Program = extern "C" fn() -> !;

unsafe fn syscall1(nr: u64, arg0: u64) -> u64 {
    let ret: u64;
    asm!(
        "int 0x80",
        inlateout("rax") nr => ret,
        in("rdi") arg0,
    );
    ret
}

fn syscall0(nr: u64) -> u64 {
    unsafe { syscall1(nr, 0) }
}

fn to_pid(raw: u64) -> Option<u64> {
    (raw != NO_PID).then_some(raw)
}

/// Print a NUL-terminated byte string.
pub fn print(text: &[u8]) {
    debug_assert_eq!(text.last(), Some(&0));
    unsafe { syscall1(SYS_PRINT, text.as_ptr() as u64) };
}

/// Child pid in the parent, 0 in the child, None if the table is full.
pub fn fork() -> Option<u64> {
    to_pid(syscall0(SYS_FORK))
}

pub fn fork_pid() -> Option<u64> {
    to_pid(syscall0(SYS_FORK_PID))
}

pub fn execve(program: Program) -> ! {
    unsafe { syscall1(SYS_EXECVE, program as usize as u64) };
    unreachable!("execve returned")
}

pub fn waitpid(pid: u64) -> Option<u64> {
    to_pid(unsafe { syscall1(SYS_WAITPID, pid) })
}

pub fn wait_any() -> Option<u64> {
    waitpid(WAIT_ANY)
}

pub fn exit() -> ! {
    syscall0(SYS_EXIT);
    unreachable!("exit returned")
}

pub fn block_for_collatz() {
    syscall0(SYS_BLOCK_FOR_COLLATZ);
}

pub fn set_last_admitted_priority(priority: Priority) {
    unsafe { syscall1(SYS_SET_LAST_ADMITTED_PRIORITY, priority.as_raw()) };
}

pub fn collatz_added() {
    syscall0(SYS_COLLATZ_ADDED);
}

pub fn set_schedule_latch(on: bool) {
    unsafe { syscall1(SYS_SET_SCHEDULE_LATCH, u64::from(on)) };
}

/// Fixed-size line buffer for formatted task output.
pub struct Line {
    buf: [u8; 160],
    len: usize,
}

impl Line {
    pub const fn new() -> Self {
        Self { buf: [0; 160], len: 0 }
    }

    /// Print and empty the buffer.
    pub fn flush(&mut self) {
        self.buf[self.len] = 0;
        print(&self.buf[..=self.len]);
        self.len = 0;
    }
}

impl Write for Line {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        // Keep one byte for the terminator; excess is dropped.
        let room = self.buf.len() - 1 - self.len;
        let n = s.len().min(room);
        self.buf[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
        self.len += n;
        Ok(())
    }
}

pub fn print_fmt(args: fmt::Arguments) {
    let mut line = Line::new();
    let _ = line.write_fmt(args);
    line.flush();
}

macro_rules! uprintln {
    ($($arg:tt)*) => {
        $crate::usercall::print_fmt(format_args!("{}\n", format_args!($($arg)*)))
    };
}
pub(crate) use uprintln;
