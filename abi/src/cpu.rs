//! Trap frame layout
//!
//! The entry stub pushes `error` and the general purpose registers on top
//! of the frame the CPU pushes for an interrupt, so that the stack pointer
//! handed to the kernel points at a `CpuState`. The stub pops the same
//! layout back off whatever pointer the kernel returns and executes
//! `iretq`.
//!
//! ```text
//! offset  field      pushed by
//!   0     rax        stub (last)
//!   8     rbx        stub
//!  16     rcx        stub
//!  24     rdx        stub
//!  32     rsi        stub
//!  40     rdi        stub
//!  48     rbp        stub
//!  56     r8 .. r15  stub (8 bytes each, up to 112)
//! 120     error      stub (first), 0 when the vector has none
//! 128     rip        CPU
//! 136     cs         CPU
//! 144     rflags     CPU
//! 152     rsp        CPU
//! 160     ss         CPU
//! ```

use core::mem::{offset_of, size_of};

/// RFLAGS for a fresh context: reserved bit 1 plus IF.
pub const INITIAL_RFLAGS: u64 = 0x202;

/// Saved register image of an interrupted task.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuState {
    pub rax: u64,
    pub rbx: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub rbp: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,

    pub error: u64,

    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

impl CpuState {
    /// Size of the frame in bytes.
    pub const SIZE: usize = size_of::<CpuState>();

    /// Syscall number on entry.
    pub fn syscall_number(&self) -> u64 {
        self.rax
    }

    /// First (and only) syscall argument.
    pub fn arg0(&self) -> u64 {
        self.rdi
    }

    /// Value the interrupted code sees in `rax` when it resumes.
    pub fn set_return(&mut self, value: u64) {
        self.rax = value;
    }
}

const _: () = {
    assert!(CpuState::SIZE == 168);
    assert!(offset_of!(CpuState, rax) == 0);
    assert!(offset_of!(CpuState, rdi) == 40);
    assert!(offset_of!(CpuState, rbp) == 48);
    assert!(offset_of!(CpuState, r15) == 112);
    assert!(offset_of!(CpuState, error) == 120);
    assert!(offset_of!(CpuState, rip) == 128);
    assert!(offset_of!(CpuState, cs) == 136);
    assert!(offset_of!(CpuState, rflags) == 144);
    assert!(offset_of!(CpuState, rsp) == 152);
    assert!(offset_of!(CpuState, ss) == 160);
};
