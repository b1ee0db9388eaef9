//! Task / Process Definition

use alloc::boxed::Box;
use core::mem::align_of;
use core::ops::Range;

use ember_abi::cpu::INITIAL_RFLAGS;
use ember_abi::syscall::WAIT_ANY;
use ember_abi::{CpuState, Priority};

use super::STACK_SIZE;
use crate::context::ContextPtr;

/// Process ID (index into the task table)
pub type Pid = usize;

/// Task State
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Ready,
    Running,
    Blocked,
    Terminated,
}

impl TaskState {
    pub fn name(self) -> &'static str {
        match self {
            TaskState::Ready => "Ready",
            TaskState::Running => "Running",
            TaskState::Blocked => "Blocked",
            TaskState::Terminated => "Terminated",
        }
    }
}

/// What a task blocked in `waitpid` is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTarget {
    Any,
    Child(Pid),
}

impl WaitTarget {
    /// Decode the raw `waitpid` argument register.
    pub fn from_raw(raw: u64) -> Self {
        if raw == WAIT_ANY {
            WaitTarget::Any
        } else {
            WaitTarget::Child(usize::try_from(raw).unwrap_or(usize::MAX))
        }
    }

    /// Does an exiting `child` satisfy this wait?
    pub fn matches(self, child: Pid) -> bool {
        match self {
            WaitTarget::Any => true,
            WaitTarget::Child(pid) => pid == child,
        }
    }
}

/// Segment selectors stamped into fresh contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segments {
    pub code: u16,
    pub stack: u16,
}

#[repr(C, align(16))]
struct Stack([u8; STACK_SIZE]);

/// Offset of the saved context of a task that has never run. One qword is
/// left above it so the entry point starts with a call-aligned stack.
const INITIAL_CONTEXT: usize = STACK_SIZE - 8 - CpuState::SIZE;

/// A Process / Task Control Block
pub struct Task {
    stack: Box<Stack>,
    /// Offset of the saved `CpuState` inside `stack`. Always in bounds and
    /// 8-byte aligned.
    context: usize,

    pid: Pid,
    ppid: Option<Pid>,
    priority: Priority,
    state: TaskState,
    arrival: u32,

    wait: Option<WaitTarget>,
    collected: bool,
    fork_pid: Option<Pid>,
}

impl Task {
    /// Build a task that starts executing `entry` from scratch.
    pub fn new(entry: u64, segments: Segments) -> Self {
        let mut task = Self::empty();
        task.reset(entry, segments);
        task
    }

    pub(crate) fn empty() -> Self {
        Self {
            stack: Box::new(Stack([0; STACK_SIZE])),
            context: INITIAL_CONTEXT,
            pid: 0,
            ppid: None,
            priority: Priority::Low,
            state: TaskState::Ready,
            arrival: 0,
            wait: None,
            collected: false,
            fork_pid: None,
        }
    }

    /// Discard the register image and start over at `entry`. Identity and
    /// scheduling attributes are kept.
    pub fn reset(&mut self, entry: u64, segments: Segments) {
        let entry_rsp = (self.stack_base() + STACK_SIZE - 8) as u64;
        self.context = INITIAL_CONTEXT;
        *self.context_mut() = CpuState {
            rip: entry,
            cs: u64::from(segments.code),
            rflags: INITIAL_RFLAGS,
            rsp: entry_rsp,
            ss: u64::from(segments.stack),
            ..CpuState::default()
        };
    }

    /// Duplicate `other`'s stack and saved context into this task.
    pub fn copy_from(&mut self, other: &Task) {
        self.stack.0.copy_from_slice(&other.stack.0);
        self.context = other.context;
        self.rebase_from(other);
    }

    /// Replace the saved context wholesale.
    pub fn overwrite_context(&mut self, cpu: &CpuState) {
        *self.context_mut() = *cpu;
    }

    /// Stack and frame pointers that point into `other`'s stack are moved
    /// to the same offset in this task's stack.
    pub(crate) fn rebase_from(&mut self, other: &Task) {
        let from = other.stack_range();
        let base = self.stack_base();
        let ctx = self.context_mut();
        for reg in [&mut ctx.rsp, &mut ctx.rbp] {
            let value = *reg as usize;
            if from.contains(&value) {
                *reg = (value - from.start + base) as u64;
            }
        }
    }

    /// Remember the frame this task was interrupted with. A frame sitting in
    /// the task's own stack is adopted where it is, anything else is copied.
    pub(crate) fn save_context(&mut self, frame: ContextPtr) {
        let addr = frame.addr();
        let range = self.stack_range();
        let in_stack = addr >= range.start
            && addr + CpuState::SIZE <= range.end
            && (addr - range.start) % align_of::<CpuState>() == 0;

        if in_stack {
            self.context = addr - range.start;
        } else {
            // SAFETY: the caller hands in the live trap frame of this call.
            let cpu = unsafe { frame.with(|cpu| *cpu) };
            self.overwrite_context(&cpu);
        }
    }

    pub fn context(&self) -> &CpuState {
        // SAFETY: `context` is in bounds and 8-aligned inside a 16-aligned
        // buffer, and every bit pattern is a valid CpuState.
        unsafe { &*(self.stack.0.as_ptr().add(self.context) as *const CpuState) }
    }

    pub(crate) fn context_mut(&mut self) -> &mut CpuState {
        // SAFETY: see `context`.
        unsafe { &mut *(self.stack.0.as_mut_ptr().add(self.context) as *mut CpuState) }
    }

    pub fn context_ptr(&mut self) -> ContextPtr {
        ContextPtr::from(self.context_mut())
    }

    pub fn stack_range(&self) -> Range<usize> {
        let base = self.stack_base();
        base..base + STACK_SIZE
    }

    fn stack_base(&self) -> usize {
        self.stack.0.as_ptr() as usize
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn ppid(&self) -> Option<Pid> {
        self.ppid
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn arrival(&self) -> u32 {
        self.arrival
    }

    pub fn wait(&self) -> Option<WaitTarget> {
        self.wait
    }

    pub fn is_collected(&self) -> bool {
        self.collected
    }

    pub fn fork_pid(&self) -> Option<Pid> {
        self.fork_pid
    }

    pub fn is_child_of(&self, parent: Pid) -> bool {
        self.ppid == Some(parent)
    }

    pub(crate) fn admit_as(&mut self, pid: Pid, ppid: Option<Pid>, priority: Priority, arrival: u32) {
        self.pid = pid;
        self.ppid = ppid;
        self.priority = priority;
        self.arrival = arrival;
        self.state = TaskState::Ready;
        self.wait = None;
        self.collected = false;
        self.fork_pid = None;
    }

    pub(crate) fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
    }

    pub(crate) fn set_state(&mut self, state: TaskState) {
        self.state = state;
    }

    pub(crate) fn set_wait(&mut self, wait: Option<WaitTarget>) {
        self.wait = wait;
    }

    pub(crate) fn set_collected(&mut self) {
        self.collected = true;
    }

    pub(crate) fn set_fork_pid(&mut self, fork_pid: Option<Pid>) {
        self.fork_pid = fork_pid;
    }
}
