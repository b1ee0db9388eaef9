//! Interrupt handler table
//!
//! A handler takes the interrupted frame and returns the frame to resume.
//! The kernel's trap stub looks the vector up here instead of knowing about
//! timers or syscalls itself.

use ember_abi::syscall::SYSCALL_VECTOR;

use crate::console::Console;
use crate::context::ContextPtr;
use crate::sched::manager::TaskManager;
use crate::syscall;

/// Something that handles one interrupt vector, given the kernel context `K`.
pub trait InterruptHandler<K>: Sync {
    fn handle(&self, cx: &mut K, frame: ContextPtr) -> ContextPtr;
}

pub struct InterruptTable<'h, K> {
    handlers: [Option<&'h dyn InterruptHandler<K>>; 256],
}

impl<'h, K> InterruptTable<'h, K> {
    pub fn new() -> Self {
        Self { handlers: [None; 256] }
    }

    /// Install `handler` for `vector`, returning the one it replaces.
    pub fn register(
        &mut self,
        vector: u8,
        handler: &'h dyn InterruptHandler<K>,
    ) -> Option<&'h dyn InterruptHandler<K>> {
        self.handlers[usize::from(vector)].replace(handler)
    }

    pub fn is_registered(&self, vector: u8) -> bool {
        self.handlers[usize::from(vector)].is_some()
    }

    /// Run the handler for `vector`; unhandled vectors resume `frame`.
    pub fn dispatch(&self, vector: u8, cx: &mut K, frame: ContextPtr) -> ContextPtr {
        match self.handlers[usize::from(vector)] {
            Some(handler) => handler.handle(cx, frame),
            None => {
                log::warn!("[Ember::Trap] no handler for vector {:#x}", vector);
                frame
            }
        }
    }
}

impl<K> Default for InterruptTable<'_, K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Timer tick: make a scheduling decision.
pub struct TimerHandler;

impl<C: Console, const N: usize> InterruptHandler<TaskManager<C, N>> for TimerHandler {
    fn handle(&self, tasks: &mut TaskManager<C, N>, frame: ContextPtr) -> ContextPtr {
        tasks.schedule(frame)
    }
}

/// `int 0x80`: run the syscall dispatcher.
pub struct SyscallHandler;

impl SyscallHandler {
    pub const VECTOR: u8 = SYSCALL_VECTOR;
}

impl<C: Console, const N: usize> InterruptHandler<TaskManager<C, N>> for SyscallHandler {
    fn handle(&self, tasks: &mut TaskManager<C, N>, frame: ContextPtr) -> ContextPtr {
        syscall::dispatch(tasks, frame)
    }
}
