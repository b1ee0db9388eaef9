//! Host-side machine model: a task manager behind an interrupt table, plus
//! one set of "live" registers standing in for the CPU.

#![allow(dead_code)]

use std::fmt;

use ember_abi::syscall::numbers::*;
use ember_abi::syscall::NO_PID;
use ember_abi::{CpuState, Priority};
use ember_core::trap::{InterruptTable, SyscallHandler, TimerHandler};
use ember_core::{
    Console, ContextPtr, KernelConfig, Pid, Scenario, SchedulerPolicy, Segments, TablePrint,
    TaskManager,
};

pub const TIMER_VECTOR: u8 = 0x20;
pub const SEGMENTS: Segments = Segments { code: 0x38, stack: 0x30 };
pub const INIT_ENTRY: u64 = 0x1000;

static TIMER: TimerHandler = TimerHandler;
static SYSCALL: SyscallHandler = SyscallHandler;

/// Console that keeps everything it is given.
#[derive(Default)]
pub struct Recorder {
    pub text: String,
    pub printed: Vec<u64>,
    pub pauses: usize,
}

impl fmt::Write for Recorder {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.text.push_str(s);
        Ok(())
    }
}

impl Console for Recorder {
    fn print_user(&mut self, addr: u64) {
        self.printed.push(addr);
    }

    fn pause(&mut self) {
        self.pauses += 1;
    }
}

impl Recorder {
    pub fn tables(&self) -> usize {
        self.text.matches("Ready queue PIDs:").count()
    }
}

pub struct Machine<const N: usize = 16> {
    pub tasks: TaskManager<Recorder, N>,
    table: InterruptTable<'static, TaskManager<Recorder, N>>,
    /// Registers of the boot loop, interrupted by the first tick.
    boot: Box<CpuState>,
    /// Registers of whatever is executing right now.
    pub cpu: CpuState,
}

impl<const N: usize> Machine<N> {
    pub fn new(config: KernelConfig) -> Self {
        let mut table: InterruptTable<'static, TaskManager<Recorder, N>> = InterruptTable::new();
        table.register(TIMER_VECTOR, &TIMER);
        table.register(SyscallHandler::VECTOR, &SYSCALL);
        Self {
            tasks: TaskManager::new(config, SEGMENTS, Recorder::default()),
            table,
            boot: Box::new(CpuState { rip: 0xb007, ..CpuState::default() }),
            cpu: CpuState::default(),
        }
    }

    /// Boot with the init task admitted and running.
    pub fn booted(config: KernelConfig) -> Self {
        let mut m = Self::new(config);
        let init = m.tasks.bootstrap(INIT_ENTRY).unwrap();
        m.tick();
        assert_eq!(m.running(), Some(init));
        m
    }

    pub fn running(&self) -> Option<Pid> {
        self.tasks.current()
    }

    pub fn tick(&mut self) {
        self.trap(TIMER_VECTOR, None);
    }

    /// Issue `nr` from the running task and return its rax on resumption,
    /// which is the result only if the caller is the one resumed.
    pub fn syscall(&mut self, nr: u64, arg: u64) -> u64 {
        self.trap(SyscallHandler::VECTOR, Some((nr, arg)));
        self.cpu.rax
    }

    pub fn fork(&mut self) -> u64 {
        self.syscall(SYS_FORK, 0)
    }

    pub fn fork_pid(&mut self) -> u64 {
        self.syscall(SYS_FORK_PID, 0)
    }

    pub fn waitpid(&mut self, target: u64) -> u64 {
        self.syscall(SYS_WAITPID, target)
    }

    pub fn exit(&mut self) {
        self.syscall(SYS_EXIT, 0);
    }

    pub fn set_last_priority(&mut self, priority: Priority) {
        self.syscall(SYS_SET_LAST_ADMITTED_PRIORITY, priority.as_raw());
    }

    /// Fork a child, give it `priority` and return its pid.
    pub fn spawn(&mut self, priority: Priority) -> Pid {
        let child = self.fork();
        assert_ne!(child, NO_PID);
        self.set_last_priority(priority);
        child as Pid
    }

    pub fn queue(&self) -> Vec<Pid> {
        self.tasks.queue().pids().collect()
    }

    fn trap(&mut self, vector: u8, call: Option<(u64, u64)>) {
        let resumed = if self.tasks.current().is_none() && call.is_none() {
            let frame = ContextPtr::from(&mut *self.boot);
            let out = self.table.dispatch(vector, &mut self.tasks, frame);
            // SAFETY: `out` is the boot frame or a saved task context.
            unsafe { *out.as_ptr() }
        } else {
            let mut live = self.cpu;
            if let Some((nr, arg)) = call {
                live.rax = nr;
                live.rdi = arg;
            }
            let frame = ContextPtr::from(&mut live);
            let out = self.table.dispatch(vector, &mut self.tasks, frame);
            // SAFETY: `out` is `live`, the boot frame or a saved context,
            // all alive here.
            unsafe { *out.as_ptr() }
        };
        self.cpu = resumed;
    }
}

pub fn config(scheduler: SchedulerPolicy) -> KernelConfig {
    KernelConfig {
        scheduler,
        table_print: TablePrint::Never,
        ..KernelConfig::DEFAULT
    }
}

pub fn collatz_config(scenario: Scenario, table_print: TablePrint) -> KernelConfig {
    KernelConfig {
        scheduler: SchedulerPolicy::PreemptivePriority,
        scenario,
        table_print,
        print_delay: false,
    }
}
