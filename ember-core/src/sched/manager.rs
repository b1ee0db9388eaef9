//! Task Manager
//!
//! Owns the task table and the ready queue, implements the process
//! lifecycle (fork, exec, wait, exit) and makes the scheduling decision on
//! every timer interrupt.
//!
//! Every operation receives the frame of the interrupted task and returns
//! the frame to resume. Returning another task's saved context is how a
//! context switch happens.

use alloc::vec::Vec;

use ember_abi::syscall::NO_PID;
use ember_abi::Priority;
use log::{debug, trace, warn};

use super::queue::{ReadyEntry, ReadyQueue};
use super::report::render_table;
use super::task::{Pid, Segments, Task, TaskState, WaitTarget};
use super::{COLLATZ_TRIGGER_TICKS, MAX_TASKS};
use crate::config::{KernelConfig, Scenario, TablePrint};
use crate::console::Console;
use crate::context::ContextPtr;
use crate::error::{SchedError, SchedResult};

pub struct TaskManager<C, const N: usize = MAX_TASKS> {
    config: KernelConfig,
    segments: Segments,
    console: C,

    /// N pre-allocated slots. Slots `..num_tasks` are admitted; pids are
    /// slot indices and are never reused.
    tasks: Vec<Task>,
    num_tasks: usize,
    next_arrival: u32,

    queue: ReadyQueue,
    current: Option<Pid>,
    /// Frame of whatever ran before the first task (the boot loop),
    /// resumed while no task is runnable.
    idle: Option<ContextPtr>,

    /// While set, timer interrupts do not reschedule.
    latch: bool,

    collatz: Option<Pid>,
    blocked_for_collatz: Option<Pid>,
    collatz_ticks: Option<u32>,
}

impl<C: Console, const N: usize> TaskManager<C, N> {
    pub fn new(config: KernelConfig, segments: Segments, console: C) -> Self {
        Self {
            config,
            segments,
            console,
            tasks: (0..N).map(|_| Task::empty()).collect(),
            num_tasks: 0,
            next_arrival: 1,
            queue: ReadyQueue::new(config.scheduler, N),
            current: None,
            idle: None,
            latch: false,
            collatz: None,
            blocked_for_collatz: None,
            collatz_ticks: None,
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    /// Admitted tasks, indexed by pid.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks[..self.num_tasks]
    }

    pub fn task(&self, pid: Pid) -> Option<&Task> {
        self.tasks().get(pid)
    }

    pub fn num_tasks(&self) -> usize {
        self.num_tasks
    }

    pub fn queue(&self) -> &ReadyQueue {
        &self.queue
    }

    pub fn current(&self) -> Option<Pid> {
        self.current
    }

    pub fn current_task(&self) -> Option<&Task> {
        self.current.map(|pid| &self.tasks[pid])
    }

    pub fn context_ptr(&mut self, pid: Pid) -> Option<ContextPtr> {
        if pid < self.num_tasks {
            Some(self.tasks[pid].context_ptr())
        } else {
            None
        }
    }

    pub fn is_latched(&self) -> bool {
        self.latch
    }

    pub fn collatz_ticks(&self) -> Option<u32> {
        self.collatz_ticks
    }

    /// Copy `template` into the next free slot and queue it.
    pub fn admit(&mut self, template: &Task, priority: Priority, ppid: Option<Pid>) -> SchedResult<Pid> {
        let pid = self.reserve()?;
        self.tasks[pid].copy_from(template);
        Ok(self.finish_admit(pid, priority, ppid))
    }

    /// Admit the init task: highest priority, no parent.
    pub fn bootstrap(&mut self, entry: u64) -> SchedResult<Pid> {
        let init = Task::new(entry, self.segments);
        let pid = self.admit(&init, Priority::High, None)?;
        debug!("[Ember::Sched] init is pid {} at {:#x}", pid, entry);
        Ok(pid)
    }

    pub fn fork(&mut self, frame: ContextPtr) -> SchedResult<Pid> {
        let parent = self.running()?;
        self.tasks[parent].save_context(frame);

        let child = match self.reserve() {
            Ok(child) => child,
            Err(err) => {
                self.tasks[parent].set_fork_pid(None);
                self.set_result(parent, frame, NO_PID);
                return Err(err);
            }
        };

        // SAFETY: `frame` is the live trap frame of this call.
        let cpu = unsafe { frame.with(|cpu| *cpu) };
        let (admitted, free) = self.tasks.split_at_mut(child);
        let (p, c) = (&admitted[parent], &mut free[0]);
        c.copy_from(p);
        c.overwrite_context(&cpu);
        c.rebase_from(p);
        c.context_mut().set_return(0);

        let priority = p.priority();
        self.finish_admit(child, priority, Some(parent));

        self.tasks[child].set_fork_pid(Some(0));
        self.tasks[parent].set_fork_pid(Some(child));
        self.set_result(parent, frame, child as u64);

        debug!("[Ember::Sched] pid {} forked pid {}", parent, child);
        Ok(child)
    }

    /// Restart the caller at `entry`. Never blocks and leaves the queue alone.
    pub fn execve(&mut self, entry: u64, frame: ContextPtr) -> ContextPtr {
        let Ok(pid) = self.running() else {
            return frame;
        };
        let segments = self.segments;
        self.tasks[pid].reset(entry, segments);
        debug!("[Ember::Sched] pid {} exec at {:#x}", pid, entry);
        self.tasks[pid].context_ptr()
    }

    pub fn waitpid(&mut self, target: WaitTarget, frame: ContextPtr) -> ContextPtr {
        let Ok(pid) = self.running() else {
            return frame;
        };
        self.tasks[pid].save_context(frame);

        match self.find_child(pid, target) {
            Ok(Some(child)) => {
                self.tasks[child].set_collected();
                debug!("[Ember::Sched] pid {} collected pid {}", pid, child);
                self.set_result(pid, frame, child as u64);
                frame
            }
            Ok(None) => {
                let task = &mut self.tasks[pid];
                task.set_state(TaskState::Blocked);
                task.set_wait(Some(target));
                trace!("[Ember::Sched] pid {} waits for {:?}", pid, target);
                self.reschedule(frame)
            }
            Err(err) => {
                debug!("[Ember::Sched] pid {} waitpid({:?}): {}", pid, target, err);
                self.tasks[pid].set_wait(None);
                self.set_result(pid, frame, NO_PID);
                frame
            }
        }
    }

    pub fn exit(&mut self, frame: ContextPtr) -> ContextPtr {
        let Ok(pid) = self.running() else {
            return frame;
        };
        self.tasks[pid].set_state(TaskState::Terminated);
        debug!("[Ember::Sched] pid {} exited", pid);

        if let Some(parent) = self.tasks[pid].ppid() {
            let waiting = self.tasks[parent].wait().is_some_and(|w| w.matches(pid));
            if waiting {
                self.tasks[pid].set_collected();
                self.tasks[parent].set_wait(None);
                self.tasks[parent].context_mut().set_return(pid as u64);
                self.enqueue(parent);
                debug!("[Ember::Sched] pid {} woke parent {}", pid, parent);
            }
        }

        if self.collatz == Some(pid) {
            if let Some(blocked) = self.blocked_for_collatz.take() {
                self.collatz = None;
                self.enqueue(blocked);
                debug!("[Ember::Sched] collatz done, pid {} released", blocked);
            }
        }

        if self.config.table_print == TablePrint::OnlyOnTermination {
            self.print_table();
        }

        self.reschedule(frame)
    }

    /// Park the caller until the collatz task terminates.
    pub fn block_for_collatz(&mut self, frame: ContextPtr) -> ContextPtr {
        let Ok(pid) = self.running() else {
            return frame;
        };
        let pending = self
            .collatz
            .is_some_and(|c| c != pid && self.tasks[c].state() != TaskState::Terminated);
        if !pending {
            debug!("[Ember::Sched] pid {} has no collatz task to wait for", pid);
            return frame;
        }
        self.tasks[pid].save_context(frame);
        self.tasks[pid].set_state(TaskState::Blocked);
        self.blocked_for_collatz = Some(pid);
        self.reschedule(frame)
    }

    /// Tag the most recently admitted task as the collatz task.
    pub fn collatz_added(&mut self) {
        if self.num_tasks > 0 {
            self.collatz = Some(self.num_tasks - 1);
            self.collatz_ticks = Some(0);
        }
    }

    pub fn set_last_admitted_priority(&mut self, priority: Priority) {
        if self.num_tasks > 0 {
            self.change_priority(self.num_tasks - 1, priority);
        }
    }

    pub fn set_schedule_latch(&mut self, on: bool) {
        self.latch = on;
    }

    /// The scheduling decision made on every timer interrupt.
    pub fn schedule(&mut self, frame: ContextPtr) -> ContextPtr {
        if self.num_tasks == 0 || self.latch {
            return frame;
        }

        self.advance_collatz_clock();

        match self.current {
            Some(pid) if self.tasks[pid].state() == TaskState::Running => {
                self.tasks[pid].save_context(frame);
                self.enqueue(pid);
            }
            Some(_) => {}
            None => self.idle = Some(frame),
        }

        self.reschedule(frame)
    }

    /// Pick the head of the ready queue and make it the running task.
    fn reschedule(&mut self, frame: ContextPtr) -> ContextPtr {
        let previous = self.current;

        let Some(next) = self.queue.pop() else {
            self.current = None;
            debug!("[Ember::Sched] nothing runnable");
            return self.idle.unwrap_or(frame);
        };

        self.tasks[next.pid].set_state(TaskState::Running);
        self.current = Some(next.pid);
        trace!("[Ember::Sched] switching {:?} -> {}", previous, next.pid);

        let print = match self.config.table_print {
            TablePrint::EveryTick => true,
            TablePrint::EverySwitch => previous != Some(next.pid),
            TablePrint::OnlyOnTermination | TablePrint::Never => false,
        };
        if print {
            self.print_table();
        }

        self.tasks[next.pid].context_ptr()
    }

    fn advance_collatz_clock(&mut self) {
        let Some(ticks) = self.collatz_ticks else {
            return;
        };
        let ticks = ticks.saturating_add(1);

        if ticks == COLLATZ_TRIGGER_TICKS {
            match self.config.scenario {
                Scenario::CollatzEscalation => {
                    self.print_checkpoint();
                    self.collatz_ticks = Some(ticks);
                    if let Some(collatz) = self.collatz {
                        if self.tasks[collatz].state() != TaskState::Terminated {
                            self.change_priority(collatz, Priority::High);
                            debug!("[Ember::Sched] collatz pid {} escalated", collatz);
                        }
                    }
                    if self.config.table_print != TablePrint::Never {
                        self.print_table();
                    }
                }
                Scenario::CollatzRendezvous => {
                    if let Some(blocked) = self.blocked_for_collatz.take() {
                        self.print_checkpoint();
                        self.enqueue(blocked);
                        debug!("[Ember::Sched] pid {} released before collatz finished", blocked);
                    }
                }
                _ => {}
            }
        }

        self.collatz_ticks = Some(ticks);
    }

    fn print_checkpoint(&mut self) {
        if self.config.table_print == TablePrint::Never {
            return;
        }
        // Console output is best effort.
        let _ = writeln!(
            self.console,
            "BEFORE INTERRUPT {} AFTER COLLATZ (SEE TABLE BELOW):",
            COLLATZ_TRIGGER_TICKS
        );
        self.print_table();
    }

    fn print_table(&mut self) {
        let tasks = &self.tasks[..self.num_tasks];
        if render_table(&mut self.console, tasks, &self.queue, self.collatz_ticks).is_err() {
            warn!("[Ember::Sched] process table truncated");
        }
        if self.config.print_delay {
            self.console.pause();
        }
    }

    fn find_child(&self, parent: Pid, target: WaitTarget) -> SchedResult<Option<Pid>> {
        match target {
            WaitTarget::Any => {
                let mut children = self
                    .tasks()
                    .iter()
                    .filter(|t| t.is_child_of(parent) && !t.is_collected())
                    .peekable();
                if children.peek().is_none() {
                    return Err(SchedError::NoChildren);
                }
                Ok(children
                    .find(|t| t.state() == TaskState::Terminated)
                    .map(Task::pid))
            }
            WaitTarget::Child(pid) => {
                let child = self
                    .task(pid)
                    .filter(|t| t.is_child_of(parent) && !t.is_collected())
                    .ok_or(SchedError::InvalidTarget)?;
                Ok((child.state() == TaskState::Terminated).then_some(pid))
            }
        }
    }

    fn change_priority(&mut self, pid: Pid, priority: Priority) {
        let queued = self.queue.remove(pid).is_some();
        self.tasks[pid].set_priority(priority);
        if queued {
            self.enqueue(pid);
        }
    }

    fn enqueue(&mut self, pid: Pid) {
        let task = &mut self.tasks[pid];
        task.set_state(TaskState::Ready);
        self.queue.insert(ReadyEntry {
            pid,
            priority: task.priority(),
            arrival: task.arrival(),
        });
    }

    fn reserve(&self) -> SchedResult<Pid> {
        if self.num_tasks >= N {
            warn!("[Ember::Sched] task table full ({} tasks)", N);
            return Err(SchedError::Capacity);
        }
        Ok(self.num_tasks)
    }

    fn finish_admit(&mut self, pid: Pid, priority: Priority, ppid: Option<Pid>) -> Pid {
        self.tasks[pid].admit_as(pid, ppid, priority, self.next_arrival);
        self.num_tasks += 1;
        self.next_arrival += 1;
        self.enqueue(pid);
        debug!("[Ember::Sched] admitted pid {} ({}, parent {:?})", pid, priority, ppid);
        pid
    }

    fn running(&self) -> SchedResult<Pid> {
        self.current.ok_or_else(|| {
            warn!("[Ember::Sched] task operation with no running task");
            SchedError::NotRunning
        })
    }

    /// Write a syscall result into both the live frame and the saved copy.
    fn set_result(&mut self, pid: Pid, frame: ContextPtr, value: u64) {
        // SAFETY: `frame` is the live trap frame of this call.
        unsafe { frame.with(|cpu| cpu.set_return(value)) };
        self.tasks[pid].context_mut().set_return(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerPolicy;
    use alloc::string::String;
    use ember_abi::CpuState;

    #[derive(Default)]
    struct Sink(String);

    impl core::fmt::Write for Sink {
        fn write_str(&mut self, s: &str) -> core::fmt::Result {
            self.0.push_str(s);
            Ok(())
        }
    }

    impl Console for Sink {
        fn print_user(&mut self, _addr: u64) {}
    }

    const SEGMENTS: Segments = Segments { code: 0x38, stack: 0x30 };

    fn manager<const N: usize>(scheduler: SchedulerPolicy) -> TaskManager<Sink, N> {
        let config = KernelConfig {
            scheduler,
            table_print: TablePrint::Never,
            ..KernelConfig::DEFAULT
        };
        TaskManager::new(config, SEGMENTS, Sink::default())
    }

    #[test]
    fn empty_table_schedules_nothing() {
        let mut mgr = manager::<4>(SchedulerPolicy::RoundRobin);
        let mut cpu = CpuState::default();
        let frame = ContextPtr::from(&mut cpu);
        assert_eq!(mgr.schedule(frame), frame);
        assert_eq!(mgr.current(), None);
    }

    #[test]
    fn first_tick_runs_init() {
        let mut mgr = manager::<4>(SchedulerPolicy::RoundRobin);
        let init = mgr.bootstrap(0x1000).unwrap();

        let mut boot = CpuState::default();
        let resume = mgr.schedule(ContextPtr::from(&mut boot));

        assert_eq!(mgr.current(), Some(init));
        assert_eq!(mgr.task(init).unwrap().state(), TaskState::Running);
        assert_eq!(resume, mgr.context_ptr(init).unwrap());
        assert_eq!(mgr.task(init).unwrap().context().rip, 0x1000);
    }

    #[test]
    fn operations_without_running_task_are_ignored() {
        let mut mgr = manager::<4>(SchedulerPolicy::RoundRobin);
        mgr.bootstrap(0x1000).unwrap();

        let mut cpu = CpuState { rax: 57, ..CpuState::default() };
        let frame = ContextPtr::from(&mut cpu);
        assert_eq!(mgr.fork(frame), Err(SchedError::NotRunning));
        assert_eq!(mgr.exit(frame), frame);
        assert_eq!(mgr.num_tasks(), 1);
    }

    #[test]
    fn priority_change_requeues_only_ready_tasks() {
        let mut mgr = manager::<4>(SchedulerPolicy::PreemptivePriority);
        mgr.bootstrap(0x1000).unwrap();
        let mut boot = CpuState::default();
        mgr.schedule(ContextPtr::from(&mut boot));

        let mut cpu = CpuState::default();
        let a = mgr.fork(ContextPtr::from(&mut cpu)).unwrap();
        let b = mgr.fork(ContextPtr::from(&mut cpu)).unwrap();
        mgr.change_priority(a, Priority::Low);
        assert_eq!(mgr.queue().pids().collect::<Vec<_>>(), [b, a]);

        mgr.set_last_admitted_priority(Priority::Low);
        assert_eq!(mgr.task(b).unwrap().priority(), Priority::Low);
        assert_eq!(mgr.queue().pids().collect::<Vec<_>>(), [a, b]);
        assert!(mgr.queue().is_priority_ordered());

        // The running init task only has its attribute changed.
        mgr.change_priority(0, Priority::Low);
        assert!(!mgr.queue().contains(0));
        assert_eq!(mgr.task(0).unwrap().priority(), Priority::Low);
    }

    #[test]
    fn frames_on_the_task_stack_are_used_in_place() {
        let mut mgr = manager::<4>(SchedulerPolicy::RoundRobin);
        mgr.bootstrap(0x1000).unwrap();
        let mut boot = CpuState::default();
        mgr.schedule(ContextPtr::from(&mut boot));

        // A trap taken while init runs leaves its frame on init's stack.
        let base = mgr.task(0).unwrap().stack_range().start;
        let raw = (base + 2048) as *mut CpuState;
        // SAFETY: 2048 bytes into init's 16-aligned stack, in bounds.
        unsafe {
            raw.write(CpuState {
                rip: 0x1234,
                rsp: (base + 2216) as u64,
                rbp: (base + 3000) as u64,
                r12: 9,
                ..CpuState::default()
            });
        }
        let frame = unsafe { ContextPtr::from_raw(raw) }.unwrap();

        let child = mgr.fork(frame).unwrap();
        assert_eq!(child, 1);
        assert_eq!(unsafe { (*raw).rax }, 1);
        assert_eq!(mgr.context_ptr(0), Some(frame));

        let child_base = mgr.task(child).unwrap().stack_range().start;
        let ctx = *mgr.task(child).unwrap().context();
        assert_eq!(ctx.rax, 0);
        assert_eq!(ctx.rip, 0x1234);
        assert_eq!(ctx.r12, 9);
        assert_eq!(ctx.rsp as usize - child_base, 2216);
        assert_eq!(ctx.rbp as usize - child_base, 3000);
        let child_frame = mgr.context_ptr(child).unwrap();
        assert_eq!(child_frame.addr() - child_base, 2048);

        // The parent blocks on its in-place frame and the child runs.
        assert_eq!(mgr.waitpid(WaitTarget::Child(child), frame), child_frame);
        assert_eq!(mgr.task(0).unwrap().state(), TaskState::Blocked);

        // Exiting wakes the parent with the child's pid in that same frame.
        assert_eq!(mgr.exit(child_frame), frame);
        assert_eq!(mgr.current(), Some(0));
        assert_eq!(unsafe { (*raw).rax }, 1);
        assert_eq!(unsafe { (*raw).rip }, 0x1234);
        assert!(mgr.task(child).unwrap().is_collected());
    }
}
