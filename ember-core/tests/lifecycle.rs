mod common;

use common::{config, Machine, INIT_ENTRY};
use ember_abi::syscall::numbers::*;
use ember_abi::syscall::{NO_PID, WAIT_ANY};
use ember_abi::Priority;
use ember_core::{SchedulerPolicy, TaskState, WaitTarget};

#[test]
fn fork_duplicates_the_caller() {
    let mut m = Machine::<16>::booted(config(SchedulerPolicy::RoundRobin));
    m.cpu.r12 = 0xdead;
    m.cpu.rbp = m.cpu.rsp - 0x40;
    let (rsp, rbp) = (m.cpu.rsp as usize, m.cpu.rbp as usize);

    assert_eq!(m.fork(), 1);
    assert_eq!(m.running(), Some(0));
    assert_eq!(m.fork_pid(), 1);

    let parent = m.tasks.task(0).unwrap();
    let child = m.tasks.task(1).unwrap();
    let (pbase, cbase) = (parent.stack_range().start, child.stack_range().start);
    assert_eq!(child.ppid(), Some(0));
    assert_eq!(child.priority(), Priority::High);
    assert_eq!(child.state(), TaskState::Ready);
    assert_eq!(child.fork_pid(), Some(0));
    assert_eq!(child.context().rip, INIT_ENTRY);
    assert_eq!(child.context().r12, 0xdead);
    assert_eq!(child.context().rax, 0);
    assert_eq!(child.context().rsp as usize - cbase, rsp - pbase);
    assert_eq!(child.context().rbp as usize - cbase, rbp - pbase);

    m.tick();
    assert_eq!(m.running(), Some(1));
    assert_eq!(m.cpu.rax, 0);
    assert_eq!(m.cpu.r12, 0xdead);
    assert_eq!(m.fork_pid(), 0);
}

#[test]
fn round_robin_rotates_through_ready_tasks() {
    let mut m = Machine::<16>::booted(config(SchedulerPolicy::RoundRobin));
    m.fork();
    m.fork();
    assert_eq!(m.queue(), [1, 2]);

    let mut order = Vec::new();
    for _ in 0..6 {
        m.tick();
        order.push(m.running().unwrap());
        assert_eq!(m.tasks.queue().len(), 2);
    }
    assert_eq!(order, [1, 2, 0, 1, 2, 0]);
}

#[test]
fn priority_order_decides_who_runs() {
    let mut m = Machine::<16>::booted(config(SchedulerPolicy::PreemptivePriority));
    let low = m.spawn(Priority::Low);
    let medium = m.spawn(Priority::Medium);
    let high = m.spawn(Priority::High);
    assert_eq!(m.queue(), [high, medium, low]);
    assert!(m.tasks.queue().is_priority_ordered());

    // init is High and arrived first, so it keeps the CPU.
    m.tick();
    assert_eq!(m.running(), Some(0));
    assert!(m.tasks.queue().is_priority_ordered());

    let mut reaped = Vec::new();
    loop {
        let pid = m.waitpid(WAIT_ANY);
        if pid == NO_PID {
            break;
        }
        // The wait blocked: let the chosen child run one tick, then exit.
        assert_ne!(m.running(), Some(0));
        let child = m.running().unwrap();
        m.tick();
        assert_eq!(m.running(), Some(child));
        assert!(m.tasks.queue().is_priority_ordered());
        m.exit();
        assert_eq!(m.running(), Some(0));
        reaped.push(m.cpu.rax as usize);
    }
    assert_eq!(reaped, [high, medium, low]);
}

#[test]
fn wait_collects_a_terminated_child_immediately() {
    let mut m = Machine::<16>::booted(config(SchedulerPolicy::RoundRobin));
    let child = m.fork();
    m.tick();
    assert_eq!(m.running(), Some(1));
    m.exit();
    assert_eq!(m.running(), Some(0));
    assert_eq!(m.tasks.task(1).unwrap().state(), TaskState::Terminated);

    assert_eq!(m.waitpid(child), child);
    assert_eq!(m.running(), Some(0));
    assert!(m.tasks.task(1).unwrap().is_collected());

    // Already collected.
    assert_eq!(m.waitpid(child), NO_PID);
    assert_eq!(m.waitpid(WAIT_ANY), NO_PID);
}

#[test]
fn wait_blocks_until_the_child_exits() {
    let mut m = Machine::<16>::booted(config(SchedulerPolicy::RoundRobin));
    let child = m.fork();

    m.waitpid(child);
    assert_eq!(m.running(), Some(1));
    let init = m.tasks.task(0).unwrap();
    assert_eq!(init.state(), TaskState::Blocked);
    assert_eq!(init.wait(), Some(WaitTarget::Child(1)));
    assert!(m.tasks.queue().is_empty());

    m.tick();
    assert_eq!(m.running(), Some(1));

    m.exit();
    assert_eq!(m.running(), Some(0));
    assert_eq!(m.cpu.rax, child);
    assert_eq!(m.tasks.task(0).unwrap().wait(), None);
    assert!(m.tasks.task(1).unwrap().is_collected());
}

#[test]
fn wait_for_one_child_ignores_the_others() {
    let mut m = Machine::<16>::booted(config(SchedulerPolicy::RoundRobin));
    m.fork();
    m.fork();

    m.waitpid(2);
    assert_eq!(m.running(), Some(1));
    m.exit();
    assert_eq!(m.running(), Some(2));
    assert_eq!(m.tasks.task(0).unwrap().state(), TaskState::Blocked);

    m.exit();
    assert_eq!(m.running(), Some(0));
    assert_eq!(m.cpu.rax, 2);

    // Pid 1 is still waiting to be collected.
    assert_eq!(m.waitpid(WAIT_ANY), 1);
}

#[test]
fn wait_without_children_returns_at_once() {
    let mut m = Machine::<16>::booted(config(SchedulerPolicy::RoundRobin));
    assert_eq!(m.waitpid(WAIT_ANY), NO_PID);
    assert_eq!(m.waitpid(5), NO_PID);
    assert_eq!(m.running(), Some(0));
    assert_eq!(m.tasks.task(0).unwrap().state(), TaskState::Running);
}

#[test]
fn wait_any_takes_the_lowest_terminated_pid() {
    let mut m = Machine::<16>::booted(config(SchedulerPolicy::RoundRobin));
    for _ in 0..3 {
        m.fork();
    }

    m.tick();
    m.tick();
    m.tick();
    assert_eq!(m.running(), Some(3));
    m.exit();
    assert_eq!(m.running(), Some(0));
    m.tick();
    m.tick();
    assert_eq!(m.running(), Some(2));
    m.exit();
    assert_eq!(m.running(), Some(0));

    // pid 3 terminated first, but the scan goes by pid.
    assert_eq!(m.waitpid(WAIT_ANY), 2);
    assert_eq!(m.waitpid(WAIT_ANY), 3);
    assert_eq!(m.waitpid(2), NO_PID);
    assert_eq!(m.running(), Some(0));
    assert!(!m.tasks.task(1).unwrap().is_collected());
}

#[test]
fn wait_rejects_pids_that_are_not_children() {
    let mut m = Machine::<16>::booted(config(SchedulerPolicy::RoundRobin));
    m.fork();
    m.fork();
    m.tick();
    assert_eq!(m.running(), Some(1));

    // Sibling, self and parent.
    assert_eq!(m.waitpid(2), NO_PID);
    assert_eq!(m.waitpid(1), NO_PID);
    assert_eq!(m.waitpid(0), NO_PID);
    assert_eq!(m.waitpid(WAIT_ANY), NO_PID);
    assert_eq!(m.running(), Some(1));
    assert_eq!(m.tasks.task(1).unwrap().wait(), None);
}

#[test]
fn fork_fails_cleanly_when_the_table_is_full() {
    let mut m = Machine::<3>::booted(config(SchedulerPolicy::RoundRobin));
    assert_eq!(m.fork(), 1);
    assert_eq!(m.fork(), 2);

    assert_eq!(m.fork(), NO_PID);
    assert_eq!(m.fork_pid(), NO_PID);
    assert_eq!(m.tasks.num_tasks(), 3);
    assert_eq!(m.queue(), [1, 2]);
    assert_eq!(m.running(), Some(0));
}

#[test]
fn execve_restarts_the_caller() {
    let mut m = Machine::<16>::booted(config(SchedulerPolicy::RoundRobin));
    m.fork();
    m.tick();
    assert_eq!(m.running(), Some(1));
    m.cpu.r12 = 7;

    m.syscall(SYS_EXECVE, 0x4000);
    let child = m.tasks.task(1).unwrap();
    assert_eq!(m.running(), Some(1));
    assert_eq!(m.cpu.rip, 0x4000);
    assert_eq!(m.cpu.r12, 0);
    assert_eq!(m.cpu.rsp as usize, child.stack_range().end - 8);
    assert_eq!(child.ppid(), Some(0));
    assert_eq!(m.queue(), [0]);
}

#[test]
fn idle_frame_resumes_when_nothing_is_runnable() {
    let mut m = Machine::<16>::booted(config(SchedulerPolicy::RoundRobin));
    m.exit();
    assert_eq!(m.running(), None);
    assert_eq!(m.cpu.rip, 0xb007);

    m.tick();
    assert_eq!(m.running(), None);
    assert_eq!(m.cpu.rip, 0xb007);
}

#[test]
fn latch_holds_the_running_task() {
    let mut m = Machine::<16>::booted(config(SchedulerPolicy::RoundRobin));
    m.fork();
    m.syscall(SYS_SET_SCHEDULE_LATCH, 1);
    assert!(m.tasks.is_latched());
    for _ in 0..3 {
        m.tick();
        assert_eq!(m.running(), Some(0));
    }

    m.syscall(SYS_SET_SCHEDULE_LATCH, 0);
    m.tick();
    assert_eq!(m.running(), Some(1));
}

#[test]
fn print_and_bad_syscalls() {
    let mut m = Machine::<16>::booted(config(SchedulerPolicy::PreemptivePriority));
    m.syscall(SYS_PRINT, 0x5000);
    assert_eq!(m.tasks.console().printed, [0x5000]);

    assert_eq!(m.syscall(999, 0), 999);
    m.fork();
    m.syscall(SYS_SET_LAST_ADMITTED_PRIORITY, 9);
    assert_eq!(m.tasks.task(1).unwrap().priority(), Priority::High);
    assert_eq!(m.running(), Some(0));
}
