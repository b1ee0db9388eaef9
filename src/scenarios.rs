//! Init tasks, one per boot scenario

use core::arch::x86_64::_rdtsc;

use ember_abi::Priority;
use ember_core::Scenario;

use crate::programs::{self, binary_search, collatz, linear_search, long_running};
use crate::usercall::{self, uprintln, Program};

pub fn init_entry(scenario: Scenario) -> Program {
    match scenario {
        Scenario::ForkWaitAll => fork_wait_all,
        Scenario::UniformBatch => uniform_batch,
        Scenario::MixedBatch => mixed_batch,
        Scenario::CollatzRendezvous => collatz_rendezvous,
        Scenario::CollatzEscalation => collatz_escalation,
    }
}

/// Fork a child that immediately replaces itself with `program`.
fn spawn(program: Program) -> bool {
    if usercall::fork().is_none() {
        uprintln!("fork failed: task table full");
        return false;
    }
    if usercall::fork_pid() == Some(0) {
        usercall::execve(program);
    }
    true
}

fn spawn_at(program: Program, priority: Priority) {
    if spawn(program) {
        usercall::set_last_admitted_priority(priority);
    }
}

fn reap_all() -> ! {
    while usercall::wait_any().is_some() {}
    uprintln!("All programs terminated");
    loop {
        core::hint::spin_loop();
    }
}

fn random_program_index() -> usize {
    // SAFETY: rdtsc has no side effects.
    let tsc = unsafe { _rdtsc() };
    (tsc.wrapping_mul(345_834).wrapping_add(123_456) / 23_415) as usize % programs::ALL.len()
}

extern "C" fn fork_wait_all() -> ! {
    for _ in 0..3 {
        spawn(collatz);
    }
    for _ in 0..3 {
        spawn(long_running);
    }
    reap_all()
}

extern "C" fn uniform_batch() -> ! {
    let pick = random_program_index();
    uprintln!("Random number: {}", pick);
    for _ in 0..10 {
        spawn(programs::ALL[pick]);
    }
    reap_all()
}

extern "C" fn mixed_batch() -> ! {
    let first = random_program_index();
    uprintln!("Random number1: {}", first);
    let mut second = first;
    while second == first {
        second = random_program_index();
    }
    uprintln!("Random number2: {}", second);

    for _ in 0..3 {
        spawn(programs::ALL[first]);
    }
    for _ in 0..3 {
        spawn(programs::ALL[second]);
    }
    reap_all()
}

extern "C" fn collatz_rendezvous() -> ! {
    spawn_at(collatz, Priority::Low);
    usercall::collatz_added();
    usercall::block_for_collatz();

    spawn_at(long_running, Priority::Low);
    spawn_at(binary_search, Priority::Low);
    spawn_at(linear_search, Priority::Low);
    reap_all()
}

extern "C" fn collatz_escalation() -> ! {
    usercall::set_schedule_latch(true);

    spawn_at(collatz, Priority::Low);
    usercall::collatz_added();
    spawn_at(long_running, Priority::Medium);
    spawn_at(binary_search, Priority::Medium);
    spawn_at(linear_search, Priority::Medium);

    usercall::set_schedule_latch(false);
    reap_all()
}
