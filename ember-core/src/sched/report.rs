//! Process table rendering

use core::fmt::{self, Write};

use super::queue::ReadyQueue;
use super::task::Task;

const RULE: &str = "**********************************";

/// Dump every admitted task, the ready queue and the collatz decision
/// counter (`-1` while no collatz task is tagged).
pub fn render_table<W: Write + ?Sized>(
    out: &mut W,
    tasks: &[Task],
    queue: &ReadyQueue,
    collatz_ticks: Option<u32>,
) -> fmt::Result {
    writeln!(out, "{}", RULE)?;
    writeln!(out, "PID PPID  State       Priority  Arrival")?;
    for task in tasks {
        let ppid = task.ppid().map_or(-1, |p| p as i64);
        writeln!(
            out,
            "{:>3} {:>4}  {:<10}  {:<8}  {:>7}",
            task.pid(),
            ppid,
            task.state().name(),
            task.priority(),
            task.arrival()
        )?;
    }

    write!(out, "Ready queue PIDs:")?;
    for pid in queue.pids() {
        write!(out, " {}", pid)?;
    }
    writeln!(out)?;

    let ticks = collatz_ticks.map_or(-1, i64::from);
    writeln!(out, "Interrupt number after collatz: {}", ticks)?;
    writeln!(out, "{}", RULE)
}
