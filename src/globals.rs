use ember_core::trap::InterruptTable;
use ember_core::TaskManager;
use lazy_static::lazy_static;
use spin::Mutex;

use crate::console::LogConsole;

pub type Tasks = TaskManager<LogConsole>;

/// Everything the trap path needs.
pub struct Kernel {
    pub tasks: Tasks,
    pub table: InterruptTable<'static, Tasks>,
}

lazy_static! {
    pub static ref KERNEL: Mutex<Option<Kernel>> = Mutex::new(None);
}

pub fn install(tasks: Tasks) {
    let table = crate::interrupts::handler_table();
    *KERNEL.lock() = Some(Kernel { tasks, table });
}
