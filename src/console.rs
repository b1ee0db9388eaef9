//! Console sink
//!
//! Process tables and task output are collected into lines and forwarded to
//! the UEFI logger, one `log::info!` per line.

use core::fmt;

use ember_core::{Console, LineBuffer};

/// Longest string a task may hand to the `print` syscall.
const MAX_USER_STRING: usize = 256;

/// Longest line handed to the logger; longer lines are split. Fits a ready
/// queue of every pid.
const LINE_CAPACITY: usize = 1024;

/// Spin iterations per `pause`.
const PAUSE_SPINS: usize = 50_000_000;

pub struct LogConsole {
    line: LineBuffer<LINE_CAPACITY>,
}

impl LogConsole {
    pub fn new() -> Self {
        Self { line: LineBuffer::new() }
    }
}

fn emit(line: &str) {
    log::info!("{}", line);
}

impl fmt::Write for LogConsole {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.line.feed(s, emit);
        Ok(())
    }
}

impl Console for LogConsole {
    fn print_user(&mut self, addr: u64) {
        if addr == 0 {
            log::warn!("[Ember::Console] print from null pointer");
            return;
        }
        let ptr = addr as *const u8;
        // SAFETY: tasks share the kernel address space; the scan stops at
        // NUL or MAX_USER_STRING bytes.
        let bytes = unsafe {
            let len = (0..MAX_USER_STRING)
                .position(|i| *ptr.add(i) == 0)
                .unwrap_or(MAX_USER_STRING);
            core::slice::from_raw_parts(ptr, len)
        };
        self.line.feed_bytes(bytes, emit);
    }

    fn pause(&mut self) {
        for _ in 0..PAUSE_SPINS {
            core::hint::spin_loop();
        }
    }
}
