#![no_std]
#![no_main]
#![feature(abi_x86_interrupt)]

extern crate alloc;

mod console;
mod globals;
mod interrupts;
mod multitasking;
mod programs;
mod scenarios;
mod usercall;

use uefi::prelude::*;
use x86_64::registers::segmentation::{Segment, CS, SS};

use ember_core::{KernelConfig, Segments, TaskManager};

use crate::console::LogConsole;

#[entry]
fn main(_image_handle: Handle, mut system_table: SystemTable<Boot>) -> Status {
    if let Err(err) = uefi_services::init(&mut system_table) {
        return err.status();
    }
    let _ = system_table.stdout().reset(false);

    log::info!("Ember kernel booting...");

    // 1. Configuration
    let args = option_env!("EMBER_BOOT_ARGS").unwrap_or("");
    let config = match KernelConfig::parse(args) {
        Ok(config) => config,
        Err(err) => {
            log::warn!("[Ember::Kernel] bad boot arguments {:?} ({}), using defaults", args, err);
            KernelConfig::DEFAULT
        }
    };
    log::info!(
        "[Ember::Kernel] scheduler {:?}, scenario {:?}, tables {:?}",
        config.scheduler,
        config.scenario,
        config.table_print
    );

    // 2. Task Manager with the init task
    log::info!("[Ember::Kernel] Initializing Scheduler...");
    let segments = Segments {
        code: CS::get_reg().0,
        stack: SS::get_reg().0,
    };
    let mut tasks = TaskManager::new(config, segments, LogConsole::new());
    let init = scenarios::init_entry(config.scenario);
    if let Err(err) = tasks.bootstrap(init as usize as u64) {
        log::error!("[Ember::Kernel] cannot admit init: {}", err);
        return Status::ABORTED;
    }
    globals::install(tasks);

    // 3. Interrupts; the first tick switches to init.
    log::info!("[Ember::Kernel] Initializing Interrupts...");
    interrupts::init_idt();
    x86_64::instructions::interrupts::enable();

    // Idle loop, resumed whenever no task is runnable.
    loop {
        x86_64::instructions::hlt();
    }
}
