use lazy_static::lazy_static;
use x86_64::instructions::port::Port;
use x86_64::structures::idt::{InterruptDescriptorTable, InterruptStackFrame};
use x86_64::VirtAddr;
use pic8259::ChainedPics;
use spin::Mutex;
use log::{info, error};

use ember_core::trap::{InterruptHandler, InterruptTable, SyscallHandler, TimerHandler};
use ember_core::ContextPtr;

use crate::globals::Tasks;
use crate::multitasking::{trap_syscall, trap_timer};

pub const PIC_1_OFFSET: u8 = 32;
pub const PIC_2_OFFSET: u8 = PIC_1_OFFSET + 8;

pub static PICS: Mutex<ChainedPics> =
    Mutex::new(unsafe { ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET) });

#[derive(Debug, Clone, Copy)]
#[repr(u8)]
pub enum InterruptIndex {
    Timer = PIC_1_OFFSET,
}

impl InterruptIndex {
    fn as_u8(self) -> u8 {
        self as u8
    }

    fn as_usize(self) -> usize {
        usize::from(self.as_u8())
    }
}

lazy_static! {
    static ref IDT: InterruptDescriptorTable = {
        let mut idt = InterruptDescriptorTable::new();
        idt.breakpoint.set_handler_fn(breakpoint_handler);
        idt.double_fault.set_handler_fn(double_fault_handler);
        idt.general_protection_fault.set_handler_fn(general_protection_fault_handler);

        // Both stubs build a full CpuState and may return into another task.
        unsafe {
            idt[InterruptIndex::Timer.as_usize()]
                .set_handler_addr(VirtAddr::new(trap_timer as usize as u64));
            idt[usize::from(SyscallHandler::VECTOR)]
                .set_handler_addr(VirtAddr::new(trap_syscall as usize as u64));
        }

        idt
    };
}

/// Timer tick as seen by the kernel: schedule, then acknowledge the PIC.
struct PicTimer;

impl InterruptHandler<Tasks> for PicTimer {
    fn handle(&self, tasks: &mut Tasks, frame: ContextPtr) -> ContextPtr {
        let next = TimerHandler.handle(tasks, frame);
        acknowledge(InterruptIndex::Timer.as_u8());
        next
    }
}

static TIMER: PicTimer = PicTimer;
static SYSCALL: SyscallHandler = SyscallHandler;

pub fn handler_table() -> InterruptTable<'static, Tasks> {
    let mut table: InterruptTable<'static, Tasks> = InterruptTable::new();
    table.register(InterruptIndex::Timer.as_u8(), &TIMER);
    table.register(SyscallHandler::VECTOR, &SYSCALL);
    table
}

/// Send EOI for PIC vectors; anything else needs none.
pub fn acknowledge(vector: u8) {
    if vector == InterruptIndex::Timer.as_u8() {
        unsafe {
            PICS.lock().notify_end_of_interrupt(vector);
        }
    }
}

// PIT defaults to 18.2Hz; run it at ~100Hz.
pub fn init_pit() {
    let mut command_port = Port::<u8>::new(0x43);
    let mut data_port = Port::<u8>::new(0x40);

    // 0x34: Channel 0, Lo/Hi Byte, Rate Generator (Mode 2), Binary
    unsafe { command_port.write(0x34) };

    // 1193182 / 100 Hz = 11931
    let divisor = 11931u16;
    unsafe {
        data_port.write((divisor & 0xFF) as u8);
        data_port.write((divisor >> 8) as u8);
    }
}

pub fn init_idt() {
    info!("[Ember::Interrupts] Initializing IDT...");
    IDT.load();
    unsafe {
        PICS.lock().initialize();
        // Only IRQ0 (timer) is unmasked.
        Port::<u8>::new(0x21).write(0xFE);
        Port::<u8>::new(0xA1).write(0xFF);
    }
    init_pit();
    // Enable interrupts in main, not here, to avoid premature ticks.
}

extern "x86-interrupt" fn breakpoint_handler(
    stack_frame: InterruptStackFrame)
{
    info!("[EXCEPTION] BREAKPOINT\n{:#?}", stack_frame);
}

extern "x86-interrupt" fn double_fault_handler(
    stack_frame: InterruptStackFrame, _error_code: u64) -> !
{
    panic!("[EXCEPTION] DOUBLE FAULT\n{:#?}", stack_frame);
}

extern "x86-interrupt" fn general_protection_fault_handler(
    stack_frame: InterruptStackFrame, error_code: u64)
{
    error!("[EXCEPTION] GENERAL PROTECTION FAULT\nError Code: {}\n{:#?}", error_code, stack_frame);
    panic!("GPF");
}
