use core::arch::global_asm;

use ember_abi::CpuState;
use ember_core::ContextPtr;

use crate::globals::KERNEL;
use crate::interrupts;

// Trap entry for the vectors that can switch tasks.
//
// Every stub builds a `CpuState` on the interrupted stack (the CPU pushes
// ss..rip, the stub pushes a zero error code and the general purpose
// registers), hands its address to `handle_trap` and resumes whichever
// frame comes back.
global_asm!(r#"
.macro PUSH_FRAME
    push 0
    push r15
    push r14
    push r13
    push r12
    push r11
    push r10
    push r9
    push r8
    push rbp
    push rdi
    push rsi
    push rdx
    push rcx
    push rbx
    push rax
.endm

.macro TRAP_STUB name, vector
.global \name
\name:
    PUSH_FRAME
    mov esi, \vector
    jmp trap_common
.endm

TRAP_STUB trap_timer, 0x20
TRAP_STUB trap_syscall, 0x80

trap_common:
    mov rdi, rsp
    and rsp, -16
    cld
    call handle_trap
    mov rsp, rax
    pop rax
    pop rbx
    pop rcx
    pop rdx
    pop rsi
    pop rdi
    pop rbp
    pop r8
    pop r9
    pop r10
    pop r11
    pop r12
    pop r13
    pop r14
    pop r15
    add rsp, 8
    iretq
"#);

extern "C" {
    pub fn trap_timer();
    pub fn trap_syscall();
}

#[no_mangle]
extern "C" fn handle_trap(frame: *mut CpuState, vector: u64) -> *mut CpuState {
    // SAFETY: the stub passes the frame it just pushed.
    let Some(frame) = (unsafe { ContextPtr::from_raw(frame) }) else {
        return frame;
    };
    let vector = vector as u8;

    let next = match KERNEL.try_lock() {
        Some(mut guard) => match guard.as_mut() {
            Some(kernel) => Some(kernel.table.dispatch(vector, &mut kernel.tasks, frame)),
            None => None,
        },
        None => None,
    };

    match next {
        Some(next) => next.as_ptr(),
        None => {
            log::trace!("[Ember::Trap] kernel busy, vector {:#x} dropped", vector);
            interrupts::acknowledge(vector);
            frame.as_ptr()
        }
    }
}
