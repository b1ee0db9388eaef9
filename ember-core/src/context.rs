//! Handle to a saved register image

use core::ptr::NonNull;
use ember_abi::CpuState;

/// Pointer to a `CpuState` that is about to be resumed or was just
/// interrupted.
///
/// Trap frames live on the stack of whatever was interrupted, usually the
/// private stack of a task, so the scheduler passes them around as raw
/// pointers and only dereferences them for the duration of a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextPtr(NonNull<CpuState>);

// SAFETY: there is a single executor; a ContextPtr is only dereferenced
// inside task manager calls, which the kernel serializes behind one lock.
unsafe impl Send for ContextPtr {}

impl ContextPtr {
    /// # Safety
    /// `ptr` must point to a `CpuState` that stays valid for as long as the
    /// returned handle is used.
    pub unsafe fn from_raw(ptr: *mut CpuState) -> Option<Self> {
        NonNull::new(ptr).map(ContextPtr)
    }

    pub fn as_ptr(self) -> *mut CpuState {
        self.0.as_ptr()
    }

    pub fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }

    /// # Safety
    /// The frame must be valid and not otherwise borrowed during the call.
    pub(crate) unsafe fn with<R>(self, f: impl FnOnce(&mut CpuState) -> R) -> R {
        f(&mut *self.0.as_ptr())
    }
}

impl From<&mut CpuState> for ContextPtr {
    fn from(cpu: &mut CpuState) -> Self {
        ContextPtr(NonNull::from(cpu))
    }
}
