//! The signal-mask critical-section policy (spec.md §4.4).
//!
//! This is a scoped acquisition/release guard in the same shape as the
//! teacher's `sync::mutex::Mutex`/`MutexGuard`
//! (`examples/aticu-VeOS/src/sync/mutex.rs`) and `sync::PreemptionState`
//! (`examples/aticu-VeOS/kernel/src/sync/mod.rs`): entering blocks the
//! guarded signal and remembers the previous mask, and `Drop` restores it
//! unconditionally. Unlike the teacher's version there is no spin-wait or
//! atomic flag here — this library runs on exactly one OS thread, so the
//! only thing that could ever "contend" for the critical section is the
//! timer handler, and blocking `SIGVTALRM` is precisely what keeps it from
//! running while the section is open (spec.md §5).

use crate::error::fatal_os_error;
use std::mem::MaybeUninit;
use std::sync::OnceLock;

static VT_SET: OnceLock<libc::sigset_t> = OnceLock::new();

/// Builds the process-wide set containing only the virtual-timer signal.
/// Called once, from `init`.
pub(crate) fn install_vt_set() {
    let mut set = MaybeUninit::<libc::sigset_t>::uninit();
    unsafe {
        if libc::sigemptyset(set.as_mut_ptr()) != 0 || libc::sigaddset(set.as_mut_ptr(), libc::SIGVTALRM) != 0 {
            fatal_os_error!("constructing the virtual-timer signal set failed");
        }
    }
    let set = unsafe { set.assume_init() };
    let _ = VT_SET.set(set);
}

fn vt_set_ptr() -> *const libc::sigset_t {
    VT_SET.get().expect("critical section used before init") as *const libc::sigset_t
}

/// A guard that blocks the virtual-timer signal for its lifetime and
/// restores the previous mask when dropped.
///
/// Every library entry point that reads or writes the scheduler singleton
/// brackets that work in one of these (spec.md §4.4). On the voluntary-yield
/// paths (self-block, sleep, preemption) the guard simply keeps living on
/// the suspended thread's own stack across the context switch: when that
/// thread is switched back in, execution resumes right after the switch
/// call, inside the same guard's scope, and the mask it restores on drop is
/// whatever its *own* critical section blocked — which is exactly what
/// spec.md §4.4 requires. On the one-way self-terminate path the guard's
/// stack frame is abandoned for good (the thread is dead), so its `Drop`
/// never runs and never needs to.
pub struct CriticalSection {
    previous_mask: libc::sigset_t
}

impl CriticalSection {
    /// Blocks the virtual-timer signal, remembering the previous mask.
    pub fn enter() -> CriticalSection {
        let mut previous_mask = MaybeUninit::<libc::sigset_t>::uninit();
        unsafe {
            if libc::sigprocmask(libc::SIG_BLOCK, vt_set_ptr(), previous_mask.as_mut_ptr()) != 0 {
                fatal_os_error!("blocking the virtual-timer signal failed");
            }
            CriticalSection { previous_mask: previous_mask.assume_init() }
        }
    }
}

impl Drop for CriticalSection {
    fn drop(&mut self) {
        unsafe {
            if libc::sigprocmask(libc::SIG_SETMASK, &self.previous_mask, std::ptr::null_mut()) != 0 {
                fatal_os_error!("restoring the signal mask failed");
            }
        }
    }
}
