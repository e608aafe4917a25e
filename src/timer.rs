//! The timer driver (spec.md §4.5).
//!
//! Installs a handler for `SIGVTALRM` and arms `ITIMER_VIRTUAL` to fire
//! every `quantum_usec` microseconds. Grounded on the original C assignment
//! this spec distills from (`examples/original_source/uthreads.c`,
//! `install_timer_handler`/`arm_virtual_timer`), translated to the `libc`
//! crate instead of raw FFI declarations.

use crate::error::fatal_os_error;
use crate::scheduler;

extern "C" fn handle_virtual_timer(_signum: libc::c_int) {
    // The kernel delivers this with SIGVTALRM already masked (spec.md
    // §4.5 step 1); `schedule_next` runs with it blocked throughout.
    scheduler::on_timer_tick();
}

/// Installs the handler and arms the timer. Called once, from `init`.
pub(crate) fn install(quantum_usec: i64) {
    install_handler();
    arm(quantum_usec);
}

fn install_handler() {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handle_virtual_timer as usize;
        libc::sigemptyset(&mut action.sa_mask);
        action.sa_flags = 0;
        if libc::sigaction(libc::SIGVTALRM, &action, std::ptr::null_mut()) != 0 {
            fatal_os_error!("installing the virtual-timer handler failed");
        }
    }
}

fn arm(quantum_usec: i64) {
    let value = libc::timeval { tv_sec: quantum_usec / 1_000_000, tv_usec: quantum_usec % 1_000_000 };
    let timer = libc::itimerval { it_interval: value, it_value: value };
    unsafe {
        if libc::setitimer(libc::ITIMER_VIRTUAL, &timer, std::ptr::null_mut()) != 0 {
            fatal_os_error!("arming the virtual timer failed");
        }
    }
}

/// Disarms the timer. Used by `terminate(0)` before the process exits
/// (spec.md §4.6): there is no point taking one more tick on the way out.
pub(crate) fn disarm() {
    let zero = libc::timeval { tv_sec: 0, tv_usec: 0 };
    let timer = libc::itimerval { it_interval: zero, it_value: zero };
    unsafe {
        if libc::setitimer(libc::ITIMER_VIRTUAL, &timer, std::ptr::null_mut()) != 0 {
            fatal_os_error!("disarming the virtual timer failed");
        }
    }
}
