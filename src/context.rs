//! The context-switch primitive (spec.md §4.3).
//!
//! The teacher's version of this (`examples/aticu-VeOS/kernel/src/arch/x86_64/context.rs`)
//! is a hand-rolled, architecture-specific `Context` built from a naked-asm
//! `enter_thread` trampoline and raw stack-pointer pokes, because a kernel
//! has no `ucontext(3)` to call into. A userspace library does, and
//! spec.md §9 explicitly allows "whatever primitive the target platform
//! provides (fiber APIs, `ucontext`, or inline-asm)" as long as the
//! save/restore contract holds — so this keeps the teacher's shape (an
//! opaque `Context`, a `setup` constructor, a `switch` primitive, a
//! launcher that self-terminates on return) but realizes it with
//! `libc::ucontext_t` instead of naked asm.

use crate::config::STACK_SIZE;
use crate::error::fatal_os_error;
use std::mem::MaybeUninit;

/// An opaque saved execution context: stack pointer, program counter,
/// callee-saved registers and signal mask, exactly as spec.md §4.3
/// describes it. The signal mask is saved and restored by `ucontext_t`
/// itself (`uc_sigmask`), which is precisely the piece spec.md §4.4
/// requires to travel with the context across a switch.
pub struct Context {
    ctx: MaybeUninit<libc::ucontext_t>
}

impl Context {
    /// An empty, never-to-be-switched-into context. Used for slot 0, which
    /// never has one: the initial thread runs on the OS stack and its
    /// "context" is implicit in the C stack `swapcontext` runs on.
    pub fn empty() -> Context {
        Context { ctx: MaybeUninit::uninit() }
    }

    /// Builds a fresh, never-run context whose first activation begins in
    /// `launcher` on `stack`.
    ///
    /// `stack` must outlive every switch into this context; callers pass a
    /// slot of the stack pool (spec.md §4.2). `launcher` receives no
    /// arguments — see the module docs on why: the TCB the launcher needs
    /// is looked up through `scheduler::current_tid()` instead of being
    /// threaded through `makecontext`'s unreliable varargs.
    pub fn setup(stack: &mut [u8; STACK_SIZE], launcher: extern "C" fn()) -> Context {
        let mut ctx = MaybeUninit::<libc::ucontext_t>::uninit();
        unsafe {
            if libc::getcontext(ctx.as_mut_ptr()) != 0 {
                fatal_os_error!("getcontext failed while setting up a new thread");
            }
            let ctx_ref = &mut *ctx.as_mut_ptr();
            ctx_ref.uc_stack.ss_sp = stack.as_mut_ptr() as *mut libc::c_void;
            ctx_ref.uc_stack.ss_size = STACK_SIZE;
            ctx_ref.uc_stack.ss_flags = 0;
            ctx_ref.uc_link = std::ptr::null_mut();
            libc::sigemptyset(&mut ctx_ref.uc_sigmask);
            libc::makecontext(ctx.as_mut_ptr(), std::mem::transmute(launcher), 0);
        }
        Context { ctx }
    }

    fn as_mut_ptr(&mut self) -> *mut libc::ucontext_t {
        self.ctx.as_mut_ptr()
    }

    fn as_ptr(&self) -> *const libc::ucontext_t {
        self.ctx.as_ptr()
    }
}

/// Saves the caller's context into `from` and transfers control to `to`.
///
/// On a later switch back into `from`, this call returns as if it had just
/// finished — with the virtual-timer signal mask restored to whatever
/// `from`'s own critical section left blocked (spec.md §4.4).
///
/// # Safety
/// Must be called with the virtual-timer signal blocked, and only by the
/// scheduler core.
pub unsafe fn switch(from: &mut Context, to: &Context) {
    if libc::swapcontext(from.as_mut_ptr(), to.as_ptr()) != 0 {
        fatal_os_error!("swapcontext failed during a context switch");
    }
}

/// Loads `to` unconditionally, without saving anything. Used for the
/// one-way jump out of a self-terminated thread (spec.md §4.7 step 7): the
/// outgoing context is never coming back, so there is nothing to save.
///
/// # Safety
/// Must be called with the virtual-timer signal blocked. Does not return.
pub unsafe fn switch_away_forever(to: &Context) -> ! {
    if libc::setcontext(to.as_ptr()) != 0 {
        fatal_os_error!("setcontext failed during a one-way thread switch");
    }
    unreachable!("setcontext only returns on failure, which is fatal above")
}
