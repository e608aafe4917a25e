//! Thread control blocks (spec.md §3), modeled directly on the teacher's
//! `TCB`/`ThreadState` (`examples/aticu-VeOS/kernel/src/multitasking/tcb.rs`)
//! but flattened to a single-process, fixed-table shape: one stack instead
//! of a kernel/user pair, one `Context` instead of an architecture trait
//! object, and a `sleep_until` quantum deadline instead of a wall-clock
//! `Timestamp`.

use crate::context::Context;
use crate::tid::Tid;
use std::fmt;

/// The possible states of a thread (spec.md §3).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ThreadState {
    /// Slot free, no thread present.
    Unused,
    /// Runnable, present in the ready queue.
    Ready,
    /// Currently executing on the single OS thread.
    Running,
    /// Not runnable; explicitly blocked, sleeping, or both.
    Blocked,
    /// Transient state immediately before the slot returns to `Unused`.
    Terminated
}

/// A thread control block.
pub struct Tcb {
    pub id: Tid,
    pub state: ThreadState,
    pub context: Context,
    /// Quanta this thread has been the RUNNING one, charged once per timer
    /// tick (spec.md §4.7 step 2).
    pub quantums: u64,
    /// `0` means not sleeping; otherwise the `total_quantums` value at or
    /// after which this thread should become READY (spec.md §3).
    pub sleep_until: u64,
    /// The user entry function, meaningful only while the thread exists.
    pub entry: Option<extern "C" fn()>
}

impl fmt::Debug for Tcb {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Tcb {{ id: {:?}, state: {:?}, quantums: {}, sleep_until: {} }}",
            self.id, self.state, self.quantums, self.sleep_until
        )
    }
}

impl Tcb {
    /// An empty slot, ready for `spawn` or the initial-thread setup to fill in.
    pub fn unused(id: Tid) -> Tcb {
        Tcb {
            id,
            state: ThreadState::Unused,
            context: Context::empty(),
            quantums: 0,
            sleep_until: 0,
            entry: None
        }
    }

    pub fn is_live(&self) -> bool {
        !matches!(self.state, ThreadState::Unused | ThreadState::Terminated)
    }

    pub fn is_sleeping(&self) -> bool {
        self.state == ThreadState::Blocked && self.sleep_until > 0
    }

    /// Clears a slot's bookkeeping on termination, leaving `state` untouched
    /// (the caller sets it to `Terminated` itself). A `Terminated` slot is
    /// still a valid `spawn` target (spec.md §4.6: the lowest free TID search
    /// matches `UNUSED` or `TERMINATED`), so this does not move the slot back
    /// to `Unused` on its own — that happens implicitly the next time
    /// `spawn` fills it in. The stack itself isn't touched here: a
    /// self-terminating thread is still executing on its own stack at this
    /// point, so zeroing happens lazily in `Scheduler::spawn` instead, right
    /// before the slot is handed to its next occupant (SPEC_FULL.md
    /// "Supplemented from original_source").
    pub fn reset(&mut self) {
        self.entry = None;
        self.quantums = 0;
        self.sleep_until = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_slot_is_unused_and_not_live() {
        let tcb = Tcb::unused(Tid::from(3));
        assert_eq!(tcb.state, ThreadState::Unused);
        assert!(!tcb.is_live());
        assert!(!tcb.is_sleeping());
    }

    #[test]
    fn reset_clears_bookkeeping_but_not_state() {
        let mut tcb = Tcb::unused(Tid::from(1));
        tcb.state = ThreadState::Terminated;
        tcb.quantums = 7;
        tcb.sleep_until = 12;
        tcb.entry = Some(dummy_entry);
        tcb.reset();
        assert_eq!(tcb.state, ThreadState::Terminated);
        assert_eq!(tcb.quantums, 0);
        assert_eq!(tcb.sleep_until, 0);
        assert!(tcb.entry.is_none());
    }

    extern "C" fn dummy_entry() {}
}
