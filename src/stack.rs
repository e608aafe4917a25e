//! The stack pool (spec.md §4.2), modeled on the teacher's `Stack`
//! (`examples/aticu-VeOS/kernel/src/multitasking/stack.rs`) but flattened:
//! there is no paging or address space here, just `MAX_TID` fixed, 16-byte
//! aligned buffers, one per slot, heap-allocated once at `init` (see
//! SPEC_FULL.md §4.2 for why this is a `Box` rather than the teacher's
//! `static` array).

use crate::config::{MAX_TID, STACK_SIZE};

/// A single thread's stack, aligned to 16 bytes as spec.md §4.2 requires.
#[repr(align(16))]
pub struct AlignedStack(pub [u8; STACK_SIZE]);

/// The `MAX_TID`-slot stack pool. Slot 0 is never handed out: the initial
/// thread runs on the stack the OS already gave the process.
pub struct StackPool {
    stacks: Box<[AlignedStack; MAX_TID]>
}

impl StackPool {
    pub fn new() -> StackPool {
        let mut stacks = Vec::with_capacity(MAX_TID);
        for _ in 0..MAX_TID {
            stacks.push(AlignedStack([0u8; STACK_SIZE]));
        }
        let stacks: Box<[AlignedStack]> = stacks.into_boxed_slice();
        let stacks: Box<[AlignedStack; MAX_TID]> =
            stacks.try_into().unwrap_or_else(|_| unreachable!("exactly MAX_TID stacks were pushed"));
        StackPool { stacks }
    }

    /// Returns the stack buffer for `tid`. Panics for slot 0, which has no
    /// stack of its own (spec.md §4.2).
    pub fn slot_mut(&mut self, tid: usize) -> &mut [u8; STACK_SIZE] {
        assert!(tid != 0, "slot 0 has no stack of its own");
        &mut self.stacks[tid].0
    }

    /// Zeroes the stack handed to a terminated thread before its slot is
    /// eligible for reuse (SPEC_FULL.md "Supplemented from
    /// original_source"). No-op for slot 0.
    pub fn zero(&mut self, tid: usize) {
        if tid != 0 {
            self.stacks[tid].0.fill(0);
        }
    }
}

impl Default for StackPool {
    fn default() -> StackPool {
        StackPool::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_sixteen_byte_aligned() {
        let mut pool = StackPool::new();
        let ptr = pool.slot_mut(1).as_ptr();
        assert_eq!(ptr as usize % 16, 0);
    }

    #[test]
    #[should_panic]
    fn slot_zero_has_no_stack() {
        let mut pool = StackPool::new();
        pool.slot_mut(0);
    }
}
