//! A bounded FIFO ring buffer of [`Tid`]s (spec.md §4.1).
//!
//! This is plumbing in the sense of spec.md §1 — it is specified only as a
//! contract the scheduler core consumes — but it is written in the teacher's
//! idiom: a fixed-capacity array with head/tail/size bookkeeping, the same
//! shape as the stack and TCB table (`examples/aticu-VeOS/kernel/src/multitasking/stack.rs`,
//! `tcb.rs`), rather than reaching for `VecDeque`. The queue stores TIDs, not
//! TCB references, so the TCB table itself never moves (spec.md §9, "Ready-
//! queue element type").

use crate::config::MAX_TID;
use crate::tid::Tid;

/// A fixed-capacity circular buffer of TIDs with O(1) enqueue/dequeue/peek
/// and O(n) delete-by-value.
pub struct ReadyQueue {
    slots: [Tid; MAX_TID],
    head: usize,
    len: usize
}

impl ReadyQueue {
    /// Creates an empty queue with capacity `MAX_TID`.
    pub fn new() -> ReadyQueue {
        ReadyQueue { slots: [Tid::MAIN; MAX_TID], head: 0, len: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == MAX_TID
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Enqueues `tid` at the tail. Capacity equals `MAX_TID`, so in a
    /// well-formed system (at most `MAX_TID` live threads) this can never
    /// fail; `false` only signals a caller bug.
    pub fn enqueue(&mut self, tid: Tid) -> bool {
        if self.is_full() {
            return false;
        }
        let tail = (self.head + self.len) % MAX_TID;
        self.slots[tail] = tid;
        self.len += 1;
        true
    }

    /// Removes and returns the head of the queue.
    pub fn dequeue(&mut self) -> Option<Tid> {
        if self.is_empty() {
            return None;
        }
        let tid = self.slots[self.head];
        self.head = (self.head + 1) % MAX_TID;
        self.len -= 1;
        Some(tid)
    }

    /// Returns the head of the queue without removing it.
    pub fn peek(&self) -> Option<Tid> {
        if self.is_empty() { None } else { Some(self.slots[self.head]) }
    }

    /// Removes the first occurrence of `tid`, shifting toward whichever side
    /// has fewer elements to move. Returns `true` if `tid` was present.
    pub fn remove(&mut self, tid: Tid) -> bool {
        let Some(offset) = (0..self.len).find(|&i| self.slots[(self.head + i) % MAX_TID] == tid)
        else {
            return false;
        };

        let shift_left = offset;
        let shift_right = self.len - 1 - offset;

        if shift_left <= shift_right {
            // Shift everything before `offset` one slot toward the tail.
            let mut i = offset;
            while i > 0 {
                let dst = (self.head + i) % MAX_TID;
                let src = (self.head + i - 1) % MAX_TID;
                self.slots[dst] = self.slots[src];
                i -= 1;
            }
            self.head = (self.head + 1) % MAX_TID;
        } else {
            // Shift everything after `offset` one slot toward the head.
            for i in offset..self.len - 1 {
                let dst = (self.head + i) % MAX_TID;
                let src = (self.head + i + 1) % MAX_TID;
                self.slots[dst] = self.slots[src];
            }
        }
        self.len -= 1;
        true
    }
}

impl Default for ReadyQueue {
    fn default() -> ReadyQueue {
        ReadyQueue::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tids(q: &mut ReadyQueue) -> Vec<usize> {
        let mut out = Vec::new();
        while let Some(t) = q.dequeue() {
            out.push(t.index());
        }
        out
    }

    #[test]
    fn fifo_order_is_preserved() {
        let mut q = ReadyQueue::new();
        q.enqueue(1.into());
        q.enqueue(2.into());
        q.enqueue(3.into());
        assert_eq!(tids(&mut q), vec![1, 2, 3]);
    }

    #[test]
    fn remove_from_middle_preserves_remaining_order() {
        let mut q = ReadyQueue::new();
        for i in 1..=5 {
            q.enqueue(i.into());
        }
        assert!(q.remove(3.into()));
        assert_eq!(tids(&mut q), vec![1, 2, 4, 5]);
    }

    #[test]
    fn remove_missing_value_is_a_no_op() {
        let mut q = ReadyQueue::new();
        q.enqueue(1.into());
        assert!(!q.remove(42.into()));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn peek_does_not_dequeue() {
        let mut q = ReadyQueue::new();
        q.enqueue(7.into());
        assert_eq!(q.peek(), Some(7.into()));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn capacity_matches_max_tid() {
        let mut q = ReadyQueue::new();
        for i in 0..MAX_TID {
            assert!(q.enqueue(i.into()));
        }
        assert!(q.is_full());
        assert!(!q.enqueue(0.into()));
    }
}
