//! The scheduler core (spec.md §4.7), modeled on the teacher's
//! `schedule_next_thread` (`examples/aticu-VeOS/kernel/src/multitasking/scheduler.rs`):
//! the same "demote the current thread, wake sleepers, pop the ready queue,
//! switch" shape, but a strict-FIFO ready queue instead of a priority
//! `BinaryHeap`, and a single-CPU singleton instead of the teacher's
//! `cpu_local!` table (spec.md has no SMP, so there is exactly one
//! `CURRENT_THREAD`/`READY_LIST` pair, not one per core).

use crate::config::MAX_TID;
use crate::context::{self, Context};
use crate::error::LibraryError;
use crate::ready_queue::ReadyQueue;
use crate::stack::StackPool;
use crate::tcb::{Tcb, ThreadState};
use crate::tid::Tid;
use std::cell::UnsafeCell;

/// All process-wide scheduler state (spec.md §3 "Process-wide state").
pub(crate) struct Scheduler {
    tcbs: Vec<Tcb>,
    stacks: StackPool,
    ready_queue: ReadyQueue,
    current_tid: Tid,
    total_quantums: u64,
    num_threads: usize
}

/// Wraps the singleton in an `UnsafeCell` the same way the teacher wraps
/// per-CPU state in a spinlocked `Mutex` (`examples/aticu-VeOS/src/sync/mutex.rs`):
/// every access happens through [`with`], which callers must only invoke
/// from inside a [`crate::critical::CriticalSection`] — there is no atomic
/// flag here because the signal mask is the only exclusion this library
/// needs (spec.md §5).
struct SchedulerCell(UnsafeCell<Option<Scheduler>>);
unsafe impl Sync for SchedulerCell {}

static SCHEDULER: SchedulerCell = SchedulerCell(UnsafeCell::new(None));

pub(crate) fn is_initialized() -> bool {
    unsafe { (*SCHEDULER.0.get()).is_some() }
}

/// Runs `f` with exclusive access to the scheduler singleton.
///
/// # Safety / preconditions
/// The caller must already hold a `CriticalSection`, or be one of the three
/// read-only introspection calls spec.md §4.6 exempts from the critical
/// section (`get_tid`, `get_total_quantums`, `get_quantums`). This function
/// does not block the virtual-timer signal itself, since it is also called
/// from inside the timer handler, where the signal is already blocked by
/// the kernel for the handler's own duration.
pub(crate) fn with<R>(f: impl FnOnce(&mut Scheduler) -> R) -> R {
    let sched = unsafe { (*SCHEDULER.0.get()).as_mut() }.expect("scheduler used before init");
    f(sched)
}

/// Builds the singleton and creates TCB 0 for the initial thread (spec.md
/// §4.6 `init`). Must only be called once; `crate::lib` enforces that.
pub(crate) fn install() {
    let mut tcbs = Vec::with_capacity(MAX_TID);
    for i in 0..MAX_TID {
        tcbs.push(Tcb::unused(Tid::from(i)));
    }
    tcbs[0].state = ThreadState::Running;
    tcbs[0].quantums = 1;

    let sched = Scheduler {
        tcbs,
        stacks: StackPool::new(),
        ready_queue: ReadyQueue::new(),
        current_tid: Tid::MAIN,
        total_quantums: 1,
        num_threads: 1
    };
    unsafe {
        *SCHEDULER.0.get() = Some(sched);
    }
}

impl Scheduler {
    pub fn current_tid(&self) -> Tid {
        self.current_tid
    }

    pub fn total_quantums(&self) -> u64 {
        self.total_quantums
    }

    pub fn tcb(&self, tid: Tid) -> Option<&Tcb> {
        self.tcbs.get(tid.index())
    }

    fn tcb_mut(&mut self, tid: Tid) -> &mut Tcb {
        &mut self.tcbs[tid.index()]
    }

    pub fn is_live(&self, tid: Tid) -> bool {
        tid.index() < MAX_TID && self.tcbs[tid.index()].is_live()
    }

    /// Finds the lowest free TID in `[1, MAX_TID)` (spec.md §3, "lowest
    /// free TID is selected on spawn"; a slot is free once its state is
    /// `UNUSED` or `TERMINATED`), grounded on the teacher's `find_pid`
    /// (`examples/aticu-VeOS/kernel/src/multitasking/mod.rs`).
    fn find_free_tid(&self) -> Option<Tid> {
        (1..MAX_TID)
            .find(|&i| matches!(self.tcbs[i].state, ThreadState::Unused | ThreadState::Terminated))
            .map(Tid::from)
    }

    /// spec.md §4.6 `spawn`.
    pub fn spawn(&mut self, entry: extern "C" fn()) -> Result<Tid, LibraryError> {
        let tid = self.find_free_tid().ok_or(LibraryError::TooManyThreads)?;

        // A reused slot's previous occupant may have left stack content
        // behind; zero it before handing it to the new thread (SPEC_FULL.md
        // "Supplemented from original_source"). Safe here specifically
        // because a free slot is never the one currently executing.
        self.stacks.zero(tid.index());
        let stack = self.stacks.slot_mut(tid.index());
        let context = Context::setup(stack, launch_current_thread);

        let tcb = self.tcb_mut(tid);
        tcb.state = ThreadState::Ready;
        tcb.context = context;
        tcb.quantums = 0;
        tcb.sleep_until = 0;
        tcb.entry = Some(entry);

        self.ready_queue.enqueue(tid);
        self.num_threads += 1;
        log::debug!("spawned {tid:?}");
        Ok(tid)
    }

    /// Removes a non-running, non-current thread from scheduling and frees
    /// its slot. Used by `terminate` for every case except self-termination
    /// (spec.md §4.6).
    pub fn retire(&mut self, tid: Tid) {
        let was_ready = self.tcb(tid).map(|t| t.state == ThreadState::Ready).unwrap_or(false);
        if was_ready {
            self.ready_queue.remove(tid);
        }
        let tcb = self.tcb_mut(tid);
        tcb.state = ThreadState::Terminated;
        tcb.reset();
        self.num_threads -= 1;
    }

    /// Marks the current thread terminated and recycles its slot, without
    /// context-switching away yet (the caller does that — spec.md §4.6
    /// `terminate(current_tid)`).
    pub fn retire_current(&mut self) {
        let tid = self.current_tid;
        let tcb = self.tcb_mut(tid);
        tcb.state = ThreadState::Terminated;
        tcb.reset();
        self.num_threads -= 1;
    }

    /// spec.md §4.6 `block`, non-self case: drop from the ready queue if
    /// present and mark blocked. No-op if already blocked.
    pub fn block_other(&mut self, tid: Tid) {
        let state = self.tcb(tid).unwrap().state;
        if state == ThreadState::Ready {
            self.ready_queue.remove(tid);
        }
        if state != ThreadState::Blocked {
            self.tcb_mut(tid).state = ThreadState::Blocked;
        }
    }

    /// spec.md §4.6 `block`, self case: mark blocked, leaving the queue
    /// untouched (a RUNNING thread is never in the ready queue).
    pub fn block_current(&mut self) {
        let tid = self.current_tid;
        self.tcb_mut(tid).state = ThreadState::Blocked;
    }

    /// spec.md §4.6 `resume`.
    pub fn resume(&mut self, tid: Tid) {
        let tcb = self.tcb(tid).unwrap();
        if tcb.state == ThreadState::Blocked && tcb.sleep_until == 0 {
            self.tcb_mut(tid).state = ThreadState::Ready;
            self.ready_queue.enqueue(tid);
        }
    }

    /// spec.md §4.6 `sleep`: blocks the caller until `total_quantums`
    /// reaches `total_quantums + n + 1` (spec.md §9 resolves the source's
    /// `+1` ambiguity in favor of always guaranteeing one intervening
    /// quantum).
    pub fn sleep_current(&mut self, quanta: u32) {
        let tid = self.current_tid;
        let deadline = self.total_quantums + quanta as u64 + 1;
        let tcb = self.tcb_mut(tid);
        tcb.state = ThreadState::Blocked;
        tcb.sleep_until = deadline;
    }

    pub fn get_quantums(&self, tid: Tid) -> Option<u64> {
        self.tcb(tid).filter(|t| t.is_live()).map(|t| t.quantums)
    }
}

/// The launcher every freshly spawned context begins execution in
/// (spec.md §4.2, GLOSSARY "Launcher"). It looks its own entry point up by
/// `current_tid` rather than receiving it as an argument — `makecontext`'s
/// varargs are `int`-sized and not a reliable way to smuggle a function
/// pointer through on every platform (see `examples/aticu-VeOS/kernel/src/arch/x86_64/context.rs`'s
/// `enter_thread`, which has the same "this is the first code a thread
/// runs" role but gets its arguments from the raw stack frame instead).
extern "C" fn launch_current_thread() {
    let (entry, tid) = with(|s| {
        let tid = s.current_tid();
        (s.tcb(tid).unwrap().entry.expect("launched thread has no entry point"), tid)
    });
    entry();
    // A thread that falls off the end of its entry function self-terminates
    // (GLOSSARY "Launcher"). If this ever returns, a live thread would fall
    // off its stack, which spec.md §4.2 forbids outright.
    crate::terminate(tid.into());
    fatal_loud_abort();
}

fn fatal_loud_abort() -> ! {
    log::error!("thread library error: launcher returned from terminate(); aborting");
    std::process::abort();
}

/// Called by the timer handler (spec.md §4.5 step 2). Advances
/// `total_quantums` exactly once per tick and charges the quantum to
/// whoever was running, then runs the scheduler core. spec.md §9 resolves
/// the source's double-increment ambiguity this way: the counter only ever
/// moves here, never inside `schedule_next`.
pub(crate) fn on_timer_tick() {
    let prev = with(|s| {
        s.total_quantums += 1;
        let prev = s.current_tid;
        s.tcb_mut(prev).quantums += 1;
        prev
    });
    schedule_next(prev);
}

/// The scheduler core (spec.md §4.7): wake expired sleepers, demote the
/// previously running thread if it's still runnable, pick the head of the
/// ready queue, and switch. Called both from the timer handler (after it
/// has done quantum accounting) and from the voluntary-yield paths in
/// `crate::block`/`crate::sleep`/`crate::terminate`.
///
/// # Safety / preconditions
/// Must run with the virtual-timer signal blocked (spec.md §4.7, via
/// either a `CriticalSection` held by the caller, or the signal handler's
/// own implicit block).
pub(crate) fn schedule_next(prev: Tid) {
    wake_expired_sleepers();

    // Step 4: demotion only applies if `prev` was still RUNNING when we got
    // here (a preemption tick). A voluntary yield via `block`/`sleep`
    // already moved it to BLOCKED before calling this, and self-termination
    // already moved it to TERMINATED — both are left alone.
    let prev_was_running = with(|s| s.tcb(prev).unwrap().state == ThreadState::Running);
    let prev_terminated = with(|s| s.tcb(prev).unwrap().state == ThreadState::Terminated);

    // Step 5: if no other thread is ready and `prev` can still run, keep
    // going without a switch. This has to be checked before `prev` is
    // demoted/enqueued below: if it were enqueued first, a queue that
    // otherwise held nothing but `prev` itself would look non-empty, and the
    // dequeue below would hand `prev` straight back out as `next`, aliasing
    // `prev` and `next` in the context switch that follows.
    let someone_else_ready = with(|s| !s.ready_queue.is_empty());
    if !someone_else_ready && prev_was_running {
        return;
    }

    if prev_was_running {
        with(|s| {
            s.tcb_mut(prev).state = ThreadState::Ready;
            s.ready_queue.enqueue(prev);
        });
    }

    let next = with(|s| s.ready_queue.dequeue()).unwrap_or_else(|| {
        panic!(
            "invariant violated: no ready thread and {prev:?} isn't runnable either \
             (tid 0 should always be RUNNING or READY)"
        )
    });

    with(|s| {
        s.tcb_mut(next).state = ThreadState::Running;
        s.current_tid = next;
    });

    log::trace!("switching from {prev:?} to {next:?}");

    if prev_terminated {
        // `prev` is dead for good: this is a one-way jump, there is
        // nothing to save (spec.md §4.7 step 7).
        let next_ptr: *const Context = with(|s| &s.tcb(next).unwrap().context as *const Context);
        unsafe {
            context::switch_away_forever(&*next_ptr);
        }
    } else {
        // `prev` is READY (preempted) or BLOCKED (voluntary yield): either
        // way it still has a stack to come back to, so its context is
        // saved normally.
        // SAFETY: called with the virtual-timer signal blocked by the
        // caller's critical section (see function docs).
        unsafe {
            switch_contexts(prev, next);
        }
    }
}

/// Splits the two-phase borrow (`&mut prev.context`, `&next.context`) that
/// `context::switch` needs out of the single `Vec<Tcb>` they both live in.
/// `prev != next` always holds here: `next` is always dequeued from ready
/// threads other than `prev` (`schedule_next`'s step 5 check returns early,
/// before `prev` is ever enqueued, whenever `prev` would otherwise be the
/// only ready thread), so the two raw pointers never alias.
unsafe fn switch_contexts(prev: Tid, next: Tid) {
    let (prev_ptr, next_ptr): (*mut Context, *const Context) = with(|s| {
        let base = s.tcbs.as_mut_ptr();
        unsafe {
            let prev_ctx = &mut (*base.add(prev.index())).context as *mut Context;
            let next_ctx = &(*base.add(next.index())).context as *const Context;
            (prev_ctx, next_ctx)
        }
    });
    context::switch(&mut *prev_ptr, &*next_ptr);
}

fn wake_expired_sleepers() {
    with(|s| {
        let total = s.total_quantums;
        let mut woken = Vec::new();
        for i in 0..MAX_TID {
            let tcb = &s.tcbs[i];
            if tcb.is_sleeping() && tcb.sleep_until <= total {
                woken.push(Tid::from(i));
            }
        }
        for tid in woken {
            let tcb = s.tcb_mut(tid);
            tcb.sleep_until = 0;
            tcb.state = ThreadState::Ready;
            s.ready_queue.enqueue(tid);
        }
    });
}
